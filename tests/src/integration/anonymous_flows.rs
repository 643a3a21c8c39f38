//! # Anonymous Flows
//!
//! Pairing by hashed identity. The node hashes real component ids before
//! any subsystem sees them, so nothing the ledger stores or broadcasts may
//! contain a real id, manufacturer or category.

#[cfg(test)]
mod tests {
    use super::super::harness::{start_gateway, TestNode, CREATOR, PROTOCOLS};
    use node_runtime::PairRequest;
    use pl_01_identity_hashing::{AnonymousRegistryApi, RevocationRequest};
    use pl_02_pairing_handshake::CompleteRequest;
    use pl_04_trust_ledger::TrustLedgerApi;
    use pl_05_ledger_transport::TransportPreference;
    use shared_types::{
        ComponentRef, ErrorKind, IdentityDigest, RevocationType, StatusUpdate, UrgencyLevel,
    };
    use tokio::sync::broadcast::error::TryRecvError;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const FLEET: [(&str, &str); 4] = [
        ("battery-001", "battery"),
        ("motor-001", "motor"),
        ("battery-002", "battery"),
        ("motor-002", "motor"),
    ];
    const MANUFACTURER: &str = "acme-drives";

    /// Strings that must never reach the ledger.
    fn secrets() -> Vec<&'static str> {
        let mut secrets: Vec<_> = FLEET.iter().flat_map(|(id, cat)| [*id, *cat]).collect();
        secrets.push(MANUFACTURER);
        secrets
    }

    fn assert_no_secrets(what: &str, json: &str) {
        for secret in secrets() {
            assert!(!json.contains(secret), "{what} leaks {secret}: {json}");
        }
    }

    async fn register_fleet(node: &TestNode) -> Vec<IdentityDigest> {
        let mut digests = Vec::new();
        for (id, category) in FLEET {
            let registration = node
                .coordinator
                .register_anonymous(CREATOR, id, MANUFACTURER, category)
                .await
                .unwrap();
            digests.push(registration.entity.component_hash().clone());
        }
        digests
    }

    // =============================================================================
    // ANONYMITY
    // =============================================================================

    #[tokio::test]
    async fn test_ledger_never_sees_real_ids() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let mut updates = gateway.ledger().subscribe();
            let node = TestNode::connect(&gateway, preference).await;
            let ledger = node.ledger();

            let digests = register_fleet(&node).await;
            node.coordinator.heartbeat("battery-001", true).unwrap();
            node.coordinator.heartbeat("motor-001", true).unwrap();

            let outcome = node
                .coordinator
                .pair(
                    CREATOR,
                    PairRequest::new("battery-001", "motor-001", "pack-7").anonymous(),
                )
                .await
                .unwrap();
            let challenge = outcome.challenge().cloned().expect("both sides online");
            assert_eq!(challenge.component_a, ComponentRef::anonymous(&digests[0]));
            assert_eq!(challenge.component_b, ComponentRef::anonymous(&digests[1]));

            let (auth_a, auth_b) = node.container.verifier.issue_pair(&challenge).unwrap();
            let completion = node
                .coordinator
                .complete(
                    CREATOR,
                    CompleteRequest {
                        challenge_id: challenge.challenge_id.clone(),
                        auth_a,
                        auth_b,
                        session_context: "session-1".to_string(),
                        access_rules: Default::default(),
                    },
                )
                .await
                .unwrap();
            let record = completion.lct.record().clone();
            assert!(record.component_a.is_anonymous(), "{preference:?}");
            assert!(record.component_b.is_anonymous());

            // Queue an anonymous pairing with an offline motor as well.
            node.coordinator.heartbeat("battery-002", true).unwrap();
            let queued = node
                .coordinator
                .pair(
                    CREATOR,
                    PairRequest::new("battery-002", "motor-002", "pack-7")
                        .with_proxy("proxy-1")
                        .anonymous(),
                )
                .await
                .unwrap();
            let queued = queued.queued().cloned().expect("motor offline");

            node.coordinator
                .revoke(CREATOR, &record.lct_id, "decommissioned", false)
                .await
                .unwrap();

            // Everything journalled, read back over the wire.
            let tensor = node
                .container
                .trust
                .find(&record.component_a, &record.component_b, &record.context)
                .await
                .unwrap()
                .expect("tensor created");
            let mut stored = vec![
                (
                    "challenge",
                    serde_json::to_string(&ledger.get_challenge(&challenge.challenge_id).await.unwrap())
                        .unwrap(),
                ),
                (
                    "lct",
                    serde_json::to_string(&ledger.get_lct(&record.lct_id).await.unwrap()).unwrap(),
                ),
                (
                    "request",
                    serde_json::to_string(
                        &ledger.get_pairing_request(&queued.request_id).await.unwrap(),
                    )
                    .unwrap(),
                ),
                (
                    "tensor",
                    serde_json::to_string(&ledger.get_trust_tensor(&tensor.tensor_id).await.unwrap())
                        .unwrap(),
                ),
            ];
            for digest in &digests {
                let component = ledger.get_anonymous_component(digest).await.unwrap();
                assert_eq!(&component.component_hash, digest);
                stored.push(("component", serde_json::to_string(&component).unwrap()));
            }
            for (what, json) in &stored {
                assert_no_secrets(what, json);
            }

            let mut broadcast: Vec<StatusUpdate> = Vec::new();
            loop {
                match updates.try_recv() {
                    Ok(update) => broadcast.push(update),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                    Err(TryRecvError::Lagged(_)) => continue,
                }
            }
            assert!(broadcast.len() >= stored.len());
            for update in &broadcast {
                assert_no_secrets("status update", &serde_json::to_string(update).unwrap());
            }

            node.shutdown().await;
            gateway.shutdown().await;
        }
    }

    // =============================================================================
    // REGISTRY GATE
    // =============================================================================

    #[tokio::test]
    async fn test_unregistered_components_cannot_pair() {
        let gateway = start_gateway().await;
        let node = TestNode::connect(&gateway, TransportPreference::Rest).await;

        node.coordinator
            .register_anonymous(CREATOR, "battery-001", MANUFACTURER, "battery")
            .await
            .unwrap();
        let err = node
            .coordinator
            .pair(
                CREATOR,
                PairRequest::new("battery-001", "motor-999", "pack-7").anonymous(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(node.container.handshake.challenge_count(), 0);

        node.shutdown().await;
        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_revoked_component_cannot_pair() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let node = TestNode::connect(&gateway, preference).await;
            let digests = register_fleet(&node).await;

            let event = node
                .coordinator
                .revoke_component(
                    CREATOR,
                    RevocationRequest {
                        target_hash: digests[1].clone(),
                        revocation_type: RevocationType::Individual,
                        urgency: UrgencyLevel::Critical,
                        reason_category: "safety_recall".to_string(),
                        initiator_id: MANUFACTURER.to_string(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(event.entity.target_hash, digests[1]);
            assert_no_secrets("revocation", &serde_json::to_string(&event.entity).unwrap());

            let err = node
                .coordinator
                .pair(
                    CREATOR,
                    PairRequest::new("battery-001", "motor-001", "pack-7").anonymous(),
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{preference:?}");

            // The ledger refuses to re-register a revoked digest.
            let again = node
                .coordinator
                .register_anonymous(CREATOR, "motor-001", MANUFACTURER, "motor")
                .await;
            assert!(again.is_err());

            node.shutdown().await;
            gateway.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_nodes_sharing_salt_agree_on_digests() {
        let gateway = start_gateway().await;
        let rest = TestNode::connect(&gateway, TransportPreference::Rest).await;
        let rpc =
            TestNode::connect(&gateway, TransportPreference::StreamingRpc)
                .await;

        let registered = rest
            .coordinator
            .register_anonymous(CREATOR, "battery-001", MANUFACTURER, "battery")
            .await
            .unwrap();
        let digest = registered.entity.component_hash().clone();
        assert_eq!(
            rpc.coordinator.component_ref("battery-001", true).unwrap(),
            ComponentRef::anonymous(&digest)
        );

        // The other node resolves the registration from the shared ledger.
        let registry = rpc.container.registry.clone().expect("registry configured");
        let record = registry.lookup(&digest).await.unwrap();
        assert_eq!(record.component_hash, digest);

        rest.shutdown().await;
        rpc.shutdown().await;
        gateway.shutdown().await;
    }
}
