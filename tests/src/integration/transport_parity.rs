//! # Transport Parity
//!
//! Runs the same ledger script over the REST client and the streaming RPC
//! client against identical gateways and checks both report the same
//! entities and the same error classes.
//!
//! ## Checked Behaviors
//!
//! 1. **Receipts**: mutations return the stored entity and a receipt
//! 2. **Rejections**: not-found, conflict and invalid-request map to the same codes
//! 3. **Outages**: an unavailable backend surfaces as `Unreachable` on both

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::harness::{challenge, connect, start_gateway, CREATOR, PROTOCOLS};
    use pl_05_ledger_transport::TransportPreference;
    use shared_types::{
        ChallengeId, ChallengeStatus, ComponentRef, ComponentRules, IdentityDigest, LctAccessRules,
        LctId, LctRecord, LctStatus, LedgerCall, PairingRules,
        LedgerTransport, PairingOutcome, ScoreUpdate, StatusChange, TensorId, TensorStatus,
        TransportError, TransportKind, TrustTensor,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Error class of a result, comparable across protocols.
    fn class<T>(result: &Result<T, TransportError>) -> String {
        match result {
            Ok(_) => "ok".to_string(),
            Err(TransportError::Rejected { code, .. }) => format!("rejected:{code:?}"),
            Err(TransportError::Unreachable(_)) => "unreachable".to_string(),
            Err(TransportError::Timeout { .. }) => "timeout".to_string(),
            Err(TransportError::Status { code, .. }) => format!("status:{code}"),
            Err(other) => format!("other:{other}"),
        }
    }

    fn lct(id: &str, challenge_id: &str) -> LctRecord {
        LctRecord {
            lct_id: LctId::new(id),
            challenge_id: ChallengeId::new(challenge_id),
            component_a: ComponentRef::plain("battery-001"),
            component_b: ComponentRef::plain("motor-001"),
            context: "pack-7".into(),
            session_context: "session-1".into(),
            proxy_id: None,
            status: LctStatus::Active,
            lct_key_commitment: "11".repeat(32),
            device_key_commitment: "22".repeat(32),
            created_at: 1_700_000_010,
            updated_at: 1_700_000_010,
            access_rules: LctAccessRules::default(),
        }
    }

    fn tensor(id: &str) -> TrustTensor {
        TrustTensor {
            tensor_id: TensorId::new(id),
            component_a: ComponentRef::plain("battery-001"),
            component_b: ComponentRef::plain("motor-001"),
            context: "pack-7".into(),
            score: 0.5,
            status: TensorStatus::Active,
            evidence_count: 0,
            version: 1,
            created_at: 1_700_000_010,
            updated_at: 1_700_000_010,
        }
    }

    /// Observable results of one scripted session.
    #[derive(Debug, PartialEq)]
    struct Transcript {
        steps: Vec<(&'static str, String)>,
        challenge: Option<shared_types::PairingChallenge>,
        lct: Option<LctRecord>,
        tensor: Option<TrustTensor>,
        motor_lcts: Vec<LctId>,
    }

    async fn script(client: Arc<dyn LedgerTransport>) -> Transcript {
        let mut steps = Vec::new();

        let created = client
            .initiate_pairing(LedgerCall::new(CREATOR, "ctx-1", challenge("c-1")))
            .await;
        if let Ok(committed) = &created {
            assert_eq!(committed.receipt.context, "ctx-1");
            assert_eq!(committed.receipt.status, "awaiting_auth");
            assert_eq!(committed.receipt.height, 1);
        }
        steps.push(("initiate", class(&created)));

        let duplicate = client
            .initiate_pairing(LedgerCall::new(CREATOR, "ctx-1", challenge("c-1")))
            .await;
        steps.push(("initiate duplicate", class(&duplicate)));

        let completed = client
            .update_challenge_status(LedgerCall::new(
                CREATOR,
                "ctx-1",
                StatusChange::new("c-1", ChallengeStatus::Completed, None),
            ))
            .await;
        steps.push(("complete by status update", class(&completed)));

        let missing = client
            .update_challenge_status(LedgerCall::new(
                CREATOR,
                "ctx-1",
                StatusChange::new("c-404", ChallengeStatus::Expired, None),
            ))
            .await;
        steps.push(("update unknown challenge", class(&missing)));

        let minted = client
            .complete_pairing(LedgerCall::new(CREATOR, "ctx-1", lct("lct-1", "c-1")))
            .await;
        steps.push(("mint lct", class(&minted)));

        let minted_again = client
            .complete_pairing(LedgerCall::new(CREATOR, "ctx-1", lct("lct-2", "c-1")))
            .await;
        steps.push(("mint second lct", class(&minted_again)));

        let suspended = client
            .update_lct_status(LedgerCall::new(
                CREATOR,
                "ctx-1",
                StatusChange::new("lct-1", LctStatus::Suspended, Some("maintenance".into())),
            ))
            .await;
        steps.push(("suspend lct", class(&suspended)));

        let created_tensor = client
            .create_trust_tensor(LedgerCall::new(CREATOR, "ctx-1", tensor("t-1")))
            .await;
        steps.push(("create tensor", class(&created_tensor)));

        let scored = client
            .update_trust_score(LedgerCall::new(
                CREATOR,
                "ctx-1",
                ScoreUpdate {
                    tensor_id: TensorId::new("t-1"),
                    score: 0.6,
                    evidence_count: 1,
                    version: 2,
                    outcome: PairingOutcome::Completed,
                },
            ))
            .await;
        steps.push(("score tensor", class(&scored)));

        let bad_score = client
            .update_trust_score(LedgerCall::new(
                CREATOR,
                "ctx-1",
                ScoreUpdate {
                    tensor_id: TensorId::new("t-1"),
                    score: 1.5,
                    evidence_count: 2,
                    version: 3,
                    outcome: PairingOutcome::Completed,
                },
            ))
            .await;
        steps.push(("out of range score", class(&bad_score)));

        let missing_lct = client.get_lct(&LctId::new("lct-404")).await;
        steps.push(("get unknown lct", class(&missing_lct)));

        let motor_lcts = client.list_component_lcts("motor-001").await;
        steps.push(("list component lcts", class(&motor_lcts)));
        let motor_lcts = motor_lcts
            .map(|lcts| lcts.into_iter().map(|l| l.lct_id).collect())
            .unwrap_or_default();

        let unregistered = IdentityDigest::from_bytes(&[9u8; 32]);
        let rules = client
            .set_component_rules(LedgerCall::new(
                CREATOR,
                "ctx-1",
                ComponentRules {
                    component_hash: unregistered.clone(),
                    rules: PairingRules::new(LctId::new("lct-1")),
                    updated_at: 1_700_000_020,
                },
            ))
            .await;
        steps.push(("rules of unregistered component", class(&rules)));
        let missing_rules = client.get_component_rules(&unregistered).await;
        steps.push(("read missing rules", class(&missing_rules)));

        let challenge = client.get_challenge(&ChallengeId::new("c-1")).await.ok();
        let lct = client.get_lct(&LctId::new("lct-1")).await.ok();
        let tensor = client.get_trust_tensor(&TensorId::new("t-1")).await.ok();

        Transcript {
            steps,
            challenge,
            lct,
            tensor,
            motor_lcts,
        }
    }

    async fn run(preference: TransportPreference) -> Transcript {
        let gateway = start_gateway().await;
        let client = connect(&gateway, preference).await;
        let transcript = script(client).await;
        gateway.shutdown().await;
        transcript
    }

    // =============================================================================
    // PARITY TESTS
    // =============================================================================

    #[tokio::test]
    async fn test_same_script_same_transcript() {
        let rest = run(TransportPreference::Rest).await;
        let rpc = run(TransportPreference::StreamingRpc).await;

        assert_eq!(rest, rpc);
        assert_eq!(
            rest.steps,
            vec![
                ("initiate", "ok".to_string()),
                ("initiate duplicate", "rejected:Conflict".to_string()),
                ("complete by status update", "rejected:InvalidRequest".to_string()),
                ("update unknown challenge", "rejected:NotFound".to_string()),
                ("mint lct", "ok".to_string()),
                ("mint second lct", "rejected:Conflict".to_string()),
                ("suspend lct", "ok".to_string()),
                ("create tensor", "ok".to_string()),
                ("score tensor", "ok".to_string()),
                ("out of range score", "rejected:InvalidRequest".to_string()),
                ("get unknown lct", "rejected:NotFound".to_string()),
                ("list component lcts", "ok".to_string()),
                ("rules of unregistered component", "rejected:NotFound".to_string()),
                ("read missing rules", "rejected:NotFound".to_string()),
            ]
        );
        assert_eq!(rest.motor_lcts, vec![LctId::new("lct-1")]);

        let challenge = rest.challenge.expect("challenge readable");
        assert_eq!(challenge.status, ChallengeStatus::Completed);
        let lct = rest.lct.expect("lct readable");
        assert_eq!(lct.status, LctStatus::Suspended);
        let tensor = rest.tensor.expect("tensor readable");
        assert!((tensor.score - 0.6).abs() < 1e-9);
        assert_eq!(tensor.evidence_count, 1);
    }

    #[tokio::test]
    async fn test_capabilities_name_the_protocol() {
        let gateway = start_gateway().await;

        let rest = connect(&gateway, TransportPreference::Rest).await;
        let rpc = connect(&gateway, TransportPreference::StreamingRpc).await;

        assert_eq!(rest.kind(), TransportKind::Rest);
        assert_eq!(rpc.kind(), TransportKind::StreamingRpc);
        assert!(!rest.capabilities().push_updates);
        assert!(rpc.capabilities().push_updates);
        assert_eq!(
            rest.capabilities().backend_version,
            rpc.capabilities().backend_version
        );

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_auto_prefers_streaming_rpc() {
        let gateway = start_gateway().await;
        let client = connect(&gateway, TransportPreference::Auto).await;
        assert_eq!(client.kind(), TransportKind::StreamingRpc);
        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_writes_are_visible_across_protocols() {
        let gateway = start_gateway().await;
        let rest = connect(&gateway, TransportPreference::Rest).await;
        let rpc = connect(&gateway, TransportPreference::StreamingRpc).await;

        rest.initiate_pairing(LedgerCall::new(CREATOR, "ctx", challenge("c-1")))
            .await
            .unwrap();
        let via_rpc = rpc.get_challenge(&ChallengeId::new("c-1")).await.unwrap();
        assert_eq!(via_rpc, challenge("c-1"));

        rpc.update_challenge_status(LedgerCall::new(
            CREATOR,
            "ctx",
            StatusChange::new("c-1", ChallengeStatus::Revoked, Some("bad token".into())),
        ))
        .await
        .unwrap();
        let via_rest = rest.get_challenge(&ChallengeId::new("c-1")).await.unwrap();
        assert_eq!(via_rest.status, ChallengeStatus::Revoked);

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_outage_is_unreachable_on_both_protocols() {
        let gateway = start_gateway().await;
        let ledger = gateway.ledger();

        for preference in PROTOCOLS {
            let client = connect(&gateway, preference).await;
            ledger.set_available(false);

            let read = client.get_lct(&LctId::new("lct-1")).await;
            assert_eq!(class(&read), "unreachable", "{preference:?} read");
            assert!(read.unwrap_err().is_retryable());

            let write = client
                .initiate_pairing(LedgerCall::new(CREATOR, "ctx", challenge("c-1")))
                .await;
            assert_eq!(class(&write), "unreachable", "{preference:?} write");

            ledger.set_available(true);
            let recovered = client.get_lct(&LctId::new("lct-1")).await;
            assert_eq!(class(&recovered), "rejected:NotFound");
        }
        // Nothing was committed while the backend was down.
        assert_eq!(ledger.height(), 0);

        gateway.shutdown().await;
    }
}
