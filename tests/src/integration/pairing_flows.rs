//! # Pairing Flows
//!
//! A full pairing node talking to the gateway over each wire protocol.
//!
//! ## Flows Tested:
//!
//! 1. **Handshake**: challenge, token exchange, LCT minted, trust raised
//! 2. **Offline queue**: unreachable peer queues, proxy replays the entry
//! 3. **Expiry**: late completion and the periodic sweep both expire
//! 4. **Revocation**: LCT terminated, offline peers notified
//! 5. **Trust**: concurrent outcomes on one pair are all counted

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::super::harness::{start_gateway, TestNode, CREATOR, PROTOCOLS};
    use node_runtime::{sweep_once, PairRequest};
    use pl_02_pairing_handshake::CompleteRequest;
    use pl_03_pairing_queue::PairingQueueApi;
    use pl_04_trust_ledger::{TrustConfig, TrustLedgerApi, TrustLedgerService};
    use shared_types::{
        ChallengeStatus, ComponentRef, ErrorKind, LctStatus, PairingChallenge, PairingOutcome,
        QueueId, RequestStatus,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Open a challenge between two online components.
    async fn open_challenge(node: &TestNode, a: &str, b: &str) -> PairingChallenge {
        node.coordinator.heartbeat(a, false).unwrap();
        node.coordinator.heartbeat(b, false).unwrap();
        let outcome = node
            .coordinator
            .pair(CREATOR, PairRequest::new(a, b, "pack-7"))
            .await
            .unwrap();
        outcome.challenge().cloned().expect("both sides online")
    }

    fn completion_for(node: &TestNode, challenge: &PairingChallenge) -> CompleteRequest {
        let (auth_a, auth_b) = node.container.verifier.issue_pair(challenge).unwrap();
        CompleteRequest {
            challenge_id: challenge.challenge_id.clone(),
            auth_a,
            auth_b,
            session_context: "session-1".to_string(),
            access_rules: Default::default(),
        }
    }

    // =============================================================================
    // HANDSHAKE
    // =============================================================================

    #[tokio::test]
    async fn test_handshake_mints_lct_and_raises_trust() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let node = TestNode::connect(&gateway, preference).await;
            let ledger = node.ledger();

            let challenge = open_challenge(&node, "battery-001", "motor-001").await;
            let journalled = ledger.get_challenge(&challenge.challenge_id).await.unwrap();
            assert_eq!(journalled.status, ChallengeStatus::AwaitingAuth, "{preference:?}");
            assert_eq!(journalled.nonce, challenge.nonce);

            let completion = node
                .coordinator
                .complete(CREATOR, completion_for(&node, &challenge))
                .await
                .unwrap();
            let record = completion.lct.record();
            assert_eq!(record.status, LctStatus::Active);
            assert_eq!(record.challenge_id, challenge.challenge_id);
            assert_ne!(record.lct_key_commitment, record.device_key_commitment);

            let stored = ledger.get_lct(&record.lct_id).await.unwrap();
            assert_eq!(&stored, record);
            let closed = ledger.get_challenge(&challenge.challenge_id).await.unwrap();
            assert_eq!(closed.status, ChallengeStatus::Completed);

            let score = completion.trust_score.expect("trust recorded");
            assert!(score > TrustConfig::for_testing().initial_score);
            let tensor = node
                .container
                .trust
                .find(&record.component_a, &record.component_b, &record.context)
                .await
                .unwrap()
                .expect("tensor created");
            assert_eq!(tensor.evidence_count, 1);
            let journalled = ledger.get_trust_tensor(&tensor.tensor_id).await.unwrap();
            assert!((journalled.score - score).abs() < 1e-9);

            node.shutdown().await;
            gateway.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_forged_token_rejected() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let node = TestNode::connect(&gateway, preference).await;

            let challenge = open_challenge(&node, "battery-001", "motor-001").await;
            let mut request = completion_for(&node, &challenge);
            request.auth_b = "00".repeat(32);

            let err = node.coordinator.complete(CREATOR, request).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::AuthenticationFailed, "{preference:?}");

            node.shutdown().await;
            gateway.shutdown().await;
        }
    }

    // =============================================================================
    // OFFLINE QUEUE
    // =============================================================================

    #[tokio::test]
    async fn test_unreachable_peer_is_queued_then_replayed() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let node = TestNode::connect(&gateway, preference).await;
            let ledger = node.ledger();

            // Motor never sent a heartbeat.
            node.coordinator.heartbeat("battery-002", false).unwrap();
            let outcome = node
                .coordinator
                .pair(
                    CREATOR,
                    PairRequest::new("battery-002", "motor-002", "pack-7").with_proxy("proxy-1"),
                )
                .await
                .unwrap();
            assert!(outcome.is_queued(), "{preference:?}");
            let queued = outcome.queued().cloned().unwrap();
            assert_eq!(queued.queue_id, QueueId::new("proxy-1"));
            assert_eq!(queued.status, RequestStatus::Queued);

            let journalled = ledger.get_pairing_request(&queued.request_id).await.unwrap();
            assert_eq!(journalled.status, RequestStatus::Queued);
            assert_eq!(
                node.container.queue.list_by_proxy("proxy-1").await.unwrap().len(),
                1
            );

            node.coordinator.heartbeat("motor-002", false).unwrap();
            let reports = node
                .coordinator
                .process_pending("proxy-1", "pack-7")
                .await
                .unwrap();
            assert_eq!(reports.len(), 1);
            assert_eq!(reports[0].completed(), 1);
            assert_eq!(reports[0].failed(), 0);

            let done = node.container.queue.get_request(&queued.request_id).await.unwrap();
            assert_eq!(done.status, RequestStatus::Completed);
            let challenge_id = done.challenge_id.clone().expect("challenge recorded");
            let challenge = ledger.get_challenge(&challenge_id).await.unwrap();
            assert_eq!(challenge.status, ChallengeStatus::AwaitingAuth);
            assert_eq!(challenge.proxy_id.as_deref(), Some("proxy-1"));
            let journalled = ledger.get_pairing_request(&queued.request_id).await.unwrap();
            assert_eq!(journalled.status, RequestStatus::Completed);

            // A finished entry cannot be cancelled.
            let err = node
                .container
                .queue
                .cancel(CREATOR, &queued.request_id, "too late")
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidState);

            node.shutdown().await;
            gateway.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_cancelled_entry_is_skipped() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let node = TestNode::connect(&gateway, preference).await;

            let outcome = node
                .coordinator
                .pair(CREATOR, PairRequest::new("battery-003", "motor-003", "pack-7"))
                .await
                .unwrap();
            let queued = outcome.queued().cloned().expect("both sides offline");
            assert_eq!(queued.queue_id, QueueId::new("motor-003"));

            let cancelled = node
                .container
                .queue
                .cancel(CREATOR, &queued.request_id, "operator abort")
                .await
                .unwrap();
            assert_eq!(cancelled.entity.status, RequestStatus::Cancelled);
            let journalled = node
                .ledger()
                .get_pairing_request(&queued.request_id)
                .await
                .unwrap();
            assert_eq!(journalled.cancel_reason.as_deref(), Some("operator abort"));

            let report = node
                .coordinator
                .process_queue("motor-003", &queued.queue_id, "pack-7")
                .await
                .unwrap();
            assert_eq!(report.completed(), 0, "{preference:?}");

            node.shutdown().await;
            gateway.shutdown().await;
        }
    }

    // =============================================================================
    // EXPIRY
    // =============================================================================

    #[tokio::test]
    async fn test_late_completion_expires_challenge() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let node = TestNode::connect(&gateway, preference).await;

            let challenge = open_challenge(&node, "battery-001", "motor-001").await;
            let request = completion_for(&node, &challenge);
            node.clock
                .advance(node.container.config.handshake.challenge_ttl_secs + 1);

            let err = node.coordinator.complete(CREATOR, request).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidState, "{preference:?}");
            let journalled = node
                .ledger()
                .get_challenge(&challenge.challenge_id)
                .await
                .unwrap();
            assert_eq!(journalled.status, ChallengeStatus::Expired);

            node.shutdown().await;
            gateway.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_sweep_expires_only_stale_challenges() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let node = TestNode::connect(&gateway, preference).await;
            let ttl = node.container.config.handshake.challenge_ttl_secs;

            let stale = open_challenge(&node, "battery-001", "motor-001").await;
            node.clock.advance(ttl / 2 + 1);
            let fresh = open_challenge(&node, "battery-002", "motor-002").await;
            node.clock.advance(ttl / 2 + 1);

            let swept = sweep_once(node.container.handshake.as_ref(), CREATOR).await;
            assert_eq!(swept, 1, "{preference:?}");

            let ledger = node.ledger();
            let stale = ledger.get_challenge(&stale.challenge_id).await.unwrap();
            let fresh = ledger.get_challenge(&fresh.challenge_id).await.unwrap();
            assert_eq!(stale.status, ChallengeStatus::Expired);
            assert_eq!(fresh.status, ChallengeStatus::AwaitingAuth);

            node.shutdown().await;
            gateway.shutdown().await;
        }
    }

    // =============================================================================
    // REVOCATION
    // =============================================================================

    #[tokio::test]
    async fn test_revocation_terminates_and_notifies_offline_peers() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let node = TestNode::connect(&gateway, preference).await;

            let challenge = open_challenge(&node, "battery-001", "motor-001").await;
            let completion = node
                .coordinator
                .complete(CREATOR, completion_for(&node, &challenge))
                .await
                .unwrap();
            let lct_id = completion.lct.record().lct_id.clone();
            let score_after_pairing = completion.trust_score.unwrap();

            // Battery keeps reporting; motor goes silent past the window.
            node.clock
                .advance(node.container.config.runtime.heartbeat_window_secs + 1);
            node.coordinator.heartbeat("battery-001", false).unwrap();

            let outcome = node
                .coordinator
                .revoke(CREATOR, &lct_id, "motor replaced", true)
                .await
                .unwrap();
            assert!(!outcome.already_terminated);
            assert_eq!(outcome.notified, vec![ComponentRef::plain("motor-001")]);
            assert!(outcome.trust_score.unwrap() < score_after_pairing);

            let stored = node.ledger().get_lct(&lct_id).await.unwrap();
            assert_eq!(stored.status, LctStatus::Terminated, "{preference:?}");

            let again = node
                .coordinator
                .revoke(CREATOR, &lct_id, "motor replaced", true)
                .await
                .unwrap();
            assert!(again.already_terminated);
            assert!(again.notified.is_empty());

            let mut delivered = Vec::new();
            for _ in 0..50 {
                delivered = node.container.notifier.outbox();
                if !delivered.is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            assert_eq!(delivered.len(), 1);
            assert_eq!(delivered[0].lct_id, lct_id);
            assert_eq!(delivered[0].reason, "motor replaced");

            node.shutdown().await;
            gateway.shutdown().await;
        }
    }

    // =============================================================================
    // TRUST
    // =============================================================================

    #[tokio::test]
    async fn test_concurrent_outcomes_are_all_counted() {
        const UPDATES: u64 = 16;

        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let node = TestNode::connect(&gateway, preference).await;
            let trust = Arc::new(
                TrustLedgerService::new(node.ledger(), TrustConfig::for_testing()).unwrap(),
            );
            let a = ComponentRef::plain("battery-001");
            let b = ComponentRef::plain("motor-001");

            let tasks: Vec<_> = (0..UPDATES)
                .map(|i| {
                    let trust = trust.clone();
                    let (a, b) = (a.clone(), b.clone());
                    let outcome = if i % 4 == 0 {
                        PairingOutcome::Failed
                    } else {
                        PairingOutcome::Completed
                    };
                    tokio::spawn(async move {
                        trust
                            .record_outcome(CREATOR, &a, &b, "pack-7", outcome)
                            .await
                    })
                })
                .collect();
            for result in futures::future::join_all(tasks).await {
                result.unwrap().unwrap();
            }

            let tensor = trust.find(&a, &b, "pack-7").await.unwrap().unwrap();
            assert_eq!(tensor.evidence_count, UPDATES, "{preference:?}");
            assert!((0.0..=1.0).contains(&tensor.score));
            assert_eq!(trust.tensor_count(), 1);

            let journalled = node.ledger().get_trust_tensor(&tensor.tensor_id).await.unwrap();
            assert_eq!(journalled.evidence_count, UPDATES);
            assert_eq!(journalled.version, tensor.version);

            node.shutdown().await;
            gateway.shutdown().await;
        }
    }
}
