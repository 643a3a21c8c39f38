//! # Status Streams
//!
//! Watch subscriptions over both protocols: REST polls, streaming RPC
//! pushes, and subscribers see the same sequence either way.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use super::super::harness::{challenge, connect, start_gateway, CREATOR, PROTOCOLS};
    use shared_types::{ChallengeStatus, EntityKind, LedgerCall, StatusChange};

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_watch_sees_current_status_then_changes() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let writer = connect(&gateway, preference).await;
            let watcher = connect(&gateway, preference).await;

            writer
                .initiate_pairing(LedgerCall::new(CREATOR, "ctx", challenge("c-1")))
                .await
                .unwrap();
            let mut stream = watcher
                .watch_status("c-1", CancellationToken::new())
                .await
                .unwrap();

            let first = timeout(WAIT, stream.next()).await.unwrap().unwrap();
            assert_eq!(first.entity_kind, EntityKind::Challenge, "{preference:?}");
            assert_eq!(first.entity_id, "c-1");
            assert_eq!(first.status, "awaiting_auth");
            assert!(first.tx_hash.is_some());

            writer
                .update_challenge_status(LedgerCall::new(
                    CREATOR,
                    "ctx",
                    StatusChange::new("c-1", ChallengeStatus::Revoked, Some("operator".into())),
                ))
                .await
                .unwrap();
            let second = timeout(WAIT, stream.next()).await.unwrap().unwrap();
            assert_eq!(second.status, "revoked", "{preference:?}");

            stream.cancel();
            gateway.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_watch_before_creation_reports_creation() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let client = connect(&gateway, preference).await;

            let stream = client
                .watch_status("c-9", CancellationToken::new())
                .await
                .unwrap();
            client
                .initiate_pairing(LedgerCall::new(CREATOR, "ctx", challenge("c-9")))
                .await
                .unwrap();

            let seen: Vec<_> = timeout(WAIT, stream.take(1).collect::<Vec<_>>())
                .await
                .unwrap();
            assert_eq!(seen.len(), 1, "{preference:?}");
            assert_eq!(seen[0].status, "awaiting_auth");

            gateway.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_cancelled_stream_ends_promptly() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let client = connect(&gateway, preference).await;
            client
                .initiate_pairing(LedgerCall::new(CREATOR, "ctx", challenge("c-1")))
                .await
                .unwrap();

            let cancel = CancellationToken::new();
            let mut stream = client.watch_status("c-1", cancel.clone()).await.unwrap();
            timeout(WAIT, stream.next()).await.unwrap().unwrap();

            cancel.cancel();
            let end = timeout(Duration::from_millis(500), stream.next())
                .await
                .expect("stream did not end after cancellation");
            assert!(end.is_none(), "{preference:?}");
            assert!(stream.is_cancelled());

            // Changes after cancellation are not delivered.
            client
                .update_challenge_status(LedgerCall::new(
                    CREATOR,
                    "ctx",
                    StatusChange::new("c-1", ChallengeStatus::Expired, None),
                ))
                .await
                .unwrap();
            assert!(stream.next().await.is_none());

            gateway.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_stream_ignores_other_entities() {
        for preference in PROTOCOLS {
            let gateway = start_gateway().await;
            let client = connect(&gateway, preference).await;
            client
                .initiate_pairing(LedgerCall::new(CREATOR, "ctx", challenge("c-1")))
                .await
                .unwrap();
            let mut stream = client
                .watch_status("c-1", CancellationToken::new())
                .await
                .unwrap();
            timeout(WAIT, stream.next()).await.unwrap().unwrap();

            client
                .initiate_pairing(LedgerCall::new(CREATOR, "ctx", challenge("c-2")))
                .await
                .unwrap();
            client
                .update_challenge_status(LedgerCall::new(
                    CREATOR,
                    "ctx",
                    StatusChange::new("c-1", ChallengeStatus::Expired, None),
                ))
                .await
                .unwrap();

            let next = timeout(WAIT, stream.next()).await.unwrap().unwrap();
            assert_eq!(next.entity_id, "c-1", "{preference:?}");
            assert_eq!(next.status, "expired");

            stream.cancel();
            gateway.shutdown().await;
        }
    }
}
