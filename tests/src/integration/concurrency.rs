//! # Concurrency Flows
//!
//! Parallel submissions, duplicate idempotency keys racing each other,
//! concurrent round closers behind the token's advisory lock, and
//! independent tokens settling in parallel.

#[cfg(test)]
mod tests {
    use crate::integration::support::{harness, harness_with, sale, submission, token, TOKEN};
    use presale_engine::ports::inbound::{PresaleApi, SubmitPurchase};
    use presale_engine::ports::outbound::LockManager;
    use presale_engine::{derive_lock_key, EngineConfig, EngineError};
    use presale_types::{RequestStatus, TokenId, WalletAddress};
    use rand::Rng;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_parallel_submissions_all_queued() {
        let h = harness(1_000, 1_000);

        let mut handles = Vec::new();
        for i in 0..20 {
            let service = Arc::clone(&h.service);
            handles.push(tokio::spawn(async move {
                service
                    .submit_purchase(submission(&format!("wallet-{i}"), 2, &format!("key-{i}")))
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().status, RequestStatus::Pending);
        }

        assert_eq!(h.store.len().await, 20);
        let stats = h.service.query_stats(&token()).await.unwrap();
        assert_eq!(stats.pending, 20);
    }

    #[tokio::test]
    async fn test_admission_invariants_under_random_load() {
        const SUPPLY: u64 = 25;
        const CAP: u64 = 6;
        let h = harness(SUPPLY, CAP);

        let mut rng = rand::thread_rng();
        for i in 0..30 {
            let batches = rng.gen_range(1..=4);
            // A handful of repeat wallets so the cap actually binds.
            let wallet = format!("wallet-{}", i % 12);
            h.service
                .submit_purchase(submission(&wallet, batches, &format!("key-{i}")))
                .await
                .unwrap();
            h.clock.advance(1);
        }

        let summary = h.service.close_round(&token(), 1).await.unwrap();
        assert!(summary.batches_sold <= SUPPLY);

        let stats = h.service.query_stats(&token()).await.unwrap();
        assert_eq!(stats.batches_accepted, summary.batches_sold);
        for i in 0..12 {
            let wallet = WalletAddress::from(format!("wallet-{i}").as_str());
            let held: u64 = h
                .service
                .query_status(&token(), &wallet)
                .await
                .unwrap()
                .iter()
                .filter(|s| s.status == RequestStatus::Accepted)
                .map(|s| s.batches_purchased)
                .sum();
            assert!(held <= CAP, "wallet-{i} holds {held} over the cap");
        }
    }

    #[tokio::test]
    async fn test_duplicate_key_raced_persists_once() {
        let h = harness(100, 100);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = Arc::clone(&h.service);
            handles.push(tokio::spawn(async move {
                service
                    .submit_purchase(submission("wallet-a", 3, "same-key"))
                    .await
            }));
        }

        let mut receipts = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(receipt) => receipts.push(receipt),
                // Losers of the in-flight race get the retry signal.
                Err(EngineError::OperationInProgress { key }) => assert_eq!(key, "same-key"),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        // At least the winner succeeded, every success is the same receipt,
        // and exactly one request exists.
        assert!(!receipts.is_empty());
        assert!(receipts.iter().all(|r| r.request_id == receipts[0].request_id));
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_closers_decide_each_request_once() {
        let h = harness(10, 100);
        h.service
            .submit_purchase(submission("wallet-a", 6, "ka"))
            .await
            .unwrap();
        h.clock.advance(10);
        h.service
            .submit_purchase(submission("wallet-b", 6, "kb"))
            .await
            .unwrap();

        // Two instances race to close; the lock serializes them and the
        // second finds nothing pending.
        let first = Arc::clone(&h.service);
        let second = Arc::clone(&h.service);
        let (a, b) = tokio::join!(
            tokio::spawn(async move { first.close_round(&token(), 1).await }),
            tokio::spawn(async move { second.close_round(&token(), 1).await }),
        );
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();

        assert_eq!(a.accepted + b.accepted, 1);
        assert_eq!(a.rejected + b.rejected, 1);
        assert_eq!(a.batches_sold + b.batches_sold, 6);

        let stats = h.service.query_stats(&token()).await.unwrap();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 1);
    }

    #[tokio::test]
    async fn test_held_lock_times_out_round_close() {
        let h = harness_with(
            EngineConfig {
                lock_acquire_timeout_ms: 50,
                ..EngineConfig::default()
            },
            sale(10, 100),
        );
        h.service
            .submit_purchase(submission("wallet-a", 2, "ka"))
            .await
            .unwrap();

        // Another holder pins the token's lock past the acquire timeout.
        let _held = h
            .locks
            .acquire(derive_lock_key(&token()), Duration::from_millis(50))
            .await
            .unwrap();

        let err = h.service.close_round(&token(), 1).await.unwrap_err();
        assert!(matches!(err, EngineError::LockTimeout { .. }));

        // Nothing was decided; the request waits for the next attempt.
        let stats = h.service.query_stats(&token()).await.unwrap();
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn test_independent_tokens_settle_in_parallel() {
        let h = harness(10, 100);
        let other = TokenId::from("ffee001122334455");
        h.registry.insert(other.clone(), sale(10, 100)).unwrap();

        h.service
            .submit_purchase(submission("wallet-a", 4, "ka"))
            .await
            .unwrap();
        h.service
            .submit_purchase(SubmitPurchase {
                token_id: other.clone(),
                wallet_address: WalletAddress::from("wallet-b"),
                batches_purchased: 5,
                idempotency_key: "kb".to_string(),
            })
            .await
            .unwrap();

        let first = Arc::clone(&h.service);
        let second = Arc::clone(&h.service);
        let token_a = TokenId::from(TOKEN);
        let token_b = other.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move { first.close_round(&token_a, 1).await }),
            tokio::spawn(async move { second.close_round(&token_b, 1).await }),
        );

        assert_eq!(a.unwrap().unwrap().batches_sold, 4);
        assert_eq!(b.unwrap().unwrap().batches_sold, 5);
    }
}
