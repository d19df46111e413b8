//! # Round Lifecycle Flows
//!
//! Submission through round close: deterministic admission ordering,
//! supply depletion across rounds, wallet caps, and the partial-fill
//! policy, all driven through the inbound API with a manual clock.

#[cfg(test)]
mod tests {
    use crate::integration::support::{harness, harness_with, sale, submission, token};
    use presale_engine::ports::inbound::PresaleApi;
    use presale_engine::{EngineConfig, OversizePolicy};
    use presale_types::{PaymentStatus, RejectionReason, RequestStatus, WalletAddress};

    #[tokio::test]
    async fn test_full_lifecycle_submit_close_pay_verify() {
        let h = harness(10, 100);

        // A submits first, B second; only A's 6 batches fit the supply.
        let a = h
            .service
            .submit_purchase(submission("wallet-a", 6, "ka"))
            .await
            .unwrap();
        h.clock.advance(10);
        let b = h
            .service
            .submit_purchase(submission("wallet-b", 6, "kb"))
            .await
            .unwrap();
        assert_eq!(a.status, RequestStatus::Pending);
        assert_eq!(b.status, RequestStatus::Pending);

        let summary = h.service.close_round(&token(), 1).await.unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.batches_sold, 6);
        assert_eq!(summary.remaining_supply, 4);

        // A pays the exact total within the window and verifies.
        h.verifier.record_payment("txid-a", "6000").unwrap();
        h.clock.advance(5_000);
        let paid = h
            .service
            .report_payment(a.request_id, "txid-a".to_string())
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Verified);

        // B's rejection is final and carries the supply reason.
        let b_view = &h
            .service
            .query_status(&token(), &WalletAddress::from("wallet-b"))
            .await
            .unwrap()[0];
        assert_eq!(b_view.status, RequestStatus::Rejected);
        assert_eq!(
            b_view.rejection_reason,
            Some(RejectionReason::InsufficientSupply)
        );
        assert_eq!(b_view.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_supply_depletes_across_rounds() {
        let h = harness(10, 100);

        h.service
            .submit_purchase(submission("wallet-a", 6, "k1"))
            .await
            .unwrap();
        h.service.close_round(&token(), 1).await.unwrap();

        // Round 2 only has 4 batches left: 5 is too many, 4 fits.
        h.clock.advance(10);
        h.service
            .submit_purchase(submission("wallet-b", 5, "k2"))
            .await
            .unwrap();
        let summary = h.service.close_round(&token(), 2).await.unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.remaining_supply, 4);

        h.clock.advance(10);
        h.service
            .submit_purchase(submission("wallet-c", 4, "k3"))
            .await
            .unwrap();
        let summary = h.service.close_round(&token(), 3).await.unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.remaining_supply, 0);
    }

    #[tokio::test]
    async fn test_rejection_does_not_consume_supply_or_cap() {
        let h = harness(10, 6);

        // Rejected for the cap in round 1; a smaller retry wins round 2.
        h.service
            .submit_purchase(submission("wallet-a", 8, "k1"))
            .await
            .unwrap();
        let summary = h.service.close_round(&token(), 1).await.unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.remaining_supply, 10);

        h.clock.advance(10);
        h.service
            .submit_purchase(submission("wallet-a", 6, "k2"))
            .await
            .unwrap();
        let summary = h.service.close_round(&token(), 2).await.unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.batches_sold, 6);
    }

    #[tokio::test]
    async fn test_smaller_later_request_fills_gap() {
        let h = harness(10, 100);

        for (wallet, batches, key) in
            [("wallet-a", 6, "ka"), ("wallet-b", 6, "kb"), ("wallet-c", 2, "kc")]
        {
            h.service
                .submit_purchase(submission(wallet, batches, key))
                .await
                .unwrap();
            h.clock.advance(10);
        }

        let summary = h.service.close_round(&token(), 1).await.unwrap();
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.batches_sold, 8);

        let c = &h
            .service
            .query_status(&token(), &WalletAddress::from("wallet-c"))
            .await
            .unwrap()[0];
        assert_eq!(c.status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn test_partial_fill_grants_and_reprices() {
        let h = harness_with(
            EngineConfig {
                oversize_policy: OversizePolicy::PartialFill,
                ..EngineConfig::default()
            },
            sale(10, 100),
        );

        h.service
            .submit_purchase(submission("wallet-a", 6, "ka"))
            .await
            .unwrap();
        h.clock.advance(10);
        h.service
            .submit_purchase(submission("wallet-b", 6, "kb"))
            .await
            .unwrap();

        let summary = h.service.close_round(&token(), 1).await.unwrap();
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.batches_sold, 10);
        assert_eq!(summary.remaining_supply, 0);

        // B got the 4 leftover batches and owes the repriced total.
        let b = &h
            .service
            .query_status(&token(), &WalletAddress::from("wallet-b"))
            .await
            .unwrap()[0];
        assert_eq!(b.batches_purchased, 4);
        assert_eq!(b.total_paid, "4000");
    }

    #[tokio::test]
    async fn test_wallet_cap_counts_prior_rounds() {
        let h = harness(100, 5);

        h.service
            .submit_purchase(submission("wallet-a", 3, "k1"))
            .await
            .unwrap();
        h.service.close_round(&token(), 1).await.unwrap();

        // 3 already held; another 3 would exceed the cap of 5.
        h.clock.advance(10);
        h.service
            .submit_purchase(submission("wallet-a", 3, "k2"))
            .await
            .unwrap();
        h.service.close_round(&token(), 2).await.unwrap();

        let statuses = h
            .service
            .query_status(&token(), &WalletAddress::from("wallet-a"))
            .await
            .unwrap();
        let second = statuses.iter().find(|s| s.round_number == Some(2)).unwrap();
        assert_eq!(second.status, RequestStatus::Rejected);
        assert_eq!(
            second.rejection_reason,
            Some(RejectionReason::WalletLimitExceeded)
        );

        // 2 more still fits.
        h.clock.advance(10);
        h.service
            .submit_purchase(submission("wallet-a", 2, "k3"))
            .await
            .unwrap();
        let summary = h.service.close_round(&token(), 3).await.unwrap();
        assert_eq!(summary.accepted, 1);
    }

    #[tokio::test]
    async fn test_empty_round_completes() {
        let h = harness(10, 5);
        let summary = h.service.close_round(&token(), 1).await.unwrap();
        assert_eq!(summary.accepted, 0);
        assert_eq!(summary.rejected, 0);
        assert_eq!(summary.remaining_supply, 10);
    }

    #[tokio::test]
    async fn test_stats_track_the_pipeline() {
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

        let stats = h.service.query_stats(&token()).await.unwrap();
        assert_eq!(stats.pending, 2);

        h.service.close_round(&token(), 1).await.unwrap();
        let stats = h.service.query_stats(&token()).await.unwrap();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.payment_requested, 1);
        assert_eq!(stats.batches_accepted, 6);
    }
}
