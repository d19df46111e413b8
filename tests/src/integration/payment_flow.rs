//! # Payment Flow
//!
//! The payment window after admission: settlement reporting,
//! verification, timeout expiry by the sweep, and the race between the
//! sweep and a late payment, which must resolve to exactly one winner.

#[cfg(test)]
mod tests {
    use crate::integration::support::{harness, submission, token, Harness};
    use presale_engine::ports::inbound::PresaleApi;
    use presale_engine::EngineError;
    use presale_types::{PaymentStatus, RequestId};
    use std::sync::Arc;

    /// One accepted request with its payment window open at t=1010ms.
    async fn admitted_request(h: &Harness) -> RequestId {
        let receipt = h
            .service
            .submit_purchase(submission("wallet-a", 6, "ka"))
            .await
            .unwrap();
        h.clock.advance(10);
        h.service.close_round(&token(), 1).await.unwrap();
        receipt.request_id
    }

    #[tokio::test]
    async fn test_payment_inside_window_verifies() {
        let h = harness(10, 100);
        let id = admitted_request(&h).await;

        h.verifier.record_payment("txid-a", "6000").unwrap();
        h.clock.advance(29_000);
        let view = h
            .service
            .report_payment(id, "txid-a".to_string())
            .await
            .unwrap();
        assert_eq!(view.payment_status, PaymentStatus::Verified);

        // A later sweep leaves the verified request alone.
        h.clock.advance(60_000);
        assert_eq!(h.service.payment_sweeper().sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_window_expires_after_timeout() {
        let h = harness(10, 100);
        let id = admitted_request(&h).await;

        // 30s window: not expired at the boundary, expired just past it.
        h.clock.set(1_010 + 30_000);
        assert_eq!(h.service.payment_sweeper().sweep_once().await.unwrap(), 0);
        h.clock.advance(1);
        assert_eq!(h.service.payment_sweeper().sweep_once().await.unwrap(), 1);

        let err = h
            .service
            .report_payment(id, "txid-late".to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: PaymentStatus::Expired,
                to: PaymentStatus::PaymentSent,
            }
        ));
    }

    #[tokio::test]
    async fn test_unverifiable_txid_stays_sent_but_beats_the_sweep() {
        let h = harness(10, 100);
        let id = admitted_request(&h).await;

        // Settlement not visible to the verifier yet.
        let view = h
            .service
            .report_payment(id, "txid-a".to_string())
            .await
            .unwrap();
        assert_eq!(view.payment_status, PaymentStatus::PaymentSent);

        // payment-sent is off the sweep's path even long past the window.
        h.clock.advance(120_000);
        assert_eq!(h.service.payment_sweeper().sweep_once().await.unwrap(), 0);
        let stats = h.service.query_stats(&token()).await.unwrap();
        assert_eq!(stats.payment_sent, 1);
        assert_eq!(stats.expired, 0);
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_expire_exactly_once() {
        let h = harness(10, 100);
        admitted_request(&h).await;
        h.clock.advance(31_000);

        let sweeper = Arc::new(h.service.payment_sweeper());
        let mut passes = Vec::new();
        for _ in 0..4 {
            let sweeper = Arc::clone(&sweeper);
            passes.push(tokio::spawn(async move { sweeper.sweep_once().await }));
        }

        let mut total_expired = 0;
        for pass in passes {
            total_expired += pass.await.unwrap().unwrap();
        }
        assert_eq!(total_expired, 1);

        let stats = h.service.query_stats(&token()).await.unwrap();
        assert_eq!(stats.expired, 1);
    }

    #[tokio::test]
    async fn test_sweep_races_late_payment_one_winner() {
        let h = harness(10, 100);
        let id = admitted_request(&h).await;
        h.clock.advance(31_000);

        let sweeper = h.service.payment_sweeper();
        let service = Arc::clone(&h.service);
        let sweep = tokio::spawn(async move { sweeper.sweep_once().await });
        let pay =
            tokio::spawn(async move { service.report_payment(id, "txid-a".to_string()).await });

        let swept = sweep.await.unwrap().unwrap();
        let paid = pay.await.unwrap();

        // Exactly one side won; the loser saw a no-op or a clean error.
        let stats = h.service.query_stats(&token()).await.unwrap();
        match (swept, paid) {
            (1, Err(EngineError::InvalidTransition { .. })) => {
                assert_eq!(stats.expired, 1);
                assert_eq!(stats.payment_sent, 0);
            }
            (0, Ok(view)) => {
                assert_eq!(view.payment_status, PaymentStatus::PaymentSent);
                assert_eq!(stats.payment_sent, 1);
                assert_eq!(stats.expired, 0);
            }
            other => panic!("no single winner: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expired_supply_not_restored() {
        // Expiry leaves the batches sold; there is no re-offer path.
        let h = harness(10, 100);
        admitted_request(&h).await;
        h.clock.advance(31_000);
        h.service.payment_sweeper().sweep_once().await.unwrap();

        h.clock.advance(10);
        h.service
            .submit_purchase(submission("wallet-b", 6, "kb"))
            .await
            .unwrap();
        let summary = h.service.close_round(&token(), 2).await.unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.remaining_supply, 4);
    }
}
