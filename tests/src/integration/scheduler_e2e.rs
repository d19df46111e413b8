//! # Scheduler End-to-End
//!
//! Real (shortened) rounds driven by the spawned scheduler task, and the
//! background sweep task expiring payment windows. The clock stamping
//! records stays manual; only the task timers run on real time.

#[cfg(test)]
mod tests {
    use crate::integration::support::{harness_with, sale, submission, token};
    use presale_bus::{PresaleEvent, TopicFilter};
    use presale_engine::ports::inbound::PresaleApi;
    use presale_engine::EngineConfig;
    use presale_types::PaymentStatus;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            round_duration_secs: 1,
            sweep_interval_secs: 1,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_scheduler_closes_rounds_end_to_end() {
        let h = harness_with(fast_config(), sale(10, 100));
        let mut sub = h.service.subscribe(TopicFilter::token(token()));

        h.service
            .submit_purchase(submission("wallet-a", 6, "ka"))
            .await
            .unwrap();
        let started = std::time::Instant::now();
        h.service.start_presale(&token()).await.unwrap();

        let mut saw_countdown = false;
        let deadline = Duration::from_secs(10);
        let summary = loop {
            let event = timeout(deadline, sub.recv())
                .await
                .expect("no event before deadline")
                .expect("bus closed");
            match event {
                PresaleEvent::RoundCountdown {
                    seconds_remaining, ..
                } => {
                    assert!(seconds_remaining >= 1);
                    saw_countdown = true;
                }
                PresaleEvent::RoundCompleted { summary, .. } => break summary,
                _ => {}
            }
        };
        assert!(saw_countdown);
        // The close happens only after the full countdown has run.
        assert!(started.elapsed() >= Duration::from_millis(900));
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.batches_sold, 6);

        let stats = h.service.query_stats(&token()).await.unwrap();
        assert_eq!(stats.payment_requested, 1);

        assert!(h.service.stop_presale(&token()).await);
    }

    #[tokio::test]
    async fn test_scheduler_runs_consecutive_rounds() {
        let h = harness_with(fast_config(), sale(10, 100));
        let mut sub = h.service.subscribe(TopicFilter::token(token()));
        h.service.start_presale(&token()).await.unwrap();

        // Wait for round 1, submit during round 2, see it settle there.
        let deadline = Duration::from_secs(10);
        let mut first_round = None;
        loop {
            let event = timeout(deadline, sub.recv())
                .await
                .expect("no event before deadline")
                .expect("bus closed");
            match (event, first_round) {
                (PresaleEvent::RoundCompleted { round_number, .. }, None) => {
                    first_round = Some(round_number);
                    h.service
                        .submit_purchase(submission("wallet-a", 3, "ka"))
                        .await
                        .unwrap();
                }
                (
                    PresaleEvent::RoundCompleted {
                        round_number,
                        summary,
                        ..
                    },
                    Some(first),
                ) if summary.accepted > 0 => {
                    assert!(round_number > first);
                    assert_eq!(summary.batches_sold, 3);
                    break;
                }
                _ => {}
            }
        }

        assert!(h.service.stop_presale(&token()).await);
    }

    #[tokio::test]
    async fn test_closed_presale_idles_without_rounds() {
        let mut config = sale(10, 100);
        config.is_presale = false;
        let h = harness_with(fast_config(), config);
        let mut sub = h.service.subscribe(TopicFilter::token(token()));

        h.service.start_presale(&token()).await.unwrap();
        // An idle scheduler publishes nothing.
        let quiet = timeout(Duration::from_millis(1_500), sub.recv()).await;
        assert!(quiet.is_err());

        assert!(h.service.stop_presale(&token()).await);
    }

    #[tokio::test]
    async fn test_disabling_mid_countdown_parks_without_closing() {
        let h = harness_with(
            EngineConfig {
                round_duration_secs: 3,
                ..EngineConfig::default()
            },
            sale(10, 100),
        );
        let mut sub = h.service.subscribe(TopicFilter::token(token()));
        h.service
            .submit_purchase(submission("wallet-a", 2, "ka"))
            .await
            .unwrap();
        h.service.start_presale(&token()).await.unwrap();

        // Wait for the countdown to start, then pull the plug mid-round.
        loop {
            let event = timeout(Duration::from_secs(5), sub.recv())
                .await
                .expect("no countdown before deadline")
                .expect("bus closed");
            if matches!(event, PresaleEvent::RoundCountdown { .. }) {
                break;
            }
        }
        h.registry.set_presale_open(&token(), false).unwrap();

        // Watch past the round's natural end: ticks stop and the round
        // never closes while the presale is disabled.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while let Ok(event) = tokio::time::timeout_at(deadline, sub.recv()).await {
            let event = event.expect("bus closed");
            assert!(
                !matches!(event, PresaleEvent::RoundCompleted { .. }),
                "round closed while the presale was disabled"
            );
        }

        let stats = h.service.query_stats(&token()).await.unwrap();
        assert_eq!(stats.pending, 1);

        assert!(h.service.stop_presale(&token()).await);
    }

    #[tokio::test]
    async fn test_background_sweep_expires_windows() {
        let h = harness_with(fast_config(), sale(10, 100));
        let receipt = h
            .service
            .submit_purchase(submission("wallet-a", 6, "ka"))
            .await
            .unwrap();
        h.clock.advance(10);
        h.service.close_round(&token(), 1).await.unwrap();

        let handle = Arc::new(h.service.payment_sweeper()).spawn();
        assert!(handle.is_running());

        // Lapse the window on the manual clock; the 1s ticker picks it up.
        h.clock.advance(31_000);
        let mut expired = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let view = &h
                .service
                .query_status(&token(), &presale_types::WalletAddress::from("wallet-a"))
                .await
                .unwrap()[0];
            if view.payment_status == PaymentStatus::Expired {
                assert_eq!(view.request_id, receipt.request_id);
                expired = true;
                break;
            }
        }
        assert!(expired, "sweep task never expired the window");

        handle.stop();
    }
}
