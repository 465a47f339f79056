// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Controller lifecycle tests against the in-memory remote.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{CABIN_CHARGER, CHARGER, CallLog, ConnectBehavior, EQUALIZER, FakeApi, FakeStream};
use easee_sync::client::{PollOnly, StreamEvent};
use easee_sync::command::ProductCommand;
use easee_sync::controller::{ProductPhase, SyncConfig, SyncController};
use easee_sync::error::Error;
use easee_sync::schedule::Schedule;
use easee_sync::subscription::{EntityKind, Notification};
use easee_sync::types::{DataType, FieldPath, FieldValue, ProductId};
use parking_lot::Mutex;
use tokio::time::sleep;

fn home_only() -> SyncConfig {
    SyncConfig::default().with_monitored_sites(["Home"])
}

fn id(raw: &str) -> ProductId {
    ProductId::new(raw)
}

/// Records every value delivered to an observer.
fn recorder() -> (
    Arc<Mutex<Vec<Option<FieldValue>>>>,
    impl Fn(&Notification<'_>) + Send + Sync + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |n: &Notification<'_>| sink.lock().push(n.value()))
}

// ============================================================================
// Initialization
// ============================================================================

mod initialization {
    use super::*;

    #[tokio::test]
    async fn takes_initial_snapshot_of_monitored_sites() {
        let api = FakeApi::new(CallLog::default());
        let controller = SyncController::initialize(api.clone(), PollOnly, home_only())
            .await
            .unwrap();

        assert_eq!(controller.products().len(), 2);
        assert!(controller.product(&id(CABIN_CHARGER)).is_none());
        assert_eq!(api.polls(CHARGER), 1);
        assert_eq!(api.polls(EQUALIZER), 1);
        assert_eq!(api.polls(CABIN_CHARGER), 0);

        let charger = controller.product(&id(CHARGER)).unwrap();
        assert_eq!(charger.phase(), ProductPhase::Polled);
        assert_eq!(charger.is_online(), Some(true));
        // Missing plans are disabled rather than unknown.
        assert_eq!(charger.schedule(), Some(&Schedule::Disabled));
        assert_eq!(charger.weekly_schedule(), Some(&Schedule::Disabled));
        // Schema fields absent from the poll are seeded.
        assert!(charger.state().unwrap().contains_key("voltage"));
    }

    #[tokio::test]
    async fn all_sites_without_filter() {
        let api = FakeApi::new(CallLog::default());
        let controller = SyncController::initialize(api, PollOnly, SyncConfig::default())
            .await
            .unwrap();
        assert_eq!(controller.products().len(), 3);
    }

    #[tokio::test]
    async fn rejected_credentials_are_fatal() {
        let api = FakeApi::new(CallLog::default()).with_connect(ConnectBehavior::RejectCredentials);
        let err = SyncController::initialize(api, PollOnly, home_only())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthFailure));
    }

    #[tokio::test]
    async fn server_down_is_a_connectivity_failure() {
        let api = FakeApi::new(CallLog::default()).with_connect(ConnectBehavior::ServerDown);
        let err = SyncController::initialize(api, PollOnly, home_only())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_bounded_by_timeout() {
        let log = CallLog::default();
        let api = FakeApi::new(log.clone()).with_connect(ConnectBehavior::Hang);
        let config = home_only().with_connect_timeout(Duration::from_secs(5));

        let err = SyncController::initialize(api, PollOnly, config)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
        assert_eq!(log.count("account_products"), 0);
    }
}

// ============================================================================
// Polling
// ============================================================================

mod polling {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn poll_only_keeps_polling() {
        let api = FakeApi::new(CallLog::default());
        let controller = SyncController::initialize(api.clone(), PollOnly, home_only())
            .await
            .unwrap();
        let handle = controller.start();

        sleep(Duration::from_secs(121)).await;
        assert_eq!(api.polls(CHARGER), 3);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn live_stream_suppresses_polls_until_disconnect() {
        let log = CallLog::default();
        let api = FakeApi::new(log.clone());
        let stream = FakeStream::new(log, true);
        let controller = SyncController::initialize(api.clone(), stream.clone(), home_only())
            .await
            .unwrap();
        let handle = controller.start();

        sleep(Duration::from_secs(61)).await;
        assert_eq!(api.polls(CHARGER), 1, "only the initial poll");
        assert_eq!(api.polls(EQUALIZER), 1);
        assert!(handle.snapshot(&id(CHARGER)).unwrap().stream_connected);

        stream.emit(StreamEvent::Connection { connected: false }).await;
        sleep(Duration::from_secs(60)).await;
        assert_eq!(api.polls(CHARGER), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn offline_transition_happens_once() {
        let log = CallLog::default();
        let api = FakeApi::new(log.clone());
        api.set_state(
            CHARGER,
            "latestPulse",
            Some(FieldValue::Timestamp(Utc::now() - chrono::Duration::minutes(20))),
        );
        let stream = FakeStream::new(log, true);
        let mut controller = SyncController::initialize(api, stream, home_only())
            .await
            .unwrap();

        let (seen, listener) = recorder();
        controller
            .register_observer(&id(CHARGER), FieldPath::state("isOnline"), EntityKind::BinarySensor, listener)
            .unwrap();
        let handle = controller.start();

        sleep(Duration::from_secs(61)).await;
        assert_eq!(*seen.lock(), vec![Some(FieldValue::Bool(false))]);
        assert_eq!(handle.snapshot(&id(CHARGER)).unwrap().phase, ProductPhase::Offline);

        sleep(Duration::from_secs(180)).await;
        assert_eq!(seen.lock().len(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_polls_despite_live_stream() {
        let log = CallLog::default();
        let api = FakeApi::new(log.clone());
        let stream = FakeStream::new(log, true);
        let controller = SyncController::initialize(api.clone(), stream, home_only())
            .await
            .unwrap();
        let handle = controller.start();
        sleep(Duration::from_millis(10)).await;

        handle.refresh(&id(CHARGER)).await.unwrap();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(api.polls(CHARGER), 2);

        let err = handle.refresh(&id("nope")).await.unwrap_err();
        assert!(matches!(err, Error::ProductNotFound(_)));
        handle.shutdown().await;
    }
}

// ============================================================================
// Stream updates
// ============================================================================

mod stream {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn session_energy_jitter_is_filtered() {
        let log = CallLog::default();
        let api = FakeApi::new(log.clone());
        let stream = FakeStream::new(log, true);
        let mut controller = SyncController::initialize(api, stream.clone(), home_only())
            .await
            .unwrap();

        let (seen, listener) = recorder();
        controller
            .register_observer(&id(CHARGER), FieldPath::state("sessionEnergy"), EntityKind::Sensor, listener)
            .unwrap();
        let handle = controller.start();
        sleep(Duration::from_millis(10)).await;

        stream.observe(CHARGER, "state.sessionEnergy", DataType::Double, "10.2").await;
        sleep(Duration::from_millis(10)).await;
        assert!(seen.lock().is_empty());

        // 10.2 -> 10.8 is just under 6 %.
        stream.observe(CHARGER, "state.sessionEnergy", DataType::Double, "10.8").await;
        sleep(Duration::from_millis(10)).await;
        assert_eq!(*seen.lock(), vec![Some(FieldValue::Number(10.8))]);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_observer_is_skipped() {
        let log = CallLog::default();
        let api = FakeApi::new(log.clone());
        let stream = FakeStream::new(log, true);
        let mut controller = SyncController::initialize(api, stream.clone(), home_only())
            .await
            .unwrap();

        let (seen, listener) = recorder();
        let observer = controller
            .register_observer(&id(CHARGER), FieldPath::state("smartCharging"), EntityKind::Switch, listener)
            .unwrap();
        controller.set_observer_enabled(&observer, false);
        let handle = controller.start();
        sleep(Duration::from_millis(10)).await;

        stream.observe(CHARGER, "state_smartCharging", DataType::Boolean, "true").await;
        sleep(Duration::from_millis(10)).await;
        assert!(seen.lock().is_empty());

        observer.set_enabled(true);
        stream.observe(CHARGER, "state_smartCharging", DataType::Boolean, "false").await;
        sleep(Duration::from_millis(10)).await;
        assert_eq!(*seen.lock(), vec![Some(FieldValue::Bool(false))]);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lifetime_energy_bursts_collapse_into_one_cost_fetch() {
        let log = CallLog::default();
        let api = FakeApi::new(log.clone());
        let stream = FakeStream::new(log, true);
        let controller = SyncController::initialize(api.clone(), stream.clone(), home_only())
            .await
            .unwrap();
        let handle = controller.start();
        sleep(Duration::from_millis(10)).await;

        for value in ["1001", "1002", "1003"] {
            stream.observe(CHARGER, "state.lifetimeEnergy", DataType::Double, value).await;
            sleep(Duration::from_secs(1)).await;
        }
        sleep(Duration::from_secs(70)).await;

        // One batch: day, month and year.
        assert_eq!(api.cost_reads(), 3);
        let snapshot = handle.snapshot(&id(CHARGER)).unwrap();
        assert!((snapshot.cost_day.usage - 1.0).abs() < f64::EPSILON);
        assert!((snapshot.cost_year.usage - 3.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.cost_month.currency_id, "EUR");

        handle.shutdown().await;
    }
}

// ============================================================================
// Entity surface and commands
// ============================================================================

mod entities {
    use super::*;

    #[tokio::test]
    async fn entities_are_listed_by_kind() {
        let api = FakeApi::new(CallLog::default());
        let mut controller = SyncController::initialize(api, PollOnly, home_only())
            .await
            .unwrap();

        let noop = |_: &Notification<'_>| {};
        controller
            .register_observer(&id(CHARGER), FieldPath::state("sessionEnergy"), EntityKind::Sensor, noop)
            .unwrap();
        controller
            .register_observer(&id(EQUALIZER), FieldPath::state("activePowerImport"), EntityKind::Sensor, noop)
            .unwrap();
        controller
            .register_observer(&id(CHARGER), FieldPath::state("isOnline"), EntityKind::BinarySensor, noop)
            .unwrap();
        controller
            .register_observer(&id(CHARGER), FieldPath::config("isEnabled"), EntityKind::Switch, noop)
            .unwrap();

        assert_eq!(controller.sensor_entities().len(), 2);
        assert_eq!(controller.binary_sensor_entities().len(), 1);
        let switches = controller.switch_entities();
        assert_eq!(switches.len(), 1);
        assert_eq!(switches[0].field, FieldPath::config("isEnabled"));

        let err = controller
            .register_observer(&id("unknown"), FieldPath::state("x"), EntityKind::Sensor, noop)
            .unwrap_err();
        assert!(matches!(err, Error::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn switches_resolve_at_construction() {
        let api = FakeApi::new(CallLog::default());
        let controller = SyncController::initialize(api, PollOnly, home_only())
            .await
            .unwrap();

        let switch = controller.command_for(&id(CHARGER), "state.smartCharging").unwrap();
        assert_eq!(switch.turn(true), ProductCommand::SmartCharging(true));

        assert!(matches!(
            controller.command_for(&id(CHARGER), "state.voltage"),
            Err(Error::UnknownCommand(_))
        ));
        assert!(matches!(
            controller.command_for(&id(EQUALIZER), "smart_charging"),
            Err(Error::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn commands_reach_the_remote() {
        let log = CallLog::default();
        let api = FakeApi::new(log.clone());
        let controller = SyncController::initialize(api, PollOnly, home_only())
            .await
            .unwrap();
        let switch = controller.command_for(&id(CHARGER), "enable_charger").unwrap();
        let handle = controller.start();

        handle.send_command(&id(CHARGER), ProductCommand::Pause).await.unwrap();
        handle.set_switch(&id(CHARGER), switch, false).await.unwrap();
        assert_eq!(log.count(&format!("command:{CHARGER}:pause")), 1);
        assert_eq!(log.count(&format!("command:{CHARGER}:enable_charger(false)")), 1);

        let err = handle
            .send_command(&id("unknown"), ProductCommand::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProductNotFound(_)));

        handle.shutdown().await;
    }
}

// ============================================================================
// Teardown
// ============================================================================

mod teardown {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn unsubscribes_before_closing_the_client() {
        let log = CallLog::default();
        let api = FakeApi::new(log.clone());
        let stream = FakeStream::new(log.clone(), true);
        let controller = SyncController::initialize(api.clone(), stream, home_only())
            .await
            .unwrap();
        let handle = controller.start();
        sleep(Duration::from_millis(10)).await;

        handle.shutdown().await;

        let close = log.position("close").unwrap();
        let charger = log.position(&format!("unsubscribe:{CHARGER}")).unwrap();
        let equalizer = log.position(&format!("unsubscribe:{EQUALIZER}")).unwrap();
        assert!(charger < close);
        assert!(equalizer < close);
        assert_eq!(log.entries().last().map(String::as_str), Some("close"));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_runs_after_shutdown() {
        let api = FakeApi::new(CallLog::default());
        let controller = SyncController::initialize(api.clone(), PollOnly, home_only())
            .await
            .unwrap();
        let handle = controller.start();
        sleep(Duration::from_millis(10)).await;
        handle.shutdown().await;

        // Pending cost fetch and tickers were aborted.
        sleep(Duration::from_secs(3600)).await;
        assert_eq!(api.polls(CHARGER), 1);
        assert_eq!(api.cost_reads(), 0);
    }

    #[tokio::test]
    async fn dropped_handle_stops_the_controller() {
        let log = CallLog::default();
        let api = FakeApi::new(log.clone());
        let controller = SyncController::initialize(api, PollOnly, home_only())
            .await
            .unwrap();
        let handle = controller.start();
        let rx = handle.watch(&id(CHARGER)).unwrap();
        drop(handle);

        // The snapshot sender lives in the controller task.
        let mut rx = rx;
        while rx.changed().await.is_ok() {}
        assert_eq!(log.count("close"), 1);
    }
}
