use chrono::TimeDelta;
use mtec_bridge::{shutdown, Category, RegisterId, TickOutcome, Value, LOCAL_TIMESTAMP};
use mtec_devkit::fixtures::{self, SERIAL_NO};
use mtec_devkit::TestHarness;
use std::time::Duration;

const DAY: i64 = 24 * 3600;

#[tokio::test]
async fn test_nothing_published_before_config_succeeds() {
    let mut harness = TestHarness::offline();

    assert_eq!(harness.tick_at(0).await, TickOutcome::AwaitingConfig);
    assert_eq!(harness.tick_at(10).await, TickOutcome::AwaitingConfig);

    assert!(harness.publisher.get_published_messages().is_empty());
    let reads = harness.reader.reads();
    assert_eq!(reads.len(), 2);
    assert!(reads.iter().all(|r| r.as_slice() == Category::Config.registers()));
    assert_eq!(harness.discovery.initialize_count(), 0);
    assert!(harness.bridge.topic_base().is_none());
}

#[tokio::test]
async fn test_recovers_once_device_answers() {
    let mut harness = TestHarness::offline();
    assert_eq!(harness.tick_at(0).await, TickOutcome::AwaitingConfig);

    harness.reader.set_failing(false);
    assert_eq!(harness.tick_at(10).await, TickOutcome::Completed);

    assert_eq!(
        harness.bridge.topic_base(),
        Some(format!("MTEC/{SERIAL_NO}").as_str())
    );
    for category in Category::ALL {
        let prefix = format!("MTEC/{SERIAL_NO}/{category}/");
        assert!(
            !harness.publisher.messages_under(&prefix).is_empty(),
            "nothing published for {category}"
        );
    }
    assert_eq!(
        harness.bridge.scheduler().next_due(Category::Day),
        Some(harness.at(10) + TimeDelta::minutes(5))
    );
}

#[tokio::test]
async fn test_config_topics() {
    let mut harness = TestHarness::new();
    harness.tick_at(0).await;

    assert_eq!(
        harness.publisher.last_payload(&format!("MTEC/{SERIAL_NO}/config/serial_no")),
        Some(SERIAL_NO.to_string())
    );
    assert_eq!(
        harness.payload(Category::Config, "firmware_version"),
        Some(fixtures::FIRMWARE_VERSION.to_string())
    );
    let stamp = harness.at(0).format("%Y-%m-%d %H:%M:%S").to_string();
    assert_eq!(harness.payload(Category::Config, LOCAL_TIMESTAMP), Some(stamp));

    let identity = harness.bridge.identity().unwrap();
    assert_eq!(identity.serial_no, SERIAL_NO);
}

#[tokio::test]
async fn test_current_consumption_published() {
    let mut harness = TestHarness::new();
    harness.reader.set_values(fixtures::current_readings(500, 1200));
    harness.tick_at(0).await;

    assert_eq!(harness.payload(Category::Current, "consumption").as_deref(), Some("700"));
    assert_eq!(harness.payload(Category::Current, "grid").as_deref(), Some("500"));
    assert_eq!(harness.payload(Category::Current, "battery_SOC").as_deref(), Some("55.000"));
    assert_eq!(
        harness.payload(Category::Current, "inverter_date").as_deref(),
        Some("2024-03-15 12:30:05")
    );
}

#[tokio::test]
async fn test_day_derived_metrics_published() {
    let mut harness = TestHarness::new();
    harness.reader.set_values(fixtures::day_readings(10, 2, 1, 3, 1));
    harness.tick_at(0).await;

    assert_eq!(harness.payload(Category::Day, "consumption").as_deref(), Some("7"));
    assert_eq!(harness.payload(Category::Day, "autarky_rate").as_deref(), Some("85.714"));
    assert_eq!(harness.payload(Category::Day, "own_consumption_rate").as_deref(), Some("80.000"));
    assert_eq!(harness.payload(Category::Day, "PV").as_deref(), Some("10"));
}

#[tokio::test]
async fn test_zero_production_publishes_zero_rates() {
    let mut harness = TestHarness::new();
    harness.reader.set_values(fixtures::day_readings(0, 0, 0, 0, 0));
    harness.tick_at(0).await;

    assert_eq!(harness.payload(Category::Day, "autarky_rate").as_deref(), Some("0"));
    assert_eq!(harness.payload(Category::Day, "own_consumption_rate").as_deref(), Some("0"));
}

#[tokio::test]
async fn test_total_metrics_published() {
    let mut harness = TestHarness::new();
    harness.tick_at(0).await;

    // 12000.5 + 2500 + 2800 - 4000 - 3000
    assert_eq!(harness.payload(Category::Total, "consumption").as_deref(), Some("10300.500"));
    assert_eq!(harness.payload(Category::Total, "grid_feed").as_deref(), Some("4000.000"));
}

#[tokio::test]
async fn test_one_publish_per_metric() {
    let mut harness = TestHarness::new();
    harness.tick_at(0).await;

    let current = harness.publisher.messages_under(&format!("MTEC/{SERIAL_NO}/current/"));
    // local timestamp + 8 registers + consumption
    assert_eq!(current.len(), 10);
    let day = harness.publisher.messages_under(&format!("MTEC/{SERIAL_NO}/day/"));
    // local timestamp + 5 registers + 3 derived
    assert_eq!(day.len(), 9);
}

#[tokio::test]
async fn test_categories_follow_their_cadence() {
    let mut harness = TestHarness::new();
    for secs in [0, 10, 20, 300] {
        assert_eq!(harness.tick_at(secs).await, TickOutcome::Completed);
    }

    assert_eq!(harness.reader.read_count(Category::Config), 1);
    assert_eq!(harness.reader.read_count(Category::Current), 4);
    // due again at 300
    assert_eq!(harness.reader.read_count(Category::Day), 2);
    // due again at 600
    assert_eq!(harness.reader.read_count(Category::Total), 1);

    assert_eq!(
        harness.bridge.scheduler().next_due(Category::Day),
        Some(harness.at(300) + TimeDelta::minutes(5))
    );
}

#[tokio::test]
async fn test_failed_read_is_retried_next_tick() {
    let mut harness = TestHarness::new();
    harness.reader.remove(RegisterId::GridFeedDay);
    harness.tick_at(0).await;

    let day_prefix = format!("MTEC/{SERIAL_NO}/day/");
    assert!(harness.publisher.messages_under(&day_prefix).is_empty());
    assert_eq!(harness.bridge.scheduler().next_due(Category::Day), Some(harness.at(0)));

    harness.reader.set_value(RegisterId::GridFeedDay, Value::Int(2));
    harness.tick_at(10).await;

    assert!(!harness.publisher.messages_under(&day_prefix).is_empty());
    assert_eq!(harness.reader.read_count(Category::Day), 2);
    assert_eq!(
        harness.bridge.scheduler().next_due(Category::Day),
        Some(harness.at(10) + TimeDelta::minutes(5))
    );
}

#[tokio::test]
async fn test_incomplete_category_publishes_nothing() {
    let mut harness = TestHarness::new();
    harness.reader.remove(RegisterId::GridPower);
    assert_eq!(harness.tick_at(0).await, TickOutcome::Completed);

    let current_prefix = format!("MTEC/{SERIAL_NO}/current/");
    assert!(harness.publisher.messages_under(&current_prefix).is_empty());
    // other categories are unaffected
    assert!(harness.payload(Category::Day, "consumption").is_some());
}

#[tokio::test]
async fn test_transport_failure_after_bootstrap() {
    let mut harness = TestHarness::new();
    harness.tick_at(0).await;
    let published = harness.publisher.get_published_messages().len();

    harness.reader.set_failing(true);
    assert_eq!(harness.tick_at(10).await, TickOutcome::Completed);
    assert_eq!(harness.publisher.get_published_messages().len(), published);

    harness.reader.set_failing(false);
    harness.tick_at(20).await;
    assert!(harness.publisher.get_published_messages().len() > published);
}

#[tokio::test]
async fn test_config_failure_keeps_known_identity() {
    let mut harness = TestHarness::new();
    harness.tick_at(0).await;
    let config_due = harness.bridge.scheduler().next_due(Category::Config);

    harness.reader.remove(RegisterId::SerialNumber);
    harness.publisher.clear();
    assert_eq!(harness.tick_at(DAY).await, TickOutcome::Completed);

    assert_eq!(harness.bridge.scheduler().next_due(Category::Config), config_due);
    assert!(harness.payload(Category::Current, "consumption").is_some());
    assert!(harness
        .publisher
        .messages_under(&format!("MTEC/{SERIAL_NO}/config/"))
        .is_empty());
}

#[tokio::test]
async fn test_discovery_initialized_once() {
    let mut harness = TestHarness::new();
    for n in 0..5 {
        harness.tick_at(n * DAY).await;
    }

    assert_eq!(harness.reader.read_count(Category::Config), 5);
    assert_eq!(harness.discovery.initialize_count(), 1);
    assert_eq!(harness.discovery.initialized_serials(), vec![SERIAL_NO.to_string()]);
    assert!(harness.bridge.discovery_initialized());
}

#[tokio::test]
async fn test_failed_discovery_is_not_retried() {
    let mut harness = TestHarness::new();
    harness.discovery.set_fail_initialize(true);
    harness.tick_at(0).await;
    assert!(harness.bridge.discovery_initialized());

    harness.discovery.set_fail_initialize(false);
    harness.tick_at(DAY).await;
    harness.tick_at(2 * DAY).await;

    assert_eq!(harness.reader.read_count(Category::Config), 3);
    assert_eq!(harness.discovery.initialize_count(), 1);

    // whatever was announced before the failure is withdrawn on exit
    let discovery = harness.discovery.clone();
    harness.bridge.shutdown().await;
    assert_eq!(discovery.offline_count(), 1);
}

#[tokio::test]
async fn test_discovery_disabled() {
    let reader = mtec_devkit::MockRegisterReader::with_values(fixtures::full_device());
    let mut harness = TestHarness::with_reader(reader, false);
    harness.tick_at(0).await;
    assert_eq!(harness.discovery.initialize_count(), 0);

    let discovery = harness.discovery.clone();
    harness.bridge.shutdown().await;
    assert_eq!(discovery.offline_count(), 0);
}

#[tokio::test]
async fn test_shutdown_releases_everything_in_order() {
    let mut harness = TestHarness::new();
    harness.tick_at(0).await;

    let (reader, publisher, discovery) = (
        harness.reader.clone(),
        harness.publisher.clone(),
        harness.discovery.clone(),
    );
    harness.bridge.shutdown().await;

    assert_eq!(discovery.offline_count(), 1);
    assert_eq!(reader.disconnect_count(), 1);
    assert_eq!(publisher.disconnect_count(), 1);
}

#[tokio::test]
async fn test_shutdown_is_best_effort() {
    let mut harness = TestHarness::new();
    harness.tick_at(0).await;

    harness.discovery.set_fail_offline(true);
    harness.reader.set_fail_disconnect(true);
    harness.publisher.set_fail_disconnect(true);

    let (reader, publisher, discovery) = (
        harness.reader.clone(),
        harness.publisher.clone(),
        harness.discovery.clone(),
    );
    harness.bridge.shutdown().await;

    assert_eq!(discovery.offline_count(), 1);
    assert_eq!(reader.disconnect_count(), 1);
    assert_eq!(publisher.disconnect_count(), 1);
}

#[tokio::test]
async fn test_offline_not_announced_without_initialization() {
    let harness = TestHarness::offline();
    let discovery = harness.discovery.clone();
    let reader = harness.reader.clone();

    harness.bridge.shutdown().await;
    assert_eq!(discovery.offline_count(), 0);
    assert_eq!(reader.disconnect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_between_iterations() {
    let harness = TestHarness::new();
    let reader = harness.reader.clone();
    let publisher = harness.publisher.clone();
    let discovery = harness.discovery.clone();

    let (trigger, token) = shutdown::channel();
    let stop = async move {
        tokio::time::sleep(Duration::from_secs(25)).await;
        trigger.trigger();
    };
    tokio::join!(harness.bridge.run(token), stop);

    // ticks at 0s, 10s and 20s
    assert_eq!(reader.read_count(Category::Current), 3);
    assert_eq!(discovery.offline_count(), 1);
    assert_eq!(reader.disconnect_count(), 1);
    assert_eq!(publisher.disconnect_count(), 1);
}

#[tokio::test]
async fn test_run_with_shutdown_already_triggered() {
    let harness = TestHarness::new();
    let reader = harness.reader.clone();
    let publisher = harness.publisher.clone();

    let (trigger, token) = shutdown::channel();
    trigger.trigger();
    harness.bridge.run(token).await;

    assert!(reader.reads().is_empty());
    assert!(publisher.get_published_messages().is_empty());
    assert_eq!(reader.disconnect_count(), 1);
    assert_eq!(publisher.disconnect_count(), 1);
}
