/*!
Test harness for the bridge loop

Wires a `Bridge` to the mocks with a fixed start time, so tests drive ticks
with explicit timestamps instead of sleeping.
*/

use crate::discovery_stub::MockDiscovery;
use crate::fixtures;
use crate::mqtt_stub::MockPublisher;
use crate::reader_stub::MockRegisterReader;
use chrono::{DateTime, Local, TimeDelta, TimeZone};
use mtec_bridge::{Bridge, BridgeSettings, Cadences, Category, FloatFormat, TickOutcome};
use std::time::Duration;

pub type MockBridge = Bridge<MockRegisterReader, MockPublisher, MockDiscovery>;

pub const BASE_TOPIC: &str = "MTEC";

/// Settings used by the harness: 10s ticks, 24h config, 5min day, 10min total
pub fn test_settings() -> BridgeSettings {
    BridgeSettings {
        base_topic: BASE_TOPIC.to_string(),
        float_format: FloatFormat::fixed(3),
        tick_interval: Duration::from_secs(10),
        retry_interval: Duration::from_secs(10),
        cadences: Cadences {
            config: TimeDelta::hours(24),
            day: TimeDelta::minutes(5),
            total: TimeDelta::minutes(10),
        },
    }
}

pub struct TestHarness {
    pub reader: MockRegisterReader,
    pub publisher: MockPublisher,
    pub discovery: MockDiscovery,
    pub bridge: MockBridge,
    start: DateTime<Local>,
}

impl TestHarness {
    /// Harness whose device answers every register, discovery enabled
    pub fn new() -> Self {
        Self::with_reader(MockRegisterReader::with_values(fixtures::full_device()), true)
    }

    /// Harness whose device does not answer yet
    pub fn offline() -> Self {
        let reader = MockRegisterReader::with_values(fixtures::full_device());
        reader.set_failing(true);
        Self::with_reader(reader, true)
    }

    pub fn with_reader(reader: MockRegisterReader, discovery_enabled: bool) -> Self {
        env_logger::try_init().ok();

        let start = Local
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap_or_else(Local::now);
        let publisher = MockPublisher::new();
        let discovery = MockDiscovery::new();
        let bridge = Bridge::new(
            test_settings(),
            reader.clone(),
            publisher.clone(),
            discovery_enabled.then(|| discovery.clone()),
            start,
        );

        Self {
            reader,
            publisher,
            discovery,
            bridge,
            start,
        }
    }

    /// Time `secs` seconds after the harness start
    pub fn at(&self, secs: i64) -> DateTime<Local> {
        self.start + TimeDelta::seconds(secs)
    }

    /// Run one tick `secs` seconds after the start
    pub async fn tick_at(&mut self, secs: i64) -> TickOutcome {
        let now = self.at(secs);
        self.bridge.tick(now).await
    }

    /// Topic of a metric for the default fixture serial number
    pub fn topic(&self, category: Category, metric: &str) -> String {
        format!("{}/{}/{}/{}", BASE_TOPIC, fixtures::SERIAL_NO, category, metric)
    }

    pub fn payload(&self, category: Category, metric: &str) -> Option<String> {
        self.publisher.last_payload(&self.topic(category, metric))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
