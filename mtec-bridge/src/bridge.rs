//! Bridge loop: scheduler ticks, category reads, publishing and shutdown
//!
//! Nothing is read or published besides `config` until the device serial number
//! is known, because every topic lives under `<base>/<serial>/`. After that,
//! `current` is read on every tick and `config`, `day` and `total` whenever the
//! scheduler reports them due. No error leaves the loop; only the shutdown
//! token ends it.

use crate::catalog::Category;
use crate::config::BridgeSettings;
use crate::error::BridgeError;
use crate::payload::format_value;
use crate::ports::{DiscoverySink, Publisher, RegisterReader};
use crate::scheduler::CadenceScheduler;
use crate::shutdown::Shutdown;
use crate::transform::{transform, MetricsBundle};
use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Serial number and firmware version reported by the `config` category
///
/// Kept exactly as published under `config/`, so the topic prefix matches the `serial_no` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub serial_no: String,
    pub firmware_version: String,
}

impl DeviceIdentity {
    pub fn from_bundle(bundle: &MetricsBundle) -> Result<Self, BridgeError> {
        let text = |name: &str| {
            bundle
                .value(name)
                .and_then(|v| v.as_text())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .ok_or_else(|| BridgeError::IncompleteData(format!("{name} is missing or empty")))
        };
        Ok(Self {
            serial_no: text("serial_no")?,
            firmware_version: text("firmware_version")?,
        })
    }
}

/// Result of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Device identity still unknown; retry after the failure-retry interval
    AwaitingConfig,
    Completed,
}

pub struct Bridge<R, P, D> {
    settings: BridgeSettings,
    reader: R,
    publisher: P,
    discovery: Option<D>,
    scheduler: CadenceScheduler,
    identity: Option<DeviceIdentity>,
    topic_base: Option<String>,
    discovery_initialized: bool,
}

impl<R, P, D> Bridge<R, P, D>
where
    R: RegisterReader,
    P: Publisher,
    D: DiscoverySink,
{
    pub fn new(
        settings: BridgeSettings,
        reader: R,
        publisher: P,
        discovery: Option<D>,
        started_at: DateTime<Local>,
    ) -> Self {
        let scheduler = CadenceScheduler::new(settings.cadences, started_at);
        Self {
            settings,
            reader,
            publisher,
            discovery,
            scheduler,
            identity: None,
            topic_base: None,
            discovery_initialized: false,
        }
    }

    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    /// `<base>/<serial>`, once the device identity is known
    pub fn topic_base(&self) -> Option<&str> {
        self.topic_base.as_deref()
    }

    pub fn scheduler(&self) -> &CadenceScheduler {
        &self.scheduler
    }

    pub fn discovery_initialized(&self) -> bool {
        self.discovery_initialized
    }

    /// Run until `shutdown` is triggered, then release every collaborator
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!("Starting bridge loop");
        while !shutdown.is_triggered() {
            let outcome = self.tick(Local::now()).await;
            let pause = self.settings.pause_after(outcome);
            debug!("Sleep {}s", pause.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.wait() => {}
            }
        }
        self.shutdown().await;
    }

    /// One loop iteration at time `now`
    pub async fn tick(&mut self, now: DateTime<Local>) -> TickOutcome {
        if self.topic_base.is_none() || self.scheduler.is_due(Category::Config, now) {
            self.refresh_config(now).await;
        }

        let Some(topic_base) = self.topic_base.clone() else {
            error!(
                "Cant retrieve initial config - retry in {}s",
                self.settings.retry_interval.as_secs()
            );
            return TickOutcome::AwaitingConfig;
        };

        self.refresh(Category::Current, &topic_base, now).await;
        for category in [Category::Day, Category::Total] {
            if self.scheduler.is_due(category, now) {
                self.refresh(category, &topic_base, now).await;
            }
        }
        TickOutcome::Completed
    }

    /// Release discovery, register transport and publish transport, in that order.
    /// Every step is attempted; failures are only logged.
    pub async fn shutdown(mut self) {
        if self.discovery_initialized {
            if let Some(discovery) = self.discovery.as_mut() {
                if let Err(e) = discovery.announce_offline().await {
                    warn!("Failed to send discovery unregister info: {}", e);
                }
            }
        }
        if let Err(e) = self.reader.disconnect().await {
            warn!("Failed to close register connection: {}", e);
        }
        if let Err(e) = self.publisher.disconnect().await {
            warn!("Failed to close publish connection: {}", e);
        }
        info!("Exiting");
    }

    async fn refresh_config(&mut self, now: DateTime<Local>) {
        let bundle = match self.read_category(Category::Config, now).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Reading config failed: {}", e);
                return;
            }
        };
        let identity = match DeviceIdentity::from_bundle(&bundle) {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Config does not identify the device: {}", e);
                return;
            }
        };

        let topic_base = format!("{}/{}", self.settings.base_topic, identity.serial_no);
        if self.topic_base.as_deref() != Some(topic_base.as_str()) {
            info!(
                "Inverter {} (firmware {}) publishing under {}/",
                identity.serial_no, identity.firmware_version, topic_base
            );
        }
        self.publish_bundle(&topic_base, &bundle).await;
        self.scheduler.mark_success(Category::Config, now);

        // at most one attempt per process, whatever its outcome
        if !self.discovery_initialized {
            if let Some(discovery) = self.discovery.as_mut() {
                self.discovery_initialized = true;
                if let Err(e) = discovery.initialize(&identity.serial_no).await {
                    warn!("Discovery initialization failed: {}", e);
                }
            }
        }

        self.topic_base = Some(topic_base);
        self.identity = Some(identity);
    }

    async fn refresh(&mut self, category: Category, topic_base: &str, now: DateTime<Local>) {
        match self.read_category(category, now).await {
            Ok(bundle) => {
                self.publish_bundle(topic_base, &bundle).await;
                self.scheduler.mark_success(category, now);
            }
            Err(e) if e.is_recoverable() => warn!("Skipping {} this cycle: {}", category, e),
            Err(e) => error!("Reading {} failed: {}", category, e),
        }
    }

    async fn read_category(
        &mut self,
        category: Category,
        now: DateTime<Local>,
    ) -> Result<MetricsBundle, BridgeError> {
        debug!("Reading registers for category: {}", category);
        let raw = self.reader.read(category.registers()).await?;
        transform(category, &raw, now)
    }

    /// Publish every metric of `bundle` under `<topic_base>/<category>/`
    async fn publish_bundle(&self, topic_base: &str, bundle: &MetricsBundle) {
        let mut failed = 0;
        for (name, metric) in bundle.iter() {
            let topic = format!("{}/{}/{}", topic_base, bundle.category(), name);
            let payload = format_value(metric.value(), &self.settings.float_format);
            if let Err(e) = self.publisher.publish(&topic, payload).await {
                warn!("Publish to {} failed: {}", topic, e);
                failed += 1;
            }
        }
        if failed > 0 {
            warn!("{} of {} {} metrics not published", failed, bundle.len(), bundle.category());
        }
    }
}

impl BridgeSettings {
    /// Interval to sleep after an iteration with the given outcome
    pub fn pause_after(&self, outcome: TickOutcome) -> Duration {
        match outcome {
            TickOutcome::AwaitingConfig => self.retry_interval,
            TickOutcome::Completed => self.tick_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawReadingSet, RegisterValue, Value};
    use crate::registers::RegisterId;

    fn config_bundle(serial: &str) -> MetricsBundle {
        let raw: RawReadingSet = [
            (RegisterId::SerialNumber, Value::Text(serial.to_string())),
            (RegisterId::FirmwareVersion, Value::Text("V27.52.4.0".to_string())),
        ]
        .into_iter()
        .map(|(id, v)| (id, RegisterValue::from_register(id, v)))
        .collect();
        transform(Category::Config, &raw, Local::now()).unwrap()
    }

    #[test]
    fn test_identity_from_config_bundle() {
        let identity = DeviceIdentity::from_bundle(&config_bundle("ABC123")).unwrap();
        assert_eq!(identity.serial_no, "ABC123");
        assert_eq!(identity.firmware_version, "V27.52.4.0");
    }

    #[test]
    fn test_identity_matches_published_serial() {
        let bundle = config_bundle(" ABC123");
        let identity = DeviceIdentity::from_bundle(&bundle).unwrap();
        assert_eq!(Some(identity.serial_no.as_str()), bundle.value("serial_no").and_then(|v| v.as_text()));
    }

    #[test]
    fn test_blank_serial_is_rejected() {
        let result = DeviceIdentity::from_bundle(&config_bundle("   "));
        assert!(matches!(result, Err(BridgeError::IncompleteData(_))));
    }

    #[test]
    fn test_pause_after_outcome() {
        let settings = crate::config::BridgeConfig::default().settings().unwrap();
        assert_eq!(settings.pause_after(TickOutcome::Completed), Duration::from_secs(10));
        assert_eq!(settings.pause_after(TickOutcome::AwaitingConfig), settings.retry_interval);
    }
}
