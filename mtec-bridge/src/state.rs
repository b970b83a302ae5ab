//! State shared between the bridge loop and the MQTT event loop task

use crate::hass::DiscoveryMessage;
use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

/// Discovery messages currently announced to Home Assistant
pub type Announcements = Shared<Vec<DiscoveryMessage>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Empty announcement list, filled once discovery is initialized
pub fn announcements() -> Announcements {
    new_state(Vec::new())
}

/// Snapshot of the announcements, taken without holding the lock across awaits
pub fn snapshot(announced: &Announcements) -> Vec<DiscoveryMessage> {
    announced.lock().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_announcements() {
        let announced = announcements();
        let other = announced.clone();
        other.lock().push(DiscoveryMessage {
            topic: "homeassistant/sensor/x/config".to_string(),
            payload: "{}".to_string(),
        });
        assert_eq!(snapshot(&announced).len(), 1);
    }
}
