/*!
Mock publisher for developing without an MQTT broker

Records every published message so tests can assert on topics and payloads.
*/

use mtec_bridge::{Publisher, TransportError};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockMessage {
    pub topic: String,
    pub payload: String,
}

#[derive(Debug, Default)]
struct PublisherState {
    messages: Vec<MockMessage>,
    failing: bool,
    fail_disconnect: bool,
    disconnects: usize,
}

/// Mock `Publisher`; clones share the recorded messages
#[derive(Clone, Default)]
pub struct MockPublisher {
    state: Arc<Mutex<PublisherState>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail (messages are not recorded)
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        self.state.lock().unwrap().fail_disconnect = fail;
    }

    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Payload of the last message on `topic`
    pub fn last_payload(&self, topic: &str) -> Option<String> {
        self.find_messages_by_topic(topic).pop().map(|m| m.payload)
    }

    /// Messages whose topic starts with `prefix`
    pub fn messages_under(&self, prefix: &str) -> Vec<MockMessage> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.topic.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().messages.clear();
    }
}

impl Publisher for MockPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.failing {
            return Err(TransportError::NotConnected);
        }
        log::debug!("[MOCK] Published to {}: {}", topic, payload);
        state.messages.push(MockMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.disconnects += 1;
        if state.fail_disconnect {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }
}
