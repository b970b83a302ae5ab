//! MQTT publisher backed by `rumqttc`
//!
//! The event loop runs in a background task. It logs connection errors and
//! backs off before polling again. Publishing only enqueues into the client's
//! request queue and never waits: while the broker is unreachable and the
//! queue is full, messages are rejected with an error and dropped. When a Home
//! Assistant birth watch is configured, the task also re-announces discovery
//! messages each time Home Assistant reports `online`.

use crate::config::MqttConfig;
use crate::error::TransportError;
use crate::hass::DiscoveryMessage;
use crate::ports::Publisher;
use crate::state::{snapshot, Announcements};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing, Publish, QoS};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const BIRTH_PAYLOAD: &[u8] = b"online";

/// Home Assistant status topic to watch and the announcements to replay
#[derive(Clone)]
pub struct BirthWatch {
    pub status_topic: String,
    pub announcements: Announcements,
}

impl BirthWatch {
    fn is_birth(&self, publish: &Publish) -> bool {
        publish.topic == self.status_topic && publish.payload.as_ref() == BIRTH_PAYLOAD
    }
}

#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Create the client and spawn its event loop
    pub fn connect(config: &MqttConfig, birth: Option<BirthWatch>) -> Self {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("mtec-bridge-{}", uuid::Uuid::new_v4().simple()));

        let mut options = MqttOptions::new(&client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        options.set_clean_session(true);
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.clone().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        tokio::spawn(drive_event_loop(eventloop, client.clone(), birth));

        info!(
            "MQTT client {} connecting to {}:{}",
            client_id, config.broker_host, config.broker_port
        );
        Self { client }
    }
}

impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        debug!("Publish {} = {}", topic, payload);
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.client.try_disconnect()?;
        Ok(())
    }
}

/// What the event loop does in response to one event
#[derive(Debug, PartialEq)]
enum Reaction {
    /// Connected; subscribe to the status topic when watching for births
    Connected { subscribe: Option<String> },
    /// Home Assistant came online; re-send these announcements
    Replay(Vec<DiscoveryMessage>),
    Stop,
    Ignore,
}

fn react(event: &Event, birth: Option<&BirthWatch>) -> Reaction {
    match event {
        Event::Incoming(Incoming::ConnAck(_)) => Reaction::Connected {
            subscribe: birth.map(|watch| watch.status_topic.clone()),
        },
        Event::Incoming(Incoming::Publish(publish)) => match birth {
            Some(watch) if watch.is_birth(publish) => Reaction::Replay(snapshot(&watch.announcements)),
            _ => Reaction::Ignore,
        },
        Event::Outgoing(Outgoing::Disconnect) => Reaction::Stop,
        _ => Reaction::Ignore,
    }
}

async fn drive_event_loop(mut eventloop: EventLoop, client: AsyncClient, birth: Option<BirthWatch>) {
    loop {
        match eventloop.poll().await {
            Ok(event) => match react(&event, birth.as_ref()) {
                Reaction::Connected { subscribe } => {
                    info!("MQTT connected");
                    // clean session: subscribe again after every reconnect
                    if let Some(topic) = subscribe {
                        if let Err(e) = client.try_subscribe(&topic, QoS::AtLeastOnce) {
                            warn!("Subscribe to {} failed: {}", topic, e);
                        }
                    }
                }
                Reaction::Replay(messages) => {
                    info!("Home Assistant is online - re-sending discovery info");
                    replay_announcements(&client, messages);
                }
                Reaction::Stop => {
                    info!("MQTT disconnected");
                    break;
                }
                Reaction::Ignore => {}
            },
            Err(e) => {
                error!("MQTT connection error: {}", e);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

fn replay_announcements(client: &AsyncClient, messages: Vec<DiscoveryMessage>) {
    let total = messages.len();
    for (sent, message) in messages.into_iter().enumerate() {
        if let Err(e) = client.try_publish(message.topic, QoS::AtMostOnce, false, message.payload) {
            warn!("Re-announcing discovery info stopped after {} of {}: {}", sent, total, e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::announcements;
    use rumqttc::{ConnAck, ConnectReturnCode};

    fn watch() -> BirthWatch {
        let announced = announcements();
        announced.lock().push(DiscoveryMessage {
            topic: "homeassistant/sensor/MTEC_1/current_grid/config".to_string(),
            payload: "{}".to_string(),
        });
        BirthWatch {
            status_topic: "homeassistant/status".to_string(),
            announcements: announced,
        }
    }

    fn incoming(topic: &str, payload: &str) -> Event {
        Event::Incoming(Incoming::Publish(Publish::new(
            topic,
            QoS::AtLeastOnce,
            payload.as_bytes().to_vec(),
        )))
    }

    #[test]
    fn test_connack_subscribes_to_status_topic() {
        let connack = Event::Incoming(Incoming::ConnAck(ConnAck::new(ConnectReturnCode::Success, false)));
        let watch = watch();

        assert_eq!(
            react(&connack, Some(&watch)),
            Reaction::Connected { subscribe: Some("homeassistant/status".to_string()) }
        );
        assert_eq!(react(&connack, None), Reaction::Connected { subscribe: None });
    }

    #[test]
    fn test_online_status_replays_announcements() {
        let watch = watch();

        match react(&incoming("homeassistant/status", "online"), Some(&watch)) {
            Reaction::Replay(messages) => assert_eq!(messages, snapshot(&watch.announcements)),
            other => panic!("expected replay, got {other:?}"),
        }
        assert_eq!(react(&incoming("homeassistant/status", "offline"), Some(&watch)), Reaction::Ignore);
        assert_eq!(react(&incoming("other/status", "online"), Some(&watch)), Reaction::Ignore);
        assert_eq!(react(&incoming("homeassistant/status", "online"), None), Reaction::Ignore);
    }

    #[test]
    fn test_outgoing_disconnect_stops_loop() {
        assert_eq!(react(&Event::Outgoing(Outgoing::Disconnect), None), Reaction::Stop);
    }

    #[tokio::test]
    async fn test_publish_never_blocks_without_broker() {
        let config = MqttConfig {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 1,
            ..MqttConfig::default()
        };
        let publisher = MqttPublisher::connect(&config, None);

        let mut rejected = 0;
        for n in 0..(REQUEST_CAPACITY * 2) {
            let result = tokio::time::timeout(
                Duration::from_secs(1),
                publisher.publish("MTEC/1/current/grid", n.to_string()),
            )
            .await
            .expect("publish must not wait for the broker");
            if let Err(e) = result {
                assert!(matches!(e, TransportError::Mqtt(_)));
                rejected += 1;
            }
        }
        assert!(rejected > 0);

        tokio::time::timeout(Duration::from_secs(1), publisher.disconnect())
            .await
            .expect("disconnect must not wait for the broker")
            .ok();
    }
}
