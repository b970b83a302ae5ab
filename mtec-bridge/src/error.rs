//! Error taxonomy of the bridge
//!
//! Only `UnknownCategory` indicates a programming error. Transport failures and
//! incomplete readings are recovered by the bridge loop: the affected category is
//! skipped for the current cycle and retried on its next due tick.

/// Errors raised by the polling and derivation core
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Unknown read category: {0}")]
    UnknownCategory(String),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Retrieved Modbus data is incomplete: {0}")]
    IncompleteData(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures of the register or publish transports
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Modbus error: {0}")]
    Modbus(String),
    #[error("Modbus exception response: {0}")]
    Exception(String),
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("Register decode error: {0}")]
    Decode(String),
}

impl BridgeError {
    /// True for errors the bridge loop recovers from by retrying on the next tick
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BridgeError::Transport(_) | BridgeError::IncompleteData(_))
    }
}
