//! Collaborator ports of the bridge loop
//!
//! The loop owns exactly one implementation of each port for its whole
//! lifetime. Implementations handle their own I/O timeouts; the loop treats any
//! error as "skip this category for this cycle".

use crate::error::TransportError;
use crate::model::RawReadingSet;
use crate::registers::RegisterId;

/// Register-level transport to the inverter
#[allow(async_fn_in_trait)]
pub trait RegisterReader {
    /// Read the given registers; success must cover every requested register
    async fn read(&mut self, registers: &[RegisterId]) -> Result<RawReadingSet, TransportError>;

    /// Release the connection
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Topic/value publish transport
#[allow(async_fn_in_trait)]
pub trait Publisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Home-automation discovery announcements
#[allow(async_fn_in_trait)]
pub trait DiscoverySink {
    /// Announce the device and its sensors; called once the serial number is known
    async fn initialize(&mut self, serial_no: &str) -> Result<(), TransportError>;

    /// Withdraw the announcements on shutdown
    async fn announce_offline(&mut self) -> Result<(), TransportError>;
}
