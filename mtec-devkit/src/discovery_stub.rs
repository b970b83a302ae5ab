/*!
Mock discovery sink counting announcements
*/

use mtec_bridge::{DiscoverySink, TransportError};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct DiscoveryState {
    initialized: Vec<String>,
    offline: usize,
    fail_initialize: bool,
    fail_offline: bool,
}

/// Mock `DiscoverySink`; clones share the counters
#[derive(Clone, Default)]
pub struct MockDiscovery {
    state: Arc<Mutex<DiscoveryState>>,
}

impl MockDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serial numbers passed to every `initialize` call
    pub fn initialized_serials(&self) -> Vec<String> {
        self.state.lock().unwrap().initialized.clone()
    }

    pub fn initialize_count(&self) -> usize {
        self.state.lock().unwrap().initialized.len()
    }

    pub fn offline_count(&self) -> usize {
        self.state.lock().unwrap().offline
    }

    pub fn set_fail_initialize(&self, fail: bool) {
        self.state.lock().unwrap().fail_initialize = fail;
    }

    pub fn set_fail_offline(&self, fail: bool) {
        self.state.lock().unwrap().fail_offline = fail;
    }
}

impl DiscoverySink for MockDiscovery {
    async fn initialize(&mut self, serial_no: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.initialized.push(serial_no.to_string());
        if state.fail_initialize {
            return Err(TransportError::NotConnected);
        }
        log::info!("[MOCK] Discovery initialized for {}", serial_no);
        Ok(())
    }

    async fn announce_offline(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.offline += 1;
        if state.fail_offline {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }
}
