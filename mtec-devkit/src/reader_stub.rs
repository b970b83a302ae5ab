/*!
Mock register reader for developing without an inverter

Serves readings from an in-memory register table. Registers absent from the
table are left out of the answer, which the bridge must treat as incomplete.
*/

use mtec_bridge::{Category, RawReadingSet, RegisterId, RegisterReader, RegisterValue, TransportError, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct ReaderState {
    registers: HashMap<RegisterId, Value>,
    failing: bool,
    fail_disconnect: bool,
    reads: Vec<Vec<RegisterId>>,
    disconnects: usize,
}

/// Mock `RegisterReader`; clones share the register table and call log
#[derive(Clone, Default)]
pub struct MockRegisterReader {
    state: Arc<Mutex<ReaderState>>,
}

impl MockRegisterReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader preloaded with the given register values
    pub fn with_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (RegisterId, Value)>,
    {
        let reader = Self::new();
        reader.set_values(values);
        reader
    }

    pub fn set_value(&self, register: RegisterId, value: Value) {
        self.state.lock().unwrap().registers.insert(register, value);
    }

    pub fn set_values<I>(&self, values: I)
    where
        I: IntoIterator<Item = (RegisterId, Value)>,
    {
        self.state.lock().unwrap().registers.extend(values);
    }

    pub fn remove(&self, register: RegisterId) {
        self.state.lock().unwrap().registers.remove(&register);
    }

    /// Simulate a lost connection: every read fails with a transport error
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        self.state.lock().unwrap().fail_disconnect = fail;
    }

    /// Register lists of every read attempt, in order
    pub fn reads(&self) -> Vec<Vec<RegisterId>> {
        self.state.lock().unwrap().reads.clone()
    }

    /// Number of read attempts for a category
    pub fn read_count(&self, category: Category) -> usize {
        self.state
            .lock()
            .unwrap()
            .reads
            .iter()
            .filter(|r| r.as_slice() == category.registers())
            .count()
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }
}

impl RegisterReader for MockRegisterReader {
    async fn read(&mut self, registers: &[RegisterId]) -> Result<RawReadingSet, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.reads.push(registers.to_vec());
        if state.failing {
            log::debug!("[MOCK] Read of {} registers failed", registers.len());
            return Err(TransportError::NotConnected);
        }

        Ok(registers
            .iter()
            .filter_map(|id| {
                state
                    .registers
                    .get(id)
                    .map(|v| (*id, RegisterValue::from_register(*id, v.clone())))
            })
            .collect())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.disconnects += 1;
        if state.fail_disconnect {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }
}
