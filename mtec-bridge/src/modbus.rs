//! Modbus TCP register reader for the M-TEC inverter
//!
//! Requested registers are sorted by address and contiguous ones are merged
//! into a single holding-register request. The connection is opened lazily and
//! dropped after any transport failure, so the next read reconnects.

use crate::config::ModbusConfig;
use crate::error::TransportError;
use crate::model::{RawReadingSet, RegisterValue};
use crate::ports::RegisterReader;
use crate::registers::RegisterId;
use std::time::Duration;
use tokio::time::timeout;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

/// Protocol limit for one read-holding-registers request
pub const MAX_REQUEST_WORDS: u16 = 125;

/// One holding-register request covering adjacent registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBlock {
    pub start: u16,
    pub words: u16,
    pub registers: Vec<RegisterId>,
}

impl ReadBlock {
    fn end(&self) -> u32 {
        u32::from(self.start) + u32::from(self.words)
    }
}

/// Group registers into as few contiguous requests as possible
pub fn plan_requests(registers: &[RegisterId]) -> Vec<ReadBlock> {
    let mut sorted = registers.to_vec();
    sorted.sort_by_key(|r| r.address());
    sorted.dedup();

    let mut blocks: Vec<ReadBlock> = Vec::new();
    for register in sorted {
        let (address, words) = (register.address(), register.words());
        match blocks.last_mut() {
            Some(block)
                if block.end() == u32::from(address)
                    && block.words + words <= MAX_REQUEST_WORDS =>
            {
                block.words += words;
                block.registers.push(register);
            }
            _ => blocks.push(ReadBlock {
                start: address,
                words,
                registers: vec![register],
            }),
        }
    }
    blocks
}

pub struct ModbusReader {
    host: String,
    port: u16,
    slave: u8,
    timeout: Duration,
    ctx: Option<Context>,
}

impl ModbusReader {
    pub fn new(config: &ModbusConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            slave: config.slave,
            timeout: Duration::from_secs(config.timeout_secs),
            ctx: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    /// Open the connection to the inverter
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        let addr = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or(TransportError::NotConnected)?;

        let ctx = timeout(self.timeout, tcp::connect_slave(addr, Slave(self.slave)))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout.as_secs()))??;

        info!("Connected to Modbus server {} (slave {})", addr, self.slave);
        self.ctx = Some(ctx);
        Ok(())
    }

    async fn read_block(&mut self, block: &ReadBlock) -> Result<Vec<u16>, TransportError> {
        let ctx = self.ctx.as_mut().ok_or(TransportError::NotConnected)?;
        debug!("Reading {} words from address {}", block.words, block.start);

        let response = timeout(self.timeout, ctx.read_holding_registers(block.start, block.words))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| TransportError::Modbus(e.to_string()))?
            .map_err(|code| TransportError::Exception(format!("{code:?}")))?;

        if response.len() != block.words as usize {
            return Err(TransportError::Decode(format!(
                "expected {} words from address {}, got {}",
                block.words,
                block.start,
                response.len()
            )));
        }
        Ok(response)
    }

    async fn read_all(&mut self, registers: &[RegisterId]) -> Result<RawReadingSet, TransportError> {
        let mut readings = RawReadingSet::new();
        for block in plan_requests(registers) {
            let words = self.read_block(&block).await?;
            for register in &block.registers {
                let offset = (register.address() - block.start) as usize;
                let slice = &words[offset..offset + register.words() as usize];
                let value = register.spec().decode(slice)?;
                readings.insert(*register, RegisterValue::from_register(*register, value));
            }
        }
        Ok(readings)
    }
}

impl RegisterReader for ModbusReader {
    async fn read(&mut self, registers: &[RegisterId]) -> Result<RawReadingSet, TransportError> {
        if self.ctx.is_none() {
            self.connect().await?;
        }

        match self.read_all(registers).await {
            Ok(readings) => Ok(readings),
            Err(e) => {
                if !matches!(e, TransportError::Exception(_) | TransportError::Decode(_)) {
                    warn!("Dropping Modbus connection after error: {}", e);
                    self.ctx = None;
                }
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(mut ctx) = self.ctx.take() {
            ctx.disconnect()
                .await
                .map_err(|e| TransportError::Modbus(e.to_string()))?;
            info!("Modbus connection closed");
        }
        Ok(())
    }
}
