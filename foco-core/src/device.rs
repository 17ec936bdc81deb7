//! Device action sink — the boundary to the bulbs themselves.
//!
//! The wire protocol lives outside this crate; implementors translate
//! `set_power` into whatever the bulb speaks. Commands are idempotent, so
//! re-issuing "power on" is harmless.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FocoError, Result};

/// Acknowledgement of an applied power change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub address: String,
    pub on: bool,
}

#[async_trait]
pub trait DeviceSink: Send + Sync + 'static {
    /// Switch one device on or off.
    async fn set_power(&self, address: &str, on: bool) -> Result<Ack>;

    /// Query one device's power state.
    async fn get_power(&self, address: &str) -> Result<bool>;
}

/// Dry-run sink: logs and records every command instead of touching hardware.
#[derive(Debug, Default)]
pub struct LoggingSink {
    state: Mutex<HashMap<String, bool>>,
    history: Mutex<Vec<(String, bool)>>,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `set_power` call so far, in call order.
    pub fn history(&self) -> Vec<(String, bool)> {
        self.history.lock().clone()
    }
}

#[async_trait]
impl DeviceSink for LoggingSink {
    async fn set_power(&self, address: &str, on: bool) -> Result<Ack> {
        info!(address, on, "set_power (dry run)");
        self.state.lock().insert(address.to_string(), on);
        self.history.lock().push((address.to_string(), on));
        Ok(Ack {
            address: address.to_string(),
            on,
        })
    }

    async fn get_power(&self, address: &str) -> Result<bool> {
        self.state
            .lock()
            .get(address)
            .copied()
            .ok_or_else(|| FocoError::Device {
                address: address.to_string(),
                reason: "state unknown".into(),
            })
    }
}
