//! Intent interpretation.
//!
//! An `Interpreter` turns transcribed text plus a roster snapshot into an
//! `Intent`. Two implementations exist: `LlmInterpreter` (hosted NLU) and
//! `PatternInterpreter` (deterministic regex fallback). `InterpreterChain`
//! tries them in order and returns the first command found.

pub mod chain;
pub mod llm;
pub mod patterns;

pub use chain::InterpreterChain;
pub use llm::{LlmConfig, LlmInterpreter};
pub use patterns::PatternInterpreter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Network address of a controllable bulb (e.g. `"192.168.1.40"`).
pub type DeviceAddress = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    PowerOn,
    PowerOff,
}

impl PowerAction {
    pub fn is_on(self) -> bool {
        self == PowerAction::PowerOn
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PowerAction::PowerOn => "power_on",
            PowerAction::PowerOff => "power_off",
        }
    }
}

impl std::fmt::Display for PowerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action resolved against a concrete roster snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerCommand {
    pub action: PowerAction,
    /// Distinct addresses, in roster order.
    pub targets: Vec<DeviceAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Command(PowerCommand),
    NoIntent,
}

impl Intent {
    pub fn command(&self) -> Option<&PowerCommand> {
        match self {
            Intent::Command(cmd) => Some(cmd),
            Intent::NoIntent => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Intent::NoIntent)
    }
}

/// Devices named by an utterance, before roster resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    All,
    /// 1-indexed roster positions.
    Ordinals(Vec<usize>),
}

/// Map an action and target spec onto `roster`.
///
/// Ordinals outside `1..=roster.len()` are dropped and duplicates collapse.
/// An empty target set yields `Intent::NoIntent`.
pub fn resolve_intent(
    action: PowerAction,
    targets: &TargetSpec,
    roster: &[DeviceAddress],
) -> Intent {
    let resolved: Vec<DeviceAddress> = match targets {
        TargetSpec::All => roster.to_vec(),
        TargetSpec::Ordinals(ordinals) => {
            let mut positions: Vec<usize> = ordinals
                .iter()
                .copied()
                .filter(|&n| n >= 1 && n <= roster.len())
                .collect();
            positions.sort_unstable();
            positions.dedup();
            positions.into_iter().map(|n| roster[n - 1].clone()).collect()
        }
    };

    if resolved.is_empty() {
        Intent::NoIntent
    } else {
        Intent::Command(PowerCommand {
            action,
            targets: resolved,
        })
    }
}

/// Contract for text → intent backends.
#[async_trait]
pub trait Interpreter: Send + Sync + 'static {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Interpret `text` against a roster snapshot.
    ///
    /// # Errors
    /// Backend failures (transport, status, timeout). Malformed answers are
    /// reported as `Ok(Intent::NoIntent)`.
    async fn interpret(&self, text: &str, roster: &[DeviceAddress]) -> Result<Intent>;
}
