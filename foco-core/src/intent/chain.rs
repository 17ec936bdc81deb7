//! Ordered interpreter fallback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{DeviceAddress, Intent, Interpreter, PatternInterpreter};
use crate::error::Result;

/// Tries each stage in order; the first stage that yields a command wins.
///
/// A stage that errors or returns `NoIntent` hands over to the next one. The
/// chain itself never fails: exhausting every stage yields `NoIntent`.
#[derive(Clone)]
pub struct InterpreterChain {
    stages: Vec<Arc<dyn Interpreter>>,
}

impl InterpreterChain {
    pub fn new(stages: Vec<Arc<dyn Interpreter>>) -> Self {
        Self { stages }
    }

    /// `primary` first, then the pattern fallback.
    ///
    /// # Errors
    /// Propagates pattern compilation failures.
    pub fn with_pattern_fallback(primary: Arc<dyn Interpreter>) -> Result<Self> {
        Ok(Self::new(vec![primary, Arc::new(PatternInterpreter::new()?)]))
    }

    /// Pattern matching only (no external service).
    pub fn patterns_only() -> Result<Self> {
        Ok(Self::new(vec![Arc::new(PatternInterpreter::new()?)]))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl std::fmt::Debug for InterpreterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterChain")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[async_trait]
impl Interpreter for InterpreterChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn interpret(&self, text: &str, roster: &[DeviceAddress]) -> Result<Intent> {
        for stage in &self.stages {
            match stage.interpret(text, roster).await {
                Ok(Intent::Command(cmd)) => {
                    debug!(stage = stage.name(), action = %cmd.action, targets = cmd.targets.len(), "intent detected");
                    return Ok(Intent::Command(cmd));
                }
                Ok(Intent::NoIntent) => {
                    debug!(stage = stage.name(), "no intent — trying next stage");
                }
                Err(e) => {
                    warn!(stage = stage.name(), error = %e, "interpreter failed — trying next stage");
                }
            }
        }
        Ok(Intent::NoIntent)
    }
}
