//! FIFO action executor.
//!
//! Actions approved by the debouncer are queued here and applied one at a
//! time: all targets of one action are driven concurrently, and the next
//! action starts only when every target of the previous one has answered or
//! timed out. The controller actor never waits on devices.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::diagnostics::EngineDiagnostics;
use super::EventBus;
use crate::device::DeviceSink;
use crate::intent::PowerCommand;
use crate::ipc::events::{ActionExecutedEvent, ControllerEvent, DeviceResult};

pub(crate) struct ActionExecutor {
    pub sink: Arc<dyn DeviceSink>,
    pub device_timeout: Duration,
    pub events: EventBus,
    pub diagnostics: Arc<EngineDiagnostics>,
}

impl ActionExecutor {
    /// Drain `queue` until every sender is dropped.
    pub(crate) async fn run(self, mut queue: mpsc::UnboundedReceiver<PowerCommand>) {
        while let Some(command) = queue.recv().await {
            let results = self.apply(&command).await;
            let failures = results.iter().filter(|r| !r.ok).count();
            info!(
                action = %command.action,
                targets = results.len(),
                failures,
                "action executed"
            );
            self.events.publish(|seq, at| {
                ControllerEvent::ActionExecuted(ActionExecutedEvent {
                    seq,
                    at,
                    action: command.action,
                    results,
                })
            });
        }
    }

    async fn apply(&self, command: &PowerCommand) -> Vec<DeviceResult> {
        let on = command.action.is_on();
        let mut tasks = JoinSet::new();
        for (idx, address) in command.targets.iter().cloned().enumerate() {
            let sink = Arc::clone(&self.sink);
            let limit = self.device_timeout;
            tasks.spawn(async move {
                let outcome = tokio::time::timeout(limit, sink.set_power(&address, on)).await;
                let result = match outcome {
                    Ok(Ok(_ack)) => DeviceResult {
                        address,
                        ok: true,
                        error: None,
                    },
                    Ok(Err(e)) => DeviceResult {
                        address,
                        ok: false,
                        error: Some(e.to_string()),
                    },
                    Err(_) => DeviceResult {
                        address,
                        ok: false,
                        error: Some(format!("no answer within {} ms", limit.as_millis())),
                    },
                };
                (idx, result)
            });
        }

        let mut indexed = Vec::with_capacity(command.targets.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => indexed.push(entry),
                Err(e) => error!(error = %e, "device task panicked"),
            }
        }
        indexed.sort_by_key(|(idx, _)| *idx);

        let results: Vec<DeviceResult> = indexed.into_iter().map(|(_, r)| r).collect();
        for failed in results.iter().filter(|r| !r.ok) {
            EngineDiagnostics::bump(&self.diagnostics.device_errors);
            warn!(
                address = %failed.address,
                error = failed.error.as_deref().unwrap_or_default(),
                "device action failed"
            );
        }
        results
    }
}
