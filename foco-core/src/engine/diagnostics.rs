use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct EngineDiagnostics {
    pub chunks_received: AtomicUsize,
    pub batches_dispatched: AtomicUsize,
    pub chunks_failed: AtomicUsize,
    pub chunks_timed_out: AtomicUsize,
    pub intents_detected: AtomicUsize,
    pub actions_executed: AtomicUsize,
    pub actions_suppressed: AtomicUsize,
    pub device_errors: AtomicUsize,
}

impl EngineDiagnostics {
    pub(crate) fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            chunks_timed_out: self.chunks_timed_out.load(Ordering::Relaxed),
            intents_detected: self.intents_detected.load(Ordering::Relaxed),
            actions_executed: self.actions_executed.load(Ordering::Relaxed),
            actions_suppressed: self.actions_suppressed.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub chunks_received: usize,
    pub batches_dispatched: usize,
    pub chunks_failed: usize,
    pub chunks_timed_out: usize,
    pub intents_detected: usize,
    pub actions_executed: usize,
    pub actions_suppressed: usize,
    pub device_errors: usize,
}
