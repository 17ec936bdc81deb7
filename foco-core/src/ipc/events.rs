//! Events published by the command controller.
//!
//! Every event carries a monotonically increasing `seq` shared across kinds
//! and a wall-clock `at` timestamp. Serialized form is camelCase JSON tagged
//! with `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::{DeviceAddress, PowerAction};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControllerEvent {
    BatchDispatched(BatchDispatchedEvent),
    ChunkProcessed(ChunkProcessedEvent),
    ActionExecuted(ActionExecutedEvent),
    ActionSuppressed(ActionSuppressedEvent),
}

impl ControllerEvent {
    pub fn seq(&self) -> u64 {
        match self {
            ControllerEvent::BatchDispatched(e) => e.seq,
            ControllerEvent::ChunkProcessed(e) => e.seq,
            ControllerEvent::ActionExecuted(e) => e.seq,
            ControllerEvent::ActionSuppressed(e) => e.seq,
        }
    }
}

/// A pending batch was taken and handed to the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDispatchedEvent {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub batch_id: u64,
    pub chunk_ids: Vec<u64>,
}

/// One chunk finished transcription + interpretation (or failed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkProcessedEvent {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub batch_id: u64,
    pub chunk_id: u64,
    pub outcome: ChunkOutcome,
    pub transcript: Option<String>,
    /// Failure reason for `failed` outcomes.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkOutcome {
    Intent,
    NoIntent,
    Failed,
    TimedOut,
}

/// A command passed the debounce check and was sent to every target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionExecutedEvent {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub action: PowerAction,
    pub results: Vec<DeviceResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResult {
    pub address: DeviceAddress,
    pub ok: bool,
    pub error: Option<String>,
}

/// A command arrived too soon after the last executed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSuppressedEvent {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub action: PowerAction,
    pub targets: Vec<DeviceAddress>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_event_serializes_with_type_tag_and_camel_case() {
        let event = ControllerEvent::ChunkProcessed(ChunkProcessedEvent {
            seq: 4,
            at: Utc::now(),
            batch_id: 1,
            chunk_id: 2,
            outcome: ChunkOutcome::TimedOut,
            transcript: None,
            error: None,
        });

        let json = serde_json::to_value(&event).expect("serialize chunk event");
        assert_eq!(json["type"], "chunkProcessed");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["batchId"], 1);
        assert_eq!(json["chunkId"], 2);
        assert_eq!(json["outcome"], "timedOut");

        let round_trip: ControllerEvent =
            serde_json::from_value(json).expect("deserialize chunk event");
        assert_eq!(round_trip.seq(), 4);
    }

    #[test]
    fn executed_event_carries_snake_case_action_and_device_results() {
        let event = ControllerEvent::ActionExecuted(ActionExecutedEvent {
            seq: 9,
            at: Utc::now(),
            action: PowerAction::PowerOn,
            results: vec![DeviceResult {
                address: "10.0.0.2".into(),
                ok: false,
                error: Some("timeout".into()),
            }],
        });

        let json = serde_json::to_value(&event).expect("serialize executed event");
        assert_eq!(json["type"], "actionExecuted");
        assert_eq!(json["action"], "power_on");
        assert_eq!(json["results"][0]["address"], "10.0.0.2");
        assert_eq!(json["results"][0]["ok"], false);
    }

    #[test]
    fn outcome_rejects_unknown_values() {
        assert!(serde_json::from_str::<ChunkOutcome>(r#""TimedOut""#).is_err());
    }
}
