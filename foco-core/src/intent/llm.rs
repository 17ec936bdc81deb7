//! Hosted natural-language interpretation over an OpenAI-style chat API.
//!
//! The model is told to answer with a single JSON object:
//!
//! ```text
//! {"action": "power_on" | "power_off" | null, "targets": "all" | [1, 2, ...]}
//! ```
//!
//! Answers are extracted defensively: code fences and surrounding prose are
//! ignored, and anything that does not fit the shape is `NoIntent`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{resolve_intent, DeviceAddress, Intent, Interpreter, PowerAction, TargetSpec};
use crate::error::{FocoError, Result};

pub const DEFAULT_INTERPRETER_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_INTERPRETER_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You control smart light bulbs. Devices are referred to by position: \
\"device 1\", \"device 2\", and so on. Read the user's spoken command (it may be in Spanish or English) \
and reply with ONLY a JSON object of the form \
{\"action\": \"power_on\" | \"power_off\" | null, \"targets\": \"all\" | [positions]}. \
Use \"all\" when the command refers to every light. Use null as the action when the text is not a \
lighting command. Do not add explanations.";

#[derive(Clone)]
pub struct LlmConfig {
    /// Bearer token. Required.
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    /// Strict whole-request timeout.
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_INTERPRETER_ENDPOINT.into(),
            model: DEFAULT_INTERPRETER_MODEL.into(),
            timeout: Duration::from_secs(8),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug)]
pub struct LlmInterpreter {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmInterpreter {
    /// # Errors
    /// `FocoError::Config` if the API key or endpoint is empty, or the HTTP
    /// client cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(FocoError::Config("interpreter API key is required".into()));
        }
        if config.endpoint.trim().is_empty() {
            return Err(FocoError::Config("interpreter endpoint is required".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FocoError::Config(format!("interpreter client build failed: {e}")))?;
        Ok(Self { client, config })
    }

    fn request_body(&self, text: &str, roster_len: usize) -> Value {
        json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(text, roster_len) },
            ],
        })
    }
}

#[async_trait]
impl Interpreter for LlmInterpreter {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn interpret(&self, text: &str, roster: &[DeviceAddress]) -> Result<Intent> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(text, roster.len()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FocoError::Interpretation(format!(
                "service returned {status}: {body}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| FocoError::Interpretation(format!("unparseable response: {e}")))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!(answer = %content, "interpreter answered");
        Ok(parse_answer(&content, roster))
    }
}

fn user_prompt(text: &str, roster_len: usize) -> String {
    let devices = (1..=roster_len)
        .map(|n| format!("device {n}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Available devices: {devices}.\nCommand: {text}")
}

/// Parse the model's answer into an intent against `roster`.
///
/// Tolerates code fences and prose around the JSON object. Malformed answers
/// are `NoIntent`.
pub fn parse_answer(content: &str, roster: &[DeviceAddress]) -> Intent {
    let Some(payload) = extract_json_object(content) else {
        warn!(answer = %content, "interpreter answer has no JSON object");
        return Intent::NoIntent;
    };
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "interpreter answer is not valid JSON");
            return Intent::NoIntent;
        }
    };

    let action = match value.get("action") {
        None | Some(Value::Null) => return Intent::NoIntent,
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "power_on" | "on" => PowerAction::PowerOn,
            "power_off" | "off" => PowerAction::PowerOff,
            "null" | "none" | "" => return Intent::NoIntent,
            other => {
                warn!(action = other, "interpreter returned unknown action");
                return Intent::NoIntent;
            }
        },
        Some(other) => {
            warn!(action = %other, "interpreter returned non-string action");
            return Intent::NoIntent;
        }
    };

    let Some(targets) = value.get("targets").and_then(parse_targets) else {
        warn!("interpreter returned malformed targets");
        return Intent::NoIntent;
    };
    resolve_intent(action, &targets, roster)
}

fn parse_targets(value: &Value) -> Option<TargetSpec> {
    match value {
        Value::String(s) if s.trim().eq_ignore_ascii_case("all") => Some(TargetSpec::All),
        Value::Array(items) => Some(TargetSpec::Ordinals(
            items.iter().filter_map(ordinal_from_value).collect(),
        )),
        Value::Number(_) => ordinal_from_value(value).map(|n| TargetSpec::Ordinals(vec![n])),
        _ => None,
    }
}

fn ordinal_from_value(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::PowerCommand;

    fn roster() -> Vec<DeviceAddress> {
        vec!["10.0.0.1".into(), "10.0.0.2".into(), "10.0.0.3".into()]
    }

    #[test]
    fn plain_answer_with_all_targets() {
        let intent = parse_answer(r#"{"action":"power_off","targets":"all"}"#, &roster());
        assert_eq!(
            intent,
            Intent::Command(PowerCommand {
                action: PowerAction::PowerOff,
                targets: roster(),
            })
        );
    }

    #[test]
    fn fenced_answer_with_surrounding_prose() {
        let content = "Sure!\n```json\n{\"action\": \"power_on\", \"targets\": [2]}\n```";
        let intent = parse_answer(content, &roster());
        assert_eq!(intent.command().unwrap().targets, vec!["10.0.0.2".to_string()]);
    }

    #[test]
    fn out_of_range_positions_are_dropped() {
        let intent = parse_answer(r#"{"action":"power_on","targets":[1,7]}"#, &roster());
        assert_eq!(intent.command().unwrap().targets, vec!["10.0.0.1".to_string()]);

        let none = parse_answer(r#"{"action":"power_on","targets":[7]}"#, &roster());
        assert!(none.is_none());
    }

    #[test]
    fn null_action_is_no_intent() {
        assert!(parse_answer(r#"{"action":null,"targets":"all"}"#, &roster()).is_none());
    }

    #[test]
    fn malformed_answers_are_no_intent() {
        assert!(parse_answer("I cannot help with that.", &roster()).is_none());
        assert!(parse_answer("{not json}", &roster()).is_none());
        assert!(parse_answer(r#"{"action":"dim","targets":"all"}"#, &roster()).is_none());
        assert!(parse_answer(r#"{"action":"power_on","targets":{"x":1}}"#, &roster()).is_none());
        assert!(parse_answer(r#"{"action":"power_on"}"#, &roster()).is_none());
    }

    #[test]
    fn numeric_strings_are_accepted_as_positions() {
        let intent = parse_answer(r#"{"action":"power_on","targets":["3"]}"#, &roster());
        assert_eq!(intent.command().unwrap().targets, vec!["10.0.0.3".to_string()]);
    }

    #[test]
    fn user_prompt_lists_positions() {
        assert_eq!(
            user_prompt("apaga todo", 2),
            "Available devices: device 1, device 2.\nCommand: apaga todo"
        );
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        assert!(matches!(
            LlmInterpreter::new(LlmConfig::new("")),
            Err(FocoError::Config(_))
        ));
    }
}
