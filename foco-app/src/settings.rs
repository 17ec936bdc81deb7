//! Persistent application settings (JSON file in the app data directory).
//!
//! Precedence, lowest first: built-in defaults, the settings file, `FOCO_*`
//! environment variables, command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use foco_core::intent::llm::{DEFAULT_INTERPRETER_ENDPOINT, DEFAULT_INTERPRETER_MODEL};
use foco_core::transcription::whisper::{
    DEFAULT_LANGUAGE, DEFAULT_TRANSCRIPTION_ENDPOINT, DEFAULT_TRANSCRIPTION_MODEL,
};
use foco_core::EngineConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

const MAX_DEVICES: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub preferred_input_device: Option<String>,
    /// Device roster; position N answers to "foco N".
    pub devices: Vec<String>,
    pub openai_api_key: Option<String>,
    pub transcription_endpoint: String,
    pub transcription_model: String,
    pub language: String,
    pub transcription_timeout_secs: u64,
    /// Use the hosted interpreter ahead of the local patterns.
    pub llm_enabled: bool,
    pub interpreter_endpoint: String,
    pub interpreter_model: String,
    pub interpreter_timeout_secs: u64,
    pub engine: EngineConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preferred_input_device: None,
            devices: Vec::new(),
            openai_api_key: None,
            transcription_endpoint: DEFAULT_TRANSCRIPTION_ENDPOINT.into(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.into(),
            language: DEFAULT_LANGUAGE.into(),
            transcription_timeout_secs: 20,
            llm_enabled: true,
            interpreter_endpoint: DEFAULT_INTERPRETER_ENDPOINT.into(),
            interpreter_model: DEFAULT_INTERPRETER_MODEL.into(),
            interpreter_timeout_secs: 8,
            engine: EngineConfig::default(),
        }
    }
}

/// What gets logged at startup: no secrets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSettings {
    pub device_count: usize,
    pub has_openai_api_key: bool,
    pub llm_enabled: bool,
    pub language: String,
    pub engine: EngineConfig,
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.devices = normalize_devices(&self.devices);
        self.openai_api_key = trimmed(self.openai_api_key.as_deref());
        self.preferred_input_device = trimmed(self.preferred_input_device.as_deref());
        self.transcription_endpoint =
            or_default(&self.transcription_endpoint, DEFAULT_TRANSCRIPTION_ENDPOINT);
        self.transcription_model = or_default(&self.transcription_model, DEFAULT_TRANSCRIPTION_MODEL);
        self.interpreter_endpoint =
            or_default(&self.interpreter_endpoint, DEFAULT_INTERPRETER_ENDPOINT);
        self.interpreter_model = or_default(&self.interpreter_model, DEFAULT_INTERPRETER_MODEL);
        self.language = normalize_language(&self.language);
        self.transcription_timeout_secs = self.transcription_timeout_secs.clamp(1, 300);
        self.interpreter_timeout_secs = self.interpreter_timeout_secs.clamp(1, 120);

        let engine = &mut self.engine;
        engine.chunk_duration_ms = engine.chunk_duration_ms.clamp(250, 30_000);
        engine.batch_size = engine.batch_size.clamp(1, 32);
        engine.batch_timeout_ms = engine.batch_timeout_ms.clamp(50, 60_000);
        engine.debounce_ms = engine.debounce_ms.min(60_000);
        engine.max_concurrency = engine.max_concurrency.clamp(1, 32);
        engine.chunk_timeout_ms = engine.chunk_timeout_ms.clamp(1_000, 300_000);
        engine.device_timeout_ms = engine.device_timeout_ms.clamp(100, 60_000);
    }

    /// Let `FOCO_*` variables override credentials, endpoints and the roster.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("FOCO_OPENAI_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.openai_api_key = Some(key);
        }
        if let Some(endpoint) = lookup("FOCO_TRANSCRIPTION_ENDPOINT") {
            self.transcription_endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("FOCO_INTERPRETER_ENDPOINT") {
            self.interpreter_endpoint = endpoint;
        }
        if let Some(language) = lookup("FOCO_LANGUAGE") {
            self.language = language;
        }
        if let Some(devices) = lookup("FOCO_DEVICES") {
            self.devices = devices.split(',').map(str::to_string).collect();
        }
        if let Some(flag) = lookup("FOCO_LLM") {
            self.llm_enabled = !matches!(flag.trim(), "0" | "false" | "off");
        }
        self.normalize();
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            device_count: self.devices.len(),
            has_openai_api_key: self.openai_api_key.is_some(),
            llm_enabled: self.llm_enabled,
            language: self.language.clone(),
            engine: self.engine.clone(),
        }
    }
}

pub fn normalize_language(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "en" | "eng" | "english" | "ingles" | "inglés" => "en".into(),
        "" | "es" | "spa" | "spanish" | "espanol" | "español" => "es".into(),
        other if other.len() == 2 => other.into(),
        _ => DEFAULT_LANGUAGE.into(),
    }
}

fn normalize_devices(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for device in raw {
        let normalized = device.trim();
        if normalized.is_empty() || out.iter().any(|d| d == normalized) {
            continue;
        }
        out.push(normalized.to_string());
        if out.len() >= MAX_DEVICES {
            break;
        }
    }
    out
}

fn trimmed(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn or_default(raw: &str, default: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        default.into()
    } else {
        value.into()
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Foco")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".config")
            })
            .join("foco")
            .join("settings.json")
    }
}

/// Missing file means defaults; an unreadable one is logged and ignored.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "invalid settings file — using defaults");
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"devices": ["10.0.0.5"], "engine": {"batchSize": 3}}"#)
                .unwrap();
        assert_eq!(settings.devices, vec!["10.0.0.5"]);
        assert_eq!(settings.engine.batch_size, 3);
        assert_eq!(settings.engine.debounce_ms, 1_000);
        assert_eq!(settings.language, "es");
        assert!(settings.llm_enabled);
    }

    #[test]
    fn normalize_cleans_roster_and_clamps_engine() {
        let mut settings = AppSettings {
            devices: vec![" 10.0.0.5 ".into(), "".into(), "10.0.0.5".into(), "10.0.0.6".into()],
            openai_api_key: Some("   ".into()),
            language: "Spanish".into(),
            ..AppSettings::default()
        };
        settings.engine.batch_size = 0;
        settings.engine.max_concurrency = 500;
        settings.normalize();

        assert_eq!(settings.devices, vec!["10.0.0.5", "10.0.0.6"]);
        assert_eq!(settings.openai_api_key, None);
        assert_eq!(settings.language, "es");
        assert_eq!(settings.engine.batch_size, 1);
        assert_eq!(settings.engine.max_concurrency, 32);
        assert!(settings.engine.validate().is_ok());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("FOCO_OPENAI_API_KEY", "sk-test"),
            ("FOCO_DEVICES", "10.0.0.7, 10.0.0.8"),
            ("FOCO_LLM", "off"),
        ]);
        let mut settings = AppSettings {
            devices: vec!["10.0.0.1".into()],
            ..AppSettings::default()
        };
        settings.apply_overrides_from(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.devices, vec!["10.0.0.7", "10.0.0.8"]);
        assert!(!settings.llm_enabled);
    }

    #[test]
    fn runtime_settings_hide_the_key() {
        let settings = AppSettings {
            openai_api_key: Some("sk-secret".into()),
            ..AppSettings::default()
        };
        let json = serde_json::to_string(&settings.runtime_settings()).unwrap();
        assert!(json.contains("\"hasOpenaiApiKey\":true"));
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = std::env::temp_dir().join(format!("foco-settings-{}", std::process::id()));
        let path = dir.join("settings.json");
        let settings = AppSettings {
            devices: vec!["10.0.0.9".into()],
            llm_enabled: false,
            ..AppSettings::default()
        };
        save_settings(&path, &settings).unwrap();

        let loaded = load_settings(&path);
        assert_eq!(loaded.devices, vec!["10.0.0.9"]);
        assert!(!loaded.llm_enabled);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let loaded = load_settings(Path::new("/nonexistent/foco/settings.json"));
        assert_eq!(loaded.transcription_model, DEFAULT_TRANSCRIPTION_MODEL);
    }
}
