//! Deterministic fallback interpreter.
//!
//! Matches normalized text (trimmed, lower-cased, punctuation stripped)
//! against two pattern sets:
//!
//! 1. "all lights" phrasings: an on/off verb plus a plural or collective
//!    noun (`apaga las luces`, `turn off all the lights`).
//! 2. "device N" phrasings: an on/off verb plus a device noun followed by a
//!    digit or a spelled-out number (`enciende el foco 2`,
//!    `apaga la luz número dos`), or preceded by an ordinal word
//!    (`prende el segundo foco`).
//!
//! Spanish is the primary language; common English phrasings are accepted too.
//! Never performs I/O.

use async_trait::async_trait;
use regex::Regex;

use super::{resolve_intent, DeviceAddress, Intent, Interpreter, PowerAction, TargetSpec};
use crate::error::{FocoError, Result};

const OFF_PATTERN: &str = r"\b(?:apaga|apague|apaguen|apagar|desactiva|desactivar)\b|\b(?:turn|switch)\s+(?:\w+\s+){0,3}off\b";
const ON_PATTERN: &str = r"\b(?:enciende|encienda|enciendan|encender|prende|prenda|prendan|prender|activa|activar)\b|\b(?:turn|switch)\s+(?:\w+\s+){0,3}on\b";
const ALL_PATTERN: &str = r"\b(?:luces|focos|bombillas|bombillos|lámparas|lamparas|todo|todos|todas|lights|bulbs|lamps|everything|all)\b";
const DEVICE_NOUNS: &str = r"(?:foco|luz|bombilla|bombillo|lámpara|lampara|dispositivo|device|light|bulb|lamp)";

pub struct PatternInterpreter {
    off: Regex,
    on: Regex,
    all: Regex,
    /// Noun then number: `foco 2`, `luz número dos`.
    numbered: Regex,
    /// Ordinal then noun: `segundo foco`, `third light`.
    ordinal_first: Regex,
}

impl PatternInterpreter {
    /// # Errors
    /// `FocoError::Config` if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        let numbered = format!(
            r"\b{DEVICE_NOUNS}\s+(?:n[úu]mero\s+|number\s+|no\s+)?(\d+|[a-záéíóúñ]+)\b"
        );
        let ordinal_first = format!(r"\b([a-záéíóúñ]+)\s+{DEVICE_NOUNS}\b");
        Ok(Self {
            off: compile(OFF_PATTERN)?,
            on: compile(ON_PATTERN)?,
            all: compile(ALL_PATTERN)?,
            numbered: compile(&numbered)?,
            ordinal_first: compile(&ordinal_first)?,
        })
    }

    /// Interpret `text` synchronously.
    pub fn parse(&self, text: &str, roster: &[DeviceAddress]) -> Intent {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Intent::NoIntent;
        }

        let action = if self.off.is_match(&normalized) {
            PowerAction::PowerOff
        } else if self.on.is_match(&normalized) {
            PowerAction::PowerOn
        } else {
            return Intent::NoIntent;
        };

        let ordinals = self.device_ordinals(&normalized);
        if !ordinals.is_empty() {
            return resolve_intent(action, &TargetSpec::Ordinals(ordinals), roster);
        }
        if self.all.is_match(&normalized) {
            return resolve_intent(action, &TargetSpec::All, roster);
        }
        Intent::NoIntent
    }

    fn device_ordinals(&self, normalized: &str) -> Vec<usize> {
        let numbered = self
            .numbered
            .captures_iter(normalized)
            .filter_map(|caps| caps.get(1).and_then(|m| number_value(m.as_str())));
        let ordinal_first = self
            .ordinal_first
            .captures_iter(normalized)
            .filter_map(|caps| caps.get(1).and_then(|m| ordinal_word_value(m.as_str())));
        numbered.chain(ordinal_first).collect()
    }
}

#[async_trait]
impl Interpreter for PatternInterpreter {
    fn name(&self) -> &'static str {
        "patterns"
    }

    async fn interpret(&self, text: &str, roster: &[DeviceAddress]) -> Result<Intent> {
        Ok(self.parse(text, roster))
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| FocoError::Config(format!("invalid intent pattern: {e}")))
}

fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Digits, cardinals (uno..cinco / one..five) or ordinals (primero..quinto / first..fifth).
fn number_value(token: &str) -> Option<usize> {
    if let Ok(n) = token.parse::<usize>() {
        return Some(n);
    }
    match token {
        "uno" | "una" | "one" => Some(1),
        "dos" | "two" => Some(2),
        "tres" | "three" => Some(3),
        "cuatro" | "four" => Some(4),
        "cinco" | "five" => Some(5),
        _ => ordinal_word_value(token),
    }
}

fn ordinal_word_value(token: &str) -> Option<usize> {
    match token {
        "primer" | "primero" | "primera" | "first" => Some(1),
        "segundo" | "segunda" | "second" => Some(2),
        "tercer" | "tercero" | "tercera" | "third" => Some(3),
        "cuarto" | "cuarta" | "fourth" => Some(4),
        "quinto" | "quinta" | "fifth" => Some(5),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::PowerCommand;

    fn roster() -> Vec<DeviceAddress> {
        vec!["10.0.0.1".into(), "10.0.0.2".into(), "10.0.0.3".into()]
    }

    fn parse(text: &str) -> Intent {
        PatternInterpreter::new().unwrap().parse(text, &roster())
    }

    fn command(action: PowerAction, targets: &[&str]) -> Intent {
        Intent::Command(PowerCommand {
            action,
            targets: targets.iter().map(|t| t.to_string()).collect(),
        })
    }

    #[test]
    fn all_lights_off_in_spanish() {
        assert_eq!(
            parse("apaga las luces"),
            command(PowerAction::PowerOff, &["10.0.0.1", "10.0.0.2", "10.0.0.3"])
        );
    }

    #[test]
    fn numbered_device_on_in_spanish() {
        assert_eq!(
            parse("enciende el foco 2"),
            command(PowerAction::PowerOn, &["10.0.0.2"])
        );
    }

    #[test]
    fn small_talk_is_no_intent() {
        assert!(parse("hola cómo estás").is_none());
        assert!(parse("   ").is_none());
    }

    #[test]
    fn normalization_ignores_case_and_punctuation() {
        assert_eq!(
            parse("  ¡Prende TODAS las luces, por favor!  "),
            command(PowerAction::PowerOn, &["10.0.0.1", "10.0.0.2", "10.0.0.3"])
        );
    }

    #[test]
    fn spelled_out_numbers_and_ordinals() {
        assert_eq!(
            parse("apaga la luz número tres"),
            command(PowerAction::PowerOff, &["10.0.0.3"])
        );
        assert_eq!(
            parse("prende el segundo foco"),
            command(PowerAction::PowerOn, &["10.0.0.2"])
        );
        assert_eq!(
            parse("enciende el foco uno y el foco tres"),
            command(PowerAction::PowerOn, &["10.0.0.1", "10.0.0.3"])
        );
    }

    #[test]
    fn english_phrasings() {
        assert_eq!(
            parse("Turn on the lights"),
            command(PowerAction::PowerOn, &["10.0.0.1", "10.0.0.2", "10.0.0.3"])
        );
        assert_eq!(
            parse("turn the lights off"),
            command(PowerAction::PowerOff, &["10.0.0.1", "10.0.0.2", "10.0.0.3"])
        );
        assert_eq!(
            parse("switch off device 1"),
            command(PowerAction::PowerOff, &["10.0.0.1"])
        );
    }

    #[test]
    fn device_outside_roster_is_no_intent() {
        assert!(parse("enciende el foco 5").is_none());
    }

    #[test]
    fn verb_without_target_is_no_intent() {
        assert!(parse("enciende").is_none());
        assert!(parse("apaga el foco de la sala").is_none());
    }

    #[test]
    fn desactiva_is_not_read_as_activa() {
        assert_eq!(
            parse("desactiva las luces"),
            command(PowerAction::PowerOff, &["10.0.0.1", "10.0.0.2", "10.0.0.3"])
        );
    }
}
