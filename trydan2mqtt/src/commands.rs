//! Charger command protocol.
//!
//! Commands arrive on `<prefix>/command/<name>` with the argument as the raw
//! payload. Each one maps to a single `GET /write/<Key>=<value>` request.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use trydan_bridge_framework::{CommandError, DeviceCommand};

/// Operations the charger accepts from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerCommand {
    /// Set the charge current, in amps.
    SetIntensity(u8),
    /// Set the lower bound for dynamic charging, in amps.
    SetMinIntensity(u8),
    /// Set the upper bound for dynamic charging, in amps.
    SetMaxIntensity(u8),
    Pause,
    Resume,
    Lock,
    Unlock,
    /// Enable or disable dynamic power modulation.
    SetDynamic(bool),
}

impl ChargerCommand {
    /// Register name and value for the charger's write endpoint.
    pub fn write_request(&self) -> (&'static str, String) {
        match self {
            Self::SetIntensity(amps) => ("Intensity", amps.to_string()),
            Self::SetMinIntensity(amps) => ("MinIntensity", amps.to_string()),
            Self::SetMaxIntensity(amps) => ("MaxIntensity", amps.to_string()),
            Self::Pause => ("Paused", "1".to_string()),
            Self::Resume => ("Paused", "0".to_string()),
            Self::Lock => ("Locked", "1".to_string()),
            Self::Unlock => ("Locked", "0".to_string()),
            Self::SetDynamic(on) => ("Dynamic", flag(*on).to_string()),
        }
    }
}

fn flag(on: bool) -> &'static str {
    if on { "1" } else { "0" }
}

impl fmt::Display for ChargerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (key, value) = self.write_request();
        write!(f, "{}={}", key, value)
    }
}

impl DeviceCommand for ChargerCommand {
    fn parse(name: &str, payload: &str) -> Result<Self, CommandError> {
        match name {
            "set_charge_current" | "charge_current" | "intensity" => {
                amps(name, payload).map(Self::SetIntensity)
            }
            "set_min_intensity" => amps(name, payload).map(Self::SetMinIntensity),
            "set_max_intensity" => amps(name, payload).map(Self::SetMaxIntensity),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "lock" => Ok(Self::Lock),
            "unlock" => Ok(Self::Unlock),
            "paused" => paused(name, payload),
            "locked" => locked(name, payload),
            "dynamic" => switch(name, payload, &[], &[]).map(Self::SetDynamic),
            "set" => legacy_set(payload),
            other => Err(CommandError::Unsupported(other.to_string())),
        }
    }
}

/// Parse an amperage: any finite number, truncated, in `0..=255`.
fn amps(name: &str, payload: &str) -> Result<u8, CommandError> {
    let value: f64 = payload
        .trim()
        .parse()
        .map_err(|_| CommandError::invalid_payload(name, payload, "expected a number of amps"))?;
    amps_from(name, payload, value)
}

fn amps_from(name: &str, payload: &str, value: f64) -> Result<u8, CommandError> {
    if !value.is_finite() {
        return Err(CommandError::invalid_payload(
            name,
            payload,
            "amps must be a finite number",
        ));
    }

    let truncated = value.trunc();
    if !(0.0..=255.0).contains(&truncated) {
        return Err(CommandError::invalid_payload(
            name,
            payload,
            "amps must be between 0 and 255",
        ));
    }

    Ok(truncated as u8)
}

/// Parse an on/off token. `extra_on`/`extra_off` add command-specific words.
fn switch(
    name: &str,
    payload: &str,
    extra_on: &[&str],
    extra_off: &[&str],
) -> Result<bool, CommandError> {
    let token = payload.trim().to_ascii_lowercase();
    match token.as_str() {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" => Ok(false),
        t if extra_on.contains(&t) => Ok(true),
        t if extra_off.contains(&t) => Ok(false),
        _ => Err(CommandError::invalid_payload(
            name,
            payload,
            "expected true/false or on/off",
        )),
    }
}

fn paused(name: &str, payload: &str) -> Result<ChargerCommand, CommandError> {
    let pause = switch(name, payload, &["pause", "stop"], &["resume", "start"])?;
    Ok(if pause {
        ChargerCommand::Pause
    } else {
        ChargerCommand::Resume
    })
}

fn locked(name: &str, payload: &str) -> Result<ChargerCommand, CommandError> {
    let lock = switch(name, payload, &["lock"], &["unlock"])?;
    Ok(if lock {
        ChargerCommand::Lock
    } else {
        ChargerCommand::Unlock
    })
}

/// Body of the legacy `set` command. Only the first present key is applied,
/// in field order.
#[derive(Debug, Deserialize)]
struct LegacySet {
    #[serde(default)]
    charge_current: Option<Value>,
    #[serde(default)]
    paused: Option<Value>,
    #[serde(default)]
    locked: Option<Value>,
}

fn legacy_set(payload: &str) -> Result<ChargerCommand, CommandError> {
    let body: LegacySet = serde_json::from_str(payload)
        .map_err(|e| CommandError::invalid_payload("set", payload, e.to_string()))?;

    if let Some(current) = body.charge_current {
        return match current {
            Value::Number(n) => match n.as_f64() {
                Some(value) => amps_from("set", payload, value),
                None => Err(CommandError::invalid_payload("set", payload, "bad number")),
            },
            Value::String(s) => amps("set", &s),
            _ => Err(CommandError::invalid_payload(
                "set",
                payload,
                "charge_current must be a number",
            )),
        }
        .map(ChargerCommand::SetIntensity);
    }

    if let Some(value) = body.paused {
        return paused("set", &token(&value));
    }

    if let Some(value) = body.locked {
        return locked("set", &token(&value));
    }

    Err(CommandError::invalid_payload(
        "set",
        payload,
        "expected one of charge_current, paused, locked",
    ))
}

/// Text form of a JSON scalar, for token matching.
fn token(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
