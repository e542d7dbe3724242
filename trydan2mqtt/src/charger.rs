//! HTTP session with a Trydan charger.
//!
//! The charger exposes two endpoints:
//! - `GET /RealTimeData` returns the full state as a JSON object
//! - `GET /write/<Key>=<value>` changes one setting

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};
use tokio::sync::Mutex;
use trydan_bridge_framework::{
    CommandError, ConnectError, DeviceSession, FieldValue, ReadError, Snapshot,
};

use crate::commands::ChargerCommand;
use crate::config::TrydanConfig;

/// Real-time record returned by `/RealTimeData`.
///
/// Numeric fields are kept as JSON numbers so integers stay integers on the
/// bus. The four `Option` fields are missing on older firmware.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RealTimeData {
    pub charge_state: Number,
    pub intensity: Number,
    pub charge_power: Number,
    pub charge_energy: Number,
    pub charge_time: Number,
    #[serde(default)]
    pub voltage_installation: Option<Number>,
    pub house_power: Number,
    #[serde(default)]
    pub battery_power: Option<Number>,
    #[serde(rename = "FVPower")]
    pub fv_power: Number,
    pub max_intensity: Number,
    pub min_intensity: Number,
    pub ready_state: Number,
    #[serde(deserialize_with = "switch_state")]
    pub locked: bool,
    #[serde(deserialize_with = "switch_state")]
    pub paused: bool,
    #[serde(deserialize_with = "switch_state")]
    pub dynamic: bool,
    #[serde(default)]
    pub contracted_power: Option<Number>,
    pub firmware_version: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(default)]
    pub signal_status: Option<Number>,
}

impl RealTimeData {
    /// Map the charger record onto snapshot field names.
    pub fn into_snapshot(self) -> Snapshot {
        Snapshot::new()
            .with_field("status", number(&self.charge_state))
            .with_field("charging_current", number(&self.intensity))
            .with_field("charging_power", number(&self.charge_power))
            .with_field("energy_delivered", number(&self.charge_energy))
            .with_field("charge_time", number(&self.charge_time))
            .with_optional_field("voltage", self.voltage_installation.as_ref().map(number))
            .with_field("house_power", number(&self.house_power))
            .with_optional_field("battery_power", self.battery_power.as_ref().map(number))
            .with_field("fv_power", number(&self.fv_power))
            .with_field("max_intensity", number(&self.max_intensity))
            .with_field("min_intensity", number(&self.min_intensity))
            .with_field("ready_state", number(&self.ready_state))
            .with_field("locked", self.locked)
            .with_field("paused", self.paused)
            .with_field("dynamic", self.dynamic)
            .with_optional_field(
                "contracted_power",
                self.contracted_power.as_ref().map(number),
            )
            .with_field("firmware_version", self.firmware_version)
            .with_field("device_id", self.id)
            .with_field("ip_address", self.ip)
            .with_optional_field("signal_status", self.signal_status.as_ref().map(number))
    }
}

fn number(n: &Number) -> FieldValue {
    match n.as_i64() {
        Some(i) => FieldValue::Integer(i),
        None => FieldValue::Float(n.as_f64().unwrap_or_default()),
    }
}

/// The charger reports switches as `0`/`1`; accept JSON booleans too.
fn switch_state<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        other => Err(D::Error::custom(format!(
            "expected a 0/1 switch, found {}",
            other
        ))),
    }
}

/// [`DeviceSession`] for a Trydan charger over its local HTTP API.
///
/// Requests are serialized: the charger firmware handles one connection at a
/// time, so the poll loop and the command consumer take turns.
#[derive(Debug)]
pub struct TrydanClient {
    http: reqwest::Client,
    base_url: String,
    timeout: std::time::Duration,
    gate: Mutex<()>,
}

impl TrydanClient {
    pub fn new(config: &TrydanConfig) -> Result<Self, ConnectError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConnectError::Settings(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            timeout: config.timeout(),
            gate: Mutex::new(()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and decode `/RealTimeData`.
    pub async fn real_time_data(&self) -> Result<RealTimeData, ReadError> {
        let url = format!("{}/RealTimeData", self.base_url);

        let body = {
            let _turn = self.gate.lock().await;

            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| self.read_error(e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ReadError::Rejected(format!("HTTP {}", status)));
            }

            response.bytes().await.map_err(|e| self.read_error(e))?
        };

        serde_json::from_slice(&body).map_err(|e| ReadError::Malformed(e.to_string()))
    }

    /// Send one `/write/<key>=<value>` request.
    pub async fn write(&self, key: &str, value: &str) -> Result<(), CommandError> {
        let url = format!("{}/write/{}={}", self.base_url, key, value);
        let _turn = self.gate.lock().await;

        tracing::debug!(url = %url, "Writing charger setting");

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                CommandError::Transport(format!("timed out after {:?}", self.timeout))
            } else {
                CommandError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CommandError::DeviceRejected(format!(
                "{}={} answered HTTP {}",
                key, value, status
            )));
        }

        Ok(())
    }

    fn read_error(&self, e: reqwest::Error) -> ReadError {
        if e.is_timeout() {
            ReadError::Timeout(self.timeout)
        } else {
            ReadError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl DeviceSession for TrydanClient {
    type Command = ChargerCommand;

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }

    /// One real-time read proves the charger is reachable and speaks the
    /// expected format.
    async fn connect(&self) -> Result<(), ConnectError> {
        let data = self.real_time_data().await.map_err(|e| match e {
            ReadError::Timeout(timeout) => ConnectError::Timeout {
                endpoint: self.base_url.clone(),
                timeout,
            },
            ReadError::Transport(message) => ConnectError::Unreachable {
                endpoint: self.base_url.clone(),
                message,
            },
            ReadError::Rejected(reason) | ReadError::Malformed(reason) => {
                ConnectError::Rejected {
                    endpoint: self.base_url.clone(),
                    reason,
                }
            }
        })?;

        tracing::info!(
            endpoint = %self.base_url,
            device_id = %data.id,
            firmware = %data.firmware_version,
            "Charger answered"
        );
        Ok(())
    }

    async fn read_snapshot(&self) -> Result<Snapshot, ReadError> {
        Ok(self.real_time_data().await?.into_snapshot())
    }

    async fn execute(&self, command: &ChargerCommand) -> Result<(), CommandError> {
        let (key, value) = command.write_request();
        self.write(key, &value).await
    }

    async fn disconnect(&self) {
        // Every request is independent; wait for any in-flight one to finish
        let _turn = self.gate.lock().await;
        tracing::debug!(endpoint = %self.base_url, "Charger session released");
    }
}
