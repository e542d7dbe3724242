//! End-to-end tests against a fake charger served by axum.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use trydan_bridge_framework::memory::MemoryBus;
use trydan_bridge_framework::{
    BridgeController, BridgeError, BridgeState, CommandError, ConnectError, DeviceSession,
    FieldValue, ReadError, TopicBuilder,
};
use trydan2mqtt::{ChargerCommand, TrydanClient, TrydanConfig};

#[derive(Debug)]
struct FakeState {
    record: Value,
    status: StatusCode,
    delay: Duration,
    writes: Vec<String>,
}

#[derive(Clone)]
struct FakeCharger {
    state: Arc<Mutex<FakeState>>,
    addr: SocketAddr,
}

impl FakeCharger {
    async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeState {
            record: record(),
            status: StatusCode::OK,
            delay: Duration::ZERO,
            writes: Vec::new(),
        }));

        let app = Router::new()
            .route("/RealTimeData", get(real_time_data))
            .route("/write/{assignment}", get(write))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { state, addr }
    }

    fn config(&self) -> TrydanConfig {
        let mut config = TrydanConfig::new("127.0.0.1");
        config.port = Some(self.addr.port());
        config.timeout_secs = 1;
        config
    }

    fn client(&self) -> TrydanClient {
        TrydanClient::new(&self.config()).unwrap()
    }

    fn set_status(&self, status: StatusCode) {
        self.state.lock().unwrap().status = status;
    }

    fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    fn edit_record(&self, edit: impl FnOnce(&mut Value)) {
        edit(&mut self.state.lock().unwrap().record);
    }

    fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }
}

fn record() -> Value {
    json!({
        "ChargeState": 2,
        "ReadyState": 0,
        "ChargePower": 10,
        "ChargeEnergy": 4.2,
        "ChargeTime": 900,
        "HousePower": 1200.0,
        "FVPower": 0,
        "Paused": 0,
        "Locked": 0,
        "Intensity": 16,
        "Dynamic": 1,
        "MinIntensity": 6,
        "MaxIntensity": 32,
        "FirmwareVersion": "2.1.7",
        "ID": "V2C0012345",
        "IP": "192.168.1.50"
    })
}

type Shared = Arc<Mutex<FakeState>>;

async fn real_time_data(State(state): State<Shared>) -> Response {
    let (record, status, delay) = {
        let state = state.lock().unwrap();
        (state.record.clone(), state.status, state.delay)
    };
    tokio::time::sleep(delay).await;

    if status.is_success() {
        axum::Json(record).into_response()
    } else {
        status.into_response()
    }
}

async fn write(State(state): State<Shared>, Path(assignment): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    if !state.status.is_success() {
        return state.status.into_response();
    }
    state.writes.push(assignment);
    "OK".into_response()
}

#[tokio::test]
async fn test_connect_and_read() {
    let charger = FakeCharger::start().await;
    let client = charger.client();

    assert_ok!(client.connect().await);

    let snapshot = client.read_snapshot().await.unwrap();
    assert_eq!(snapshot.get("charging_power"), Some(&FieldValue::Integer(10)));
    assert_eq!(snapshot.get("energy_delivered"), Some(&FieldValue::Float(4.2)));
    assert_eq!(snapshot.get("dynamic"), Some(&FieldValue::Boolean(true)));
    assert_eq!(
        snapshot.get("firmware_version"),
        Some(&FieldValue::Text("2.1.7".to_string()))
    );
    // Older firmware: optional fields are simply absent
    assert!(snapshot.get("voltage").is_none());
    assert_eq!(snapshot.field_count(), 16);
}

#[tokio::test]
async fn test_read_failures() {
    let charger = FakeCharger::start().await;
    let client = charger.client();

    charger.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    let err = client.read_snapshot().await.unwrap_err();
    assert!(matches!(err, ReadError::Rejected(_)));

    charger.set_status(StatusCode::OK);
    charger.edit_record(|record| {
        record.as_object_mut().unwrap().remove("Intensity");
    });
    let err = client.read_snapshot().await.unwrap_err();
    assert!(matches!(err, ReadError::Malformed(_)));

    charger.edit_record(|r| *r = record());
    charger.set_delay(Duration::from_secs(3));
    let err = client.read_snapshot().await.unwrap_err();
    assert!(matches!(err, ReadError::Timeout(_)));
}

#[tokio::test]
async fn test_connect_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = TrydanConfig::new("127.0.0.1");
    config.port = Some(port);
    config.timeout_secs = 1;
    let client = TrydanClient::new(&config).unwrap();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(
        err,
        ConnectError::Unreachable { .. } | ConnectError::Timeout { .. }
    ));
}

#[tokio::test]
async fn test_writes() {
    let charger = FakeCharger::start().await;
    let client = charger.client();

    let command = client.apply_command("set_charge_current", "16").await.unwrap();
    assert_eq!(command, ChargerCommand::SetIntensity(16));
    client.apply_command("pause", "").await.unwrap();
    client.apply_command("locked", "unlock").await.unwrap();
    client.apply_command("dynamic", "off").await.unwrap();
    client
        .apply_command("set", r#"{"charge_current": 10}"#)
        .await
        .unwrap();

    let err = client
        .apply_command("set_charge_current", "abc")
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::InvalidPayload { .. }));

    let err = client.apply_command("reboot", "").await.unwrap_err();
    assert!(matches!(err, CommandError::Unsupported(_)));

    assert_eq!(
        charger.writes(),
        vec![
            "Intensity=16",
            "Paused=1",
            "Locked=0",
            "Dynamic=0",
            "Intensity=10"
        ]
    );

    charger.set_status(StatusCode::BAD_REQUEST);
    let err = client.apply_command("resume", "").await.unwrap_err();
    assert!(matches!(err, CommandError::DeviceRejected(_)));
}

#[tokio::test]
async fn test_bridge_end_to_end() {
    let charger = FakeCharger::start().await;
    let topics = TopicBuilder::new("trydan");
    let bus = MemoryBus::new(topics.clone());
    let cancel = CancellationToken::new();

    let controller = BridgeController::new(
        "trydan2mqtt",
        charger.client(),
        bus.clone(),
        topics,
        cancel.clone(),
    )
    .with_poll_interval(Duration::from_secs(1));
    let mut status = controller.status_watch();
    let handle = tokio::spawn(controller.run());

    status
        .wait_for(|s| s.state == BridgeState::Running)
        .await
        .unwrap();
    assert!(bus.inject("trydan/command/set_charge_current", b"16"));
    assert!(bus.inject("trydan/command/set_charge_current", b"abc"));

    tokio::time::sleep(Duration::from_millis(2500)).await;
    cancel.cancel();
    let stats = assert_ok!(handle.await.unwrap());
    assert_eq!(stats.cycles, 3);

    assert_eq!(charger.writes(), vec!["Intensity=16"]);

    let data = bus.published_to("trydan/data");
    assert_eq!(data.len(), 3);
    let mut timestamps = Vec::new();
    for message in &data {
        let json: Value = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(json["charging_power"], 10);
        timestamps.push(json["timestamp"].as_str().unwrap().to_string());
    }
    timestamps.dedup();
    assert_eq!(timestamps.len(), 3);

    let power = bus.published_to("trydan/sensor/charging_power");
    assert_eq!(power.len(), 3);
    assert_eq!(power[0].payload_str(), "10");
    assert_eq!(
        bus.published_to("trydan/sensor/locked")[0].payload_str(),
        "false"
    );
    // Whole-number floats keep their fractional part, as in /data
    assert_eq!(
        bus.published_to("trydan/sensor/house_power")[0].payload_str(),
        "1200.0"
    );
    let json: Value = serde_json::from_slice(&data[0].payload).unwrap();
    assert_eq!(json["house_power"].to_string(), "1200.0");

    let availability: Vec<String> = bus
        .published_to("trydan/availability")
        .iter()
        .map(|m| m.payload_str())
        .collect();
    assert_eq!(availability, vec!["online", "offline"]);
}

#[tokio::test]
async fn test_bridge_fails_when_charger_unreachable() {
    let charger = FakeCharger::start().await;
    charger.set_status(StatusCode::SERVICE_UNAVAILABLE);

    let topics = TopicBuilder::new("trydan");
    let bus = MemoryBus::new(topics.clone());
    let result = BridgeController::new(
        "trydan2mqtt",
        charger.client(),
        bus.clone(),
        topics,
        CancellationToken::new(),
    )
    .run()
    .await;

    assert!(matches!(result, Err(BridgeError::DeviceConnect(_))));
    assert_eq!(bus.connect_calls(), 0);
    assert!(bus.published().is_empty());
}
