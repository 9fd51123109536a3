use thiserror::Error;
use uuid::Uuid;

use crate::session::{OperationKind, SessionState};

/// Errors returned by the Bluetooth hardware boundary.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("BLE operation failed")]
    Ble(#[source] btleplug::Error),
    #[error("no BLE adapters were found")]
    NoAdapters,
    #[error("Bluetooth permissions denied")]
    PermissionDenied,
    #[error("no Bluetooth device selected")]
    NoDeviceSelected,
    #[error("peripheral `{device_id}` is not known to the backend; scan again")]
    UnknownPeripheral { device_id: String },
    #[error("peripheral `{device_id}` refused the connection")]
    ConnectRejected { device_id: String },
    #[error("peripheral `{device_id}` is not connected")]
    NotConnected { device_id: String },
    #[error("service {uuid} is not exposed by the peripheral")]
    MissingService { uuid: Uuid },
    #[error("characteristic {uuid} is not exposed by the peripheral")]
    MissingCharacteristic { uuid: Uuid },
    #[error("characteristic {uuid} does not support reads")]
    UnreadableCharacteristic { uuid: Uuid },
}

impl From<btleplug::Error> for InteractionError {
    fn from(error: btleplug::Error) -> Self {
        match error {
            btleplug::Error::PermissionDenied => Self::PermissionDenied,
            other => Self::Ble(other),
        }
    }
}

/// Errors returned when parsing fake backend fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("the fake discovery fixture is empty")]
    EmptyFixture,
    #[error("fixture records must contain three or four pipe-delimited fields")]
    InvalidRecordFieldCount,
    #[error("fixture records cannot contain empty mandatory fields")]
    EmptyRecordField,
    #[error("failed to parse RSSI value")]
    InvalidRssi(#[source] std::num::ParseIntError),
    #[error("invalid battery level `{value}`")]
    InvalidBatteryLevel { value: String },
}

/// Failure of a single characteristic read during a GATT info pass.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("service {uuid} is unavailable")]
    MissingService {
        uuid: Uuid,
        #[source]
        source: InteractionError,
    },
    #[error("characteristic {uuid} is unavailable")]
    MissingCharacteristic {
        uuid: Uuid,
        #[source]
        source: InteractionError,
    },
    #[error("failed to read characteristic {uuid}")]
    Transport {
        uuid: Uuid,
        #[source]
        source: InteractionError,
    },
    #[error("characteristic {uuid} returned an empty payload")]
    EmptyPayload { uuid: Uuid },
    #[error("battery level {value} is outside 0..=100")]
    BatteryOutOfRange { value: u8 },
    #[error("characteristic {uuid} is not valid UTF-8")]
    Utf8 {
        uuid: Uuid,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Errors surfaced by the session state machine.
///
/// Every variant leaves the session in its last stable state.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Bluetooth permissions denied")]
    PermissionDenied,
    #[error("please select a device first")]
    NoDeviceSelected,
    #[error("no device with id `{id}` is in the current device list")]
    UnknownDevice { id: String },
    #[error("`{operation}` is already in progress")]
    OperationInProgress { operation: OperationKind },
    #[error("connection to `{device}` failed")]
    ConnectionFailed {
        device: String,
        #[source]
        source: InteractionError,
    },
    #[error("no device is connected")]
    NotConnected,
    #[error("run a diagnosis before applying a fix")]
    NoDiagnosis,
    #[error("`{operation}` is not allowed while the session is {state}")]
    InvalidState {
        operation: OperationKind,
        state: SessionState,
    },
    #[error("`{operation}` was cancelled by a disconnect")]
    Cancelled { operation: OperationKind },
}

/// Errors returned by the remote analysis service boundary.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("service not reachable at {url}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),
    #[error("invalid service URL: {0}")]
    InvalidUrl(String),
    #[error("service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("service rejected the request: {message}")]
    Rejected { message: String },
    #[error("service response was not valid JSON")]
    Decode(#[source] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("service did not answer within {timeout_ms} ms")]
    TimedOut { timeout_ms: u128 },
}

/// Shape violations found while validating a remote diagnosis payload.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },
    #[error("field `{field}` must be within 0..=1, got {value}")]
    OutOfUnitRange { field: String, value: f64 },
    #[error("field `{field}` has unknown value `{value}`")]
    UnknownVariant { field: String, value: String },
    #[error("field `{field}` must not be empty")]
    Empty { field: String },
}

/// Errors returned while loading or saving persisted settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read or write settings at `{path}`")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file `{path}` is not valid")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors returned when validating runtime backend options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("missing fake scan fixture while fake mode is enabled")]
    MissingFakeScanFixture,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}
