mod app;
mod catalog;
mod cli;
mod config;
mod diagnosis;
mod error;
mod hw;
mod notification;
mod session;
mod telemetry;
mod terminal;
mod utils;

pub use app::{
    fake_hardware, no_hardware, real_hardware, run, run_with_clients,
    run_with_clients_and_log_level, run_with_log_level,
};
pub use catalog::{DeviceCatalog, simulated_catalog};
pub use cli::{
    Args, Command, DeviceArgs, FakeArgs, LogLevel, OutputFormat, ScanArgs, ScanSource,
    SettingsOverrides,
};
pub use config::{Settings, SettingsStore};
pub use diagnosis::{
    DEFAULT_DIAGNOSIS_TIMEOUT, DetectedIssue, DiagnosisOrigin, DiagnosisResult, DiagnosisService,
    DiagnosticsOrchestrator, LocalRuleEngine, RiskLevel, ServiceClient, ServiceStatus, Severity,
    SuggestedFix, TranslationTable,
};
pub use error::{
    ConfigError, FixtureError, InteractionError, ReadError, RemoteError, SchemaError,
    SessionError,
};
pub use hw::{
    BATTERY_LEVEL_KEY, BluetoothBackend, CapabilityProbe, CharacteristicRef, DEFAULT_SCAN_WINDOW,
    Device, DeviceFilter, DeviceInfoRecord, DeviceOrigin, DeviceType, DiscoveryFailure,
    FakeBackend, FakeBackendConfig, FakeBackendStats, GattConnection, GattFixture,
    GattInfoReader, GattServiceRef, HardwareBackendKind, ReadFailure, ScanFixture,
};
pub use notification::{
    DEFAULT_NOTIFICATION_TTL, Notification, NotificationId, NotificationKind, NotificationQueue,
};
pub use session::{
    CatalogSource, DEFAULT_FIX_DELAY, OperationKind, ScanOutcome, SessionManager,
    SessionSnapshot, SessionState,
};
pub use terminal::TerminalClient;
