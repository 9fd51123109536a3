use std::path::PathBuf;
use std::time::Duration;

use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::config::Settings;
use crate::error::{CliConfigError, FixtureError};
use crate::hw::{DiscoveryFailure, FakeBackendConfig, GattFixture, ScanFixture};

/// Command-line options for the Bluetooth troubleshooting tool.
#[derive(Debug, Parser)]
#[command(
    name = "btfix",
    about = "Find, inspect, diagnose and fix Bluetooth devices."
)]
pub struct Args {
    /// Log verbosity; overrides `RUST_LOG`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format; defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    output_format: Option<OutputFormat>,
    /// Settings file to use instead of the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Base URL of the diagnosis service.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Upper bound on one diagnosis request (e.g. `500ms`, `10s`).
    #[arg(long, global = true, value_parser = parse_duration)]
    diagnosis_timeout: Option<Duration>,
    /// How long the real backend scans for devices.
    #[arg(long, global = true, value_parser = parse_duration)]
    scan_window: Option<Duration>,
    /// Duration of the simulated fix.
    #[arg(long, global = true, value_parser = parse_duration)]
    fix_delay: Option<Duration>,
    /// Language code for labels, fetched from the diagnosis service.
    #[arg(long, global = true)]
    language: Option<String>,
    /// Only picks devices whose advertised name starts with this prefix.
    #[arg(long, global = true)]
    name_prefix: Option<String>,
    /// Diagnoses with the built-in rule engine instead of the service.
    #[arg(long, global = true)]
    offline: bool,
    /// Never touches Bluetooth hardware; serves the demo catalog.
    #[arg(long, global = true, conflicts_with = "fake")]
    no_hardware: bool,
    /// Uses the fake BLE backend with fixture-driven discovery.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake scan fixtures in the form `device_id|name|rssi[|battery];...`.
    #[arg(long, global = true, requires = "fake", required_if_eq("fake", "true"))]
    fake_scan: Option<ScanFixture>,
    /// GATT tree exposed by fake peripherals.
    #[arg(long, global = true, requires = "fake", value_enum)]
    fake_gatt: Option<GattFixture>,
    /// Failure injected into every fake discovery.
    #[arg(long, global = true, requires = "fake", value_enum)]
    fake_discovery_failure: Option<DiscoveryFailure>,
    /// Artificial fake scan delay (e.g. `250ms`, `2s`).
    #[arg(long, global = true, requires = "fake", value_parser = parse_duration)]
    fake_discovery_delay: Option<Duration>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use btfix::{Args, Command, DeviceArgs};
    ///
    /// let status = Args::new(Command::Status);
    /// let inspect = Args::new(Command::Inspect(DeviceArgs::new("04:5F:01:02:03")));
    /// let _ = (status, inspect);
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            output_format: None,
            config: None,
            server_url: None,
            diagnosis_timeout: None,
            scan_window: None,
            fix_delay: None,
            language: None,
            name_prefix: None,
            offline: false,
            no_hardware: false,
            fake: false,
            fake_scan: None,
            fake_gatt: None,
            fake_discovery_failure: None,
            fake_discovery_delay: None,
            command,
        }
    }

    /// Enables fake backend mode with pre-parsed fake configuration.
    #[must_use]
    pub fn with_fake(mut self, fake: FakeArgs) -> Self {
        let FakeArgs {
            scan_fixture,
            gatt,
            discovery_failure,
            discovery_delay,
        } = fake;

        self.fake = true;
        self.no_hardware = false;
        self.fake_scan = Some(scan_fixture);
        self.fake_gatt = Some(gatt);
        self.fake_discovery_failure = discovery_failure;
        self.fake_discovery_delay = Some(discovery_delay);
        self
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }

    /// Whether hardware access was disabled with `--no-hardware`.
    #[must_use]
    pub fn no_hardware(&self) -> bool {
        self.no_hardware
    }

    /// Collects the flags that override persisted settings.
    #[must_use]
    pub fn settings_overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            config_path: self.config.clone(),
            server_url: self.server_url.clone(),
            diagnosis_timeout: self.diagnosis_timeout,
            scan_window: self.scan_window,
            fix_delay: self.fix_delay,
            language: self.language.clone(),
            name_prefix: self.name_prefix.clone(),
            offline: self.offline,
        }
    }

    /// Splits parsed CLI arguments into command and optional fake-backend settings.
    ///
    /// # Errors
    ///
    /// Returns an error if CLI backend configuration is invalid.
    pub fn into_command_and_fake_args(self) -> anyhow::Result<(Command, Option<FakeArgs>)> {
        let Args {
            fake,
            fake_scan,
            fake_gatt,
            fake_discovery_failure,
            fake_discovery_delay,
            command,
            ..
        } = self;

        let fake_args = if fake {
            let Some(scan_fixture) = fake_scan else {
                return Err(CliConfigError::MissingFakeScanFixture.into());
            };
            Some(FakeArgs {
                scan_fixture,
                gatt: fake_gatt.unwrap_or_default(),
                discovery_failure: fake_discovery_failure,
                discovery_delay: fake_discovery_delay.unwrap_or(Duration::ZERO),
            })
        } else {
            None
        };

        Ok((command, fake_args))
    }
}

/// Fake backend arguments for programmatic runs.
#[derive(Debug, Builder)]
#[builder(derive(Debug))]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    scan_fixture: ScanFixture,
    #[builder(default)]
    gatt: GattFixture,
    discovery_failure: Option<DiscoveryFailure>,
    #[builder(default)]
    discovery_delay: Duration,
}

impl FakeArgs {
    pub(crate) fn into_backend_config(self) -> FakeBackendConfig {
        let Self {
            scan_fixture,
            gatt,
            discovery_failure,
            discovery_delay,
        } = self;

        FakeBackendConfig::builder()
            .scan_fixture(scan_fixture)
            .gatt(gatt)
            .maybe_discovery_failure(discovery_failure)
            .discovery_delay(discovery_delay)
            .build()
    }
}

/// Command-line values layered over the settings file.
#[derive(Debug, Clone, Default, Builder)]
pub struct SettingsOverrides {
    config_path: Option<PathBuf>,
    #[builder(into)]
    server_url: Option<String>,
    diagnosis_timeout: Option<Duration>,
    scan_window: Option<Duration>,
    fix_delay: Option<Duration>,
    #[builder(into)]
    language: Option<String>,
    #[builder(into)]
    name_prefix: Option<String>,
    #[builder(default)]
    offline: bool,
}

impl SettingsOverrides {
    #[must_use]
    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    #[must_use]
    pub fn offline(&self) -> bool {
        self.offline
    }

    /// Returns `settings` with every flag that was given applied on top.
    #[must_use]
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(server_url) = &self.server_url {
            settings.server_url.clone_from(server_url);
        }
        if let Some(language) = &self.language {
            settings.language.clone_from(language);
        }
        if let Some(name_prefix) = &self.name_prefix {
            settings.name_prefix = Some(name_prefix.clone());
        }
        settings.diagnosis_timeout = self.diagnosis_timeout.unwrap_or(settings.diagnosis_timeout);
        settings.scan_window = self.scan_window.unwrap_or(settings.scan_window);
        settings.fix_delay = self.fix_delay.unwrap_or(settings.fix_delay);
        settings
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List nearby devices, or the demo catalog when no hardware is usable.
    Scan(ScanArgs),
    /// Connect to a device and print its device information.
    Inspect(DeviceArgs),
    /// Connect to a device and run a diagnosis.
    Diagnose(DeviceArgs),
    /// Diagnose a device, then apply the suggested fix.
    Fix(DeviceArgs),
    /// Report the diagnosis service's readiness.
    Status,
}

/// Arguments for `scan`.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ScanArgs {
    /// Where to list devices from.
    #[arg(long, value_enum, default_value_t = ScanSource::Hardware)]
    source: ScanSource,
}

impl ScanArgs {
    #[must_use]
    pub fn new(source: ScanSource) -> Self {
        Self { source }
    }

    #[must_use]
    pub fn source(&self) -> ScanSource {
        self.source
    }
}

/// Arguments for commands that act on one device.
#[derive(Debug, Clone, clap::Args)]
pub struct DeviceArgs {
    /// Device identity as listed by `scan` (id or MAC address).
    device: String,
}

impl DeviceArgs {
    #[must_use]
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }
}

/// Device list source for `scan`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ScanSource {
    /// The Bluetooth backend, falling back to the demo catalog.
    #[default]
    Hardware,
    /// The diagnosis service's device list.
    Remote,
}

/// How command results are written to stdout.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}
