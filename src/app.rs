use std::io;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::catalog::DeviceCatalog;
use crate::cli::context::CommandContext;
use crate::cli::{Command, FakeArgs, LogLevel, OutputFormat, ScanSource, SettingsOverrides};
use crate::config::{Settings, SettingsStore};
use crate::diagnosis::{
    DiagnosisService, DiagnosticsOrchestrator, LocalRuleEngine, ServiceClient, TranslationTable,
};
use crate::hw::{CapabilityProbe, DeviceFilter, HardwareBackendKind};
use crate::notification::NotificationQueue;
use crate::session::{CatalogSource, SessionManager};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

const DEFAULT_LANGUAGE: &str = "en";

/// Selects the platform Bluetooth stack.
#[must_use]
pub fn real_hardware() -> HardwareBackendKind {
    HardwareBackendKind::Real
}

/// Selects the fixture-driven fake backend.
#[must_use]
pub fn fake_hardware(fake_args: FakeArgs) -> HardwareBackendKind {
    HardwareBackendKind::Fake(fake_args.into_backend_config())
}

/// Disables hardware; scans serve the demo catalog.
#[must_use]
pub fn no_hardware() -> HardwareBackendKind {
    HardwareBackendKind::Disabled
}

/// Runs the CLI command against the given hardware with settings from disk.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = btfix::Args::try_parse_from([
///     "btfix",
///     "--fake",
///     "--fake-scan",
///     "AA:BB:CC|Sony WH-1000XM4|-45|85",
///     "inspect",
///     "AA:BB:CC",
/// ])?;
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let hardware = match maybe_fake_args {
///     Some(fake_args) => btfix::fake_hardware(fake_args),
///     None => btfix::real_hardware(),
/// };
/// let mut out = Vec::new();
/// btfix::run(command, &mut out, hardware, btfix::OutputFormat::Json).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, settings cannot be
/// loaded, a session operation fails, or output writing fails.
pub async fn run<W>(
    command: Command,
    out: &mut W,
    hardware: HardwareBackendKind,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    run_with_log_level(
        command,
        out,
        hardware,
        SettingsOverrides::default(),
        None,
        output_format,
    )
    .await
}

/// Runs the CLI command with command-line overrides and an explicit log level.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, settings cannot be
/// loaded, a session operation fails, or output writing fails.
pub async fn run_with_log_level<W>(
    command: Command,
    out: &mut W,
    hardware: HardwareBackendKind,
    overrides: SettingsOverrides,
    log_level: Option<LogLevel>,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients_and_log_level(
        command,
        out,
        &SystemTerminalClient,
        hardware,
        overrides,
        log_level,
        output_format,
    )
    .await
}

/// Runs the CLI command with an injected terminal client.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, settings cannot be
/// loaded, a session operation fails, or output writing fails.
pub async fn run_with_clients<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    hardware: HardwareBackendKind,
    overrides: SettingsOverrides,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients_and_log_level(
        command,
        out,
        terminal_client,
        hardware,
        overrides,
        None,
        output_format,
    )
    .await
}

/// Runs the CLI command with injected clients and explicit telemetry settings.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// struct FakeTerminal;
/// impl btfix::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let overrides = btfix::SettingsOverrides::builder().offline(true).build();
/// let mut out = Vec::new();
/// btfix::run_with_clients_and_log_level(
///     btfix::Command::Scan(btfix::ScanArgs::default()),
///     &mut out,
///     &FakeTerminal,
///     btfix::no_hardware(),
///     overrides,
///     Some(btfix::LogLevel::Debug),
///     btfix::OutputFormat::Pretty,
/// ).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, settings cannot be
/// loaded, a session operation fails, or output writing fails.
#[instrument(
    skip(out, terminal_client, hardware, overrides),
    level = "info",
    fields(command = %command_name(&command), ?log_level)
)]
pub async fn run_with_clients_and_log_level<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    hardware: HardwareBackendKind,
    overrides: SettingsOverrides,
    log_level: Option<LogLevel>,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        "btfix",
        terminal_client.stderr_is_terminal(),
        log_level.map(LogLevel::as_level_filter),
    )?;

    let settings = overrides.apply(SettingsStore::new(overrides.config_path().cloned()).load()?);
    let client = ServiceClient::with_timeout(&settings.server_url, settings.diagnosis_timeout)?;
    let wiring = Wiring {
        settings,
        offline: overrides.offline(),
        client,
    };

    match command {
        Command::Status => {
            crate::cli::status::run(&wiring.client, out, terminal_client, output_format).await
        }
        Command::Scan(args) => {
            let source = match args.source() {
                ScanSource::Hardware => CatalogSource::Hardware,
                ScanSource::Remote => CatalogSource::Remote(wiring.client.clone()),
            };
            let context = wiring
                .into_context(hardware, source, terminal_client, output_format)
                .await;
            crate::cli::scan::run(&context, out).await
        }
        Command::Inspect(args) => {
            let context = wiring
                .into_context(hardware, CatalogSource::Hardware, terminal_client, output_format)
                .await;
            crate::cli::inspect::run(&context, &args, out).await
        }
        Command::Diagnose(args) => {
            let context = wiring
                .into_context(hardware, CatalogSource::Hardware, terminal_client, output_format)
                .await;
            crate::cli::diagnose::run(&context, &args, out).await
        }
        Command::Fix(args) => {
            let context = wiring
                .into_context(hardware, CatalogSource::Hardware, terminal_client, output_format)
                .await;
            crate::cli::fix::run(&context, &args, out).await
        }
    }
}

/// Resolved settings plus the service client shared by every component.
struct Wiring {
    settings: Settings,
    offline: bool,
    client: ServiceClient,
}

impl Wiring {
    async fn into_context<'a>(
        self,
        hardware: HardwareBackendKind,
        source: CatalogSource,
        terminal_client: &'a dyn TerminalClient,
        output_format: OutputFormat,
    ) -> CommandContext<'a> {
        let Self {
            settings,
            offline,
            client,
        } = self;

        let probe = CapabilityProbe::detect(hardware).await;
        let notifications = NotificationQueue::new(settings.notification_ttl);
        let filter = DeviceFilter::builder()
            .maybe_name_prefix(settings.name_prefix.clone())
            .scan_window(settings.scan_window)
            .build();
        let labels = if offline {
            TranslationTable::default()
        } else {
            load_labels(&client, &settings.language).await
        };
        let service: Arc<dyn DiagnosisService> = if offline {
            Arc::new(LocalRuleEngine)
        } else {
            Arc::new(client)
        };

        let session = SessionManager::builder()
            .catalog(DeviceCatalog::new(&probe, filter, notifications.clone()))
            .probe(probe)
            .catalog_source(source)
            .orchestrator(
                DiagnosticsOrchestrator::new(service).with_timeout(settings.diagnosis_timeout),
            )
            .notifications(notifications)
            .fix_delay(settings.fix_delay)
            .build();
        CommandContext::new(session, labels, terminal_client, output_format)
    }
}

async fn load_labels(client: &ServiceClient, language: &str) -> TranslationTable {
    if language == DEFAULT_LANGUAGE {
        return TranslationTable::default();
    }

    match client.translations(language).await {
        Ok(table) => {
            debug!(language = table.language(), rtl = table.is_rtl(), "translations loaded");
            table
        }
        Err(error) => {
            warn!(%error, language, "translations unavailable, using English labels");
            TranslationTable::default()
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Scan(_args) => "scan",
        Command::Inspect(_args) => "inspect",
        Command::Diagnose(_args) => "diagnose",
        Command::Fix(_args) => "fix",
        Command::Status => "status",
    }
}
