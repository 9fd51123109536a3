use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bon::Builder;
use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::catalog::DeviceCatalog;
use crate::diagnosis::{DiagnosisResult, DiagnosticsOrchestrator, ServiceClient};
use crate::error::{InteractionError, SessionError};
use crate::hw::simulated::SimulatedConnection;
use crate::hw::{
    CapabilityProbe, Device, DeviceInfoRecord, DeviceOrigin, GattConnection, GattInfoReader,
};
use crate::notification::{NotificationKind, NotificationQueue};

/// Duration of the simulated corrective action.
pub const DEFAULT_FIX_DELAY: Duration = Duration::from_secs(2);

/// Client-visible session state.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Scanning,
    DevicesListed,
    DeviceSelected,
    Connecting,
    Connected,
    Diagnosing,
    DiagnosisReady,
    Fixing,
    Fixed,
}

/// Session operations, as named in errors and logs.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    Scan,
    Select,
    Connect,
    Diagnose,
    ApplyFix,
}

impl OperationKind {
    /// Operations that depend on the open link and die with it.
    fn is_tied_to_link(self) -> bool {
        matches!(self, Self::Connect | Self::Diagnose | Self::ApplyFix)
    }
}

/// Outcome of [`SessionManager::scan`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ScanOutcome {
    /// Discovery completed with this many devices.
    Listed(usize),
    /// A scan was already running; this call did nothing.
    AlreadyScanning,
}

/// Where [`SessionManager::scan`] gets its devices.
#[derive(Debug, Clone, Default)]
pub enum CatalogSource {
    /// The hardware backend, degrading to the simulated catalog.
    #[default]
    Hardware,
    /// The remote service's device list, degrading to the simulated catalog.
    Remote(ServiceClient),
}

/// Point-in-time copy of the session for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub devices: Vec<Device>,
    pub selected: Option<Device>,
    pub connected: Option<Device>,
    pub device_info: Option<DeviceInfoRecord>,
    pub diagnosis: Option<DiagnosisResult>,
}

#[derive(Debug)]
struct Pending {
    operation: OperationKind,
    ticket: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct SessionInner {
    state: SessionState,
    devices: Vec<Device>,
    selected: Option<Device>,
    connected: Option<Device>,
    handle: Option<Box<dyn GattConnection>>,
    device_info: Option<DeviceInfoRecord>,
    diagnosis: Option<DiagnosisResult>,
    pending: Option<Pending>,
    next_ticket: u64,
}

impl SessionInner {
    fn ensure_nothing_pending(&self) -> Result<(), SessionError> {
        match &self.pending {
            Some(pending) => Err(SessionError::OperationInProgress {
                operation: pending.operation,
            }),
            None => Ok(()),
        }
    }

    fn replace_device(&mut self, device: &Device) {
        if let Some(slot) = self
            .devices
            .iter_mut()
            .find(|candidate| candidate.identity() == device.identity())
        {
            *slot = device.clone();
        }
        self.selected = Some(device.clone());
    }
}

/// Tracks the single in-flight operation.
///
/// Dropping the guard before [`PendingGuard::finish`] rolls the state back,
/// unless a disconnect already took over the session.
struct PendingGuard<'a> {
    session: &'a SessionManager,
    ticket: u64,
    token: CancellationToken,
    in_flight: SessionState,
    rollback: SessionState,
}

impl PendingGuard<'_> {
    fn is_current(&self, inner: &SessionInner) -> bool {
        inner
            .pending
            .as_ref()
            .is_some_and(|pending| pending.ticket == self.ticket)
    }

    fn finish(&self, inner: &mut SessionInner) {
        if self.is_current(inner) {
            inner.pending = None;
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.session.lock();
        if self.is_current(&inner) {
            inner.pending = None;
            if inner.state == self.in_flight {
                inner.state = self.rollback;
            }
        }
    }
}

/// The scan, select, connect, diagnose and fix state machine.
///
/// All operations take `&self`; at most one of scan, connect, diagnose and
/// apply-fix is in flight at a time. The connection handle is owned here and
/// only lent to [`GattInfoReader`] for a single pass.
#[derive(Debug, Builder)]
pub struct SessionManager {
    probe: CapabilityProbe,
    catalog: DeviceCatalog,
    #[builder(default)]
    catalog_source: CatalogSource,
    orchestrator: DiagnosticsOrchestrator,
    notifications: NotificationQueue,
    #[builder(default = DEFAULT_FIX_DELAY)]
    fix_delay: Duration,
    #[builder(skip)]
    inner: Mutex<SessionInner>,
}

impl SessionManager {
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            state: inner.state,
            devices: inner.devices.clone(),
            selected: inner.selected.clone(),
            connected: inner.connected.clone(),
            device_info: inner.device_info.clone(),
            diagnosis: inner.diagnosis.clone(),
        }
    }

    /// Lists candidate devices. A call while a scan is running is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::OperationInProgress`] while another operation
    /// runs and [`SessionError::InvalidState`] while a connection is open.
    #[instrument(skip(self), level = "info")]
    pub async fn scan(&self) -> Result<ScanOutcome, SessionError> {
        let guard = {
            let mut inner = self.lock();
            if inner.state == SessionState::Scanning {
                debug!("scan already running");
                return Ok(ScanOutcome::AlreadyScanning);
            }
            inner.ensure_nothing_pending()?;
            if inner.handle.is_some() {
                return Err(SessionError::InvalidState {
                    operation: OperationKind::Scan,
                    state: inner.state,
                });
            }
            let rollback = inner.state;
            self.begin(&mut inner, OperationKind::Scan, SessionState::Scanning, rollback)
        };

        let devices = match &self.catalog_source {
            CatalogSource::Hardware => self.catalog.discover().await,
            CatalogSource::Remote(client) => self.catalog.discover_remote(client).await,
        };

        let mut inner = self.lock();
        if !guard.is_current(&inner) {
            return Err(SessionError::Cancelled {
                operation: OperationKind::Scan,
            });
        }
        let count = devices.len();
        inner.devices = devices;
        inner.selected = None;
        inner.connected = None;
        inner.device_info = None;
        inner.diagnosis = None;
        inner.state = SessionState::DevicesListed;
        guard.finish(&mut inner);
        info!(count, "devices listed");
        Ok(ScanOutcome::Listed(count))
    }

    /// Selects a listed device by identity.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownDevice`] when no listed device has this
    /// identity; the state is left unchanged.
    #[instrument(skip(self), level = "info")]
    pub fn select(&self, id: &str) -> Result<Device, SessionError> {
        let mut inner = self.lock();
        inner.ensure_nothing_pending()?;
        match inner.state {
            SessionState::DevicesListed | SessionState::DeviceSelected => {}
            state => {
                return Err(SessionError::InvalidState {
                    operation: OperationKind::Select,
                    state,
                });
            }
        }

        let device = inner
            .devices
            .iter()
            .find(|device| device.identity() == id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownDevice { id: id.to_string() })?;
        inner.selected = Some(device.clone());
        inner.diagnosis = None;
        inner.state = SessionState::DeviceSelected;
        debug!(device = device.name(), "device selected");
        Ok(device)
    }

    /// Opens a link to the selected device and reads its device information.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConnectionFailed`] or
    /// [`SessionError::PermissionDenied`] when the link cannot be opened, in
    /// which case the session returns to `DeviceSelected`;
    /// [`SessionError::Cancelled`] when a disconnect interrupts the attempt.
    #[instrument(skip(self), level = "info")]
    pub async fn connect(&self) -> Result<DeviceInfoRecord, SessionError> {
        let (device, guard) = {
            let mut inner = self.lock();
            inner.ensure_nothing_pending()?;
            match inner.state {
                SessionState::DeviceSelected => {}
                SessionState::Idle | SessionState::DevicesListed => {
                    return Err(SessionError::NoDeviceSelected);
                }
                state => {
                    return Err(SessionError::InvalidState {
                        operation: OperationKind::Connect,
                        state,
                    });
                }
            }
            let device = inner
                .selected
                .clone()
                .ok_or(SessionError::NoDeviceSelected)?;
            let guard = self.begin(
                &mut inner,
                OperationKind::Connect,
                SessionState::Connecting,
                SessionState::DeviceSelected,
            );
            (device, guard)
        };
        let cancelled = SessionError::Cancelled {
            operation: OperationKind::Connect,
        };

        // A disconnect during the attempt still gets the opened link released.
        let opened = self.open_connection(&device).await;
        if guard.token.is_cancelled() {
            if let Ok(handle) = opened {
                release(handle).await;
            }
            return Err(cancelled);
        }
        let handle = match opened {
            Ok(handle) => handle,
            Err(source) => {
                warn!(error = %source, "connection failed");
                self.notifications.post(
                    format!("Connection to {} failed", device.name()),
                    NotificationKind::Error,
                );
                return Err(match source {
                    InteractionError::PermissionDenied => SessionError::PermissionDenied,
                    source => SessionError::ConnectionFailed {
                        device: device.name().to_string(),
                        source,
                    },
                });
            }
        };

        let record = tokio::select! {
            biased;
            () = guard.token.cancelled() => None,
            record = GattInfoReader::read(handle.as_ref()) => Some(record),
        };
        let Some(record) = record else {
            release(handle).await;
            return Err(cancelled);
        };

        let stale = {
            let mut inner = self.lock();
            if guard.is_current(&inner) {
                let connected = device.clone()
                    .with_connected(true)
                    .with_battery_level(record.battery_level_percent());
                inner.replace_device(&connected);
                inner.connected = Some(connected);
                inner.handle = Some(handle);
                inner.device_info = Some(record.clone());
                inner.diagnosis = None;
                inner.state = SessionState::Connected;
                guard.finish(&mut inner);
                None
            } else {
                Some(handle)
            }
        };
        if let Some(handle) = stale {
            release(handle).await;
            return Err(cancelled);
        }

        info!(values = record.len(), "connected");
        self.notifications.post(
            format!("Connected to {}", device.name()),
            NotificationKind::Info,
        );
        Ok(record)
    }

    /// Closes the link and cancels any operation tied to it.
    ///
    /// Idempotent: without an open link or a pending link operation this
    /// does nothing.
    #[instrument(skip(self), level = "info")]
    pub async fn disconnect(&self) {
        let handle = {
            let mut inner = self.lock();
            let interrupted = if inner
                .pending
                .as_ref()
                .is_some_and(|pending| pending.operation.is_tied_to_link())
            {
                inner.pending.take()
            } else {
                None
            };
            if let Some(pending) = &interrupted {
                debug!(operation = %pending.operation, "cancelling in-flight operation");
                pending.token.cancel();
            }

            let handle = inner.handle.take();
            if interrupted.is_none() && handle.is_none() {
                debug!("nothing to disconnect");
                return;
            }

            inner.connected = None;
            inner.device_info = None;
            inner.diagnosis = None;
            if let Some(selected) = inner.selected.take() {
                inner.replace_device(&selected.with_connected(false));
            }
            inner.state = SessionState::DeviceSelected;
            handle
        };

        if let Some(handle) = handle {
            release(handle).await;
        }
        info!("disconnected");
    }

    /// Diagnoses the connected device. Never fails because of the remote
    /// service; see [`DiagnosticsOrchestrator`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] without an open link and
    /// [`SessionError::Cancelled`] when a disconnect interrupts the call.
    #[instrument(skip(self), level = "info")]
    pub async fn diagnose(&self) -> Result<DiagnosisResult, SessionError> {
        let (device, guard) = {
            let mut inner = self.lock();
            inner.ensure_nothing_pending()?;
            match inner.state {
                SessionState::Connected | SessionState::DiagnosisReady | SessionState::Fixed => {}
                SessionState::DeviceSelected => return Err(SessionError::NotConnected),
                SessionState::Idle | SessionState::DevicesListed => {
                    return Err(SessionError::NoDeviceSelected);
                }
                state => {
                    return Err(SessionError::InvalidState {
                        operation: OperationKind::Diagnose,
                        state,
                    });
                }
            }
            let device = inner.connected.clone().ok_or(SessionError::NotConnected)?;
            let rollback = inner.state;
            let guard = self.begin(
                &mut inner,
                OperationKind::Diagnose,
                SessionState::Diagnosing,
                rollback,
            );
            (device, guard)
        };
        let cancelled = SessionError::Cancelled {
            operation: OperationKind::Diagnose,
        };

        let result = tokio::select! {
            biased;
            () = guard.token.cancelled() => None,
            result = self.orchestrator.diagnose(&device) => Some(result),
        };
        let Some(result) = result else {
            return Err(cancelled);
        };

        {
            let mut inner = self.lock();
            if !guard.is_current(&inner) {
                return Err(cancelled);
            }
            inner.diagnosis = Some(result.clone());
            inner.state = SessionState::DiagnosisReady;
            guard.finish(&mut inner);
        }

        if result.is_fallback() {
            self.notifications.post(
                "AI diagnosis failed; showing demo results",
                NotificationKind::Error,
            );
        } else {
            self.notifications
                .post("AI diagnosis completed", NotificationKind::Success);
        }
        Ok(result)
    }

    /// Applies the suggested fix. The result is simulated: the device
    /// snapshot is marked connected with a healthy signal.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoDiagnosis`] before a diagnosis is ready and
    /// [`SessionError::Cancelled`] when a disconnect interrupts the fix.
    #[instrument(skip(self), level = "info")]
    pub async fn apply_fix(&self) -> Result<Device, SessionError> {
        let guard = {
            let mut inner = self.lock();
            inner.ensure_nothing_pending()?;
            match inner.state {
                SessionState::DiagnosisReady => {}
                SessionState::DeviceSelected | SessionState::Connected => {
                    return Err(SessionError::NoDiagnosis);
                }
                SessionState::Idle | SessionState::DevicesListed => {
                    return Err(SessionError::NoDeviceSelected);
                }
                state => {
                    return Err(SessionError::InvalidState {
                        operation: OperationKind::ApplyFix,
                        state,
                    });
                }
            }
            self.begin(
                &mut inner,
                OperationKind::ApplyFix,
                SessionState::Fixing,
                SessionState::DiagnosisReady,
            )
        };
        let cancelled = SessionError::Cancelled {
            operation: OperationKind::ApplyFix,
        };

        tokio::select! {
            biased;
            () = guard.token.cancelled() => return Err(cancelled),
            () = sleep(self.fix_delay) => {}
        }

        let fixed = {
            let mut inner = self.lock();
            if !guard.is_current(&inner) {
                return Err(cancelled);
            }
            let Some(connected) = inner.connected.clone() else {
                return Err(SessionError::NotConnected);
            };
            let fixed = connected.healed();
            inner.replace_device(&fixed);
            inner.connected = Some(fixed.clone());
            inner.state = SessionState::Fixed;
            guard.finish(&mut inner);
            fixed
        };

        info!(signal = fixed.signal_strength_dbm(), "fix applied");
        self.notifications
            .post("Issues fixed automatically", NotificationKind::Success);
        Ok(fixed)
    }

    async fn open_connection(
        &self,
        device: &Device,
    ) -> Result<Box<dyn GattConnection>, InteractionError> {
        match device.origin() {
            DeviceOrigin::Hardware => match self.probe.backend() {
                Some(backend) => backend.connect(device).await,
                None => Err(InteractionError::NoAdapters),
            },
            DeviceOrigin::Simulated | DeviceOrigin::Remote => {
                Ok(Box::new(SimulatedConnection::for_device(device)))
            }
        }
    }

    fn begin(
        &self,
        inner: &mut SessionInner,
        operation: OperationKind,
        in_flight: SessionState,
        rollback: SessionState,
    ) -> PendingGuard<'_> {
        inner.next_ticket += 1;
        let ticket = inner.next_ticket;
        let token = CancellationToken::new();
        inner.pending = Some(Pending {
            operation,
            ticket,
            token: token.clone(),
        });
        inner.state = in_flight;
        PendingGuard {
            session: self,
            ticket,
            token,
            in_flight,
            rollback,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn release(handle: Box<dyn GattConnection>) {
    let identity = handle.device_identity().to_string();
    if let Err(error) = handle.disconnect().await {
        warn!(device = %identity, %error, "failed to release connection cleanly");
    }
}
