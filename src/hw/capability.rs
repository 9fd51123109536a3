use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::backend::BluetoothBackend;
use super::btleplug_backend::BtleplugBackend;
use super::fake_backend::{FakeBackend, FakeBackendConfig};

/// Which hardware backend the probe should try to bring up.
#[derive(Debug, Clone)]
pub enum HardwareBackendKind {
    /// The platform Bluetooth stack via `btleplug`.
    Real,
    /// Fixture-driven peripherals.
    Fake(FakeBackendConfig),
    /// Never use hardware; the catalog serves simulated devices.
    Disabled,
}

/// Result of detecting the hardware entry point.
///
/// Absence of a backend is a normal outcome, never an error.
#[derive(Debug, Clone, Default)]
pub struct CapabilityProbe {
    backend: Option<Arc<dyn BluetoothBackend>>,
}

impl CapabilityProbe {
    /// Brings up the requested backend, degrading to "unavailable" when the
    /// host has no usable adapter or refuses access.
    #[instrument(level = "debug", skip(kind), fields(kind = kind_name(&kind)))]
    pub async fn detect(kind: HardwareBackendKind) -> Self {
        match kind {
            HardwareBackendKind::Disabled => Self::unavailable(),
            HardwareBackendKind::Fake(config) => {
                Self::with_backend(Arc::new(FakeBackend::new(config)))
            }
            HardwareBackendKind::Real => match BtleplugBackend::new().await {
                Ok(backend) => {
                    info!("hardware Bluetooth backend available");
                    Self::with_backend(Arc::new(backend))
                }
                Err(error) => {
                    warn!(%error, "hardware Bluetooth backend unavailable");
                    Self::unavailable()
                }
            },
        }
    }

    /// Wraps an already constructed backend.
    #[must_use]
    pub fn with_backend(backend: Arc<dyn BluetoothBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    /// Returns whether a hardware backend was detected. Pure; no I/O.
    #[must_use]
    pub fn is_hardware_backend_available(&self) -> bool {
        self.backend.is_some()
    }

    #[must_use]
    pub fn backend(&self) -> Option<Arc<dyn BluetoothBackend>> {
        self.backend.clone()
    }
}

fn kind_name(kind: &HardwareBackendKind) -> &'static str {
    match kind {
        HardwareBackendKind::Real => "real",
        HardwareBackendKind::Fake(_) => "fake",
        HardwareBackendKind::Disabled => "disabled",
    }
}
