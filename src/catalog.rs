use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::diagnosis::ServiceClient;
use crate::hw::{BluetoothBackend, CapabilityProbe, Device, DeviceFilter, DeviceType};
use crate::notification::{NotificationKind, NotificationQueue};

/// The fixed catalog served when no hardware is usable.
#[must_use]
pub fn simulated_catalog() -> Vec<Device> {
    vec![
        Device::simulated(
            "Sony WH-1000XM4",
            "04:5F:01:02:03",
            -45,
            DeviceType::Headphones,
            false,
            Some(85),
        ),
        Device::simulated(
            "Apple AirPods Pro",
            "DC:56:04:05:06",
            -55,
            DeviceType::Earbuds,
            true,
            Some(65),
        ),
        Device::simulated(
            "Logitech MX Keys",
            "70:B3:07:08:09",
            -35,
            DeviceType::Keyboard,
            true,
            Some(90),
        ),
    ]
}

/// Produces candidate devices; never fails.
///
/// Any backend failure is logged, surfaced as a warning notification and
/// answered with [`simulated_catalog`].
#[derive(Debug, Clone)]
pub struct DeviceCatalog {
    backend: Option<Arc<dyn BluetoothBackend>>,
    filter: DeviceFilter,
    notifications: NotificationQueue,
}

impl DeviceCatalog {
    #[must_use]
    pub fn new(
        probe: &CapabilityProbe,
        filter: DeviceFilter,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            backend: probe.backend(),
            filter,
            notifications,
        }
    }

    /// A catalog that only ever serves simulated devices.
    #[must_use]
    pub fn simulated(notifications: NotificationQueue) -> Self {
        Self::new(
            &CapabilityProbe::unavailable(),
            DeviceFilter::default(),
            notifications,
        )
    }

    /// Lists devices from the hardware backend, or the simulated catalog.
    #[instrument(skip(self), level = "info", fields(hardware = self.backend.is_some()))]
    pub async fn discover(&self) -> Vec<Device> {
        let Some(backend) = &self.backend else {
            info!("no hardware backend, serving simulated catalog");
            return simulated_catalog();
        };

        match backend.request_device(&self.filter).await {
            Ok(device) => {
                info!(device = device.identity(), "hardware discovery succeeded");
                vec![device]
            }
            Err(error) => {
                warn!(%error, "hardware discovery failed, serving simulated catalog");
                self.notifications.post(
                    format!("Device scan failed ({error}); showing demo devices"),
                    NotificationKind::Warning,
                );
                simulated_catalog()
            }
        }
    }

    /// Lists devices known to the remote service, or the simulated catalog.
    #[instrument(skip(self, client), level = "info", fields(base_url = client.base_url()))]
    pub async fn discover_remote(&self, client: &ServiceClient) -> Vec<Device> {
        match client.devices().await {
            Ok(devices) => {
                self.notifications.post(
                    format!("Found {} devices", devices.len()),
                    NotificationKind::Success,
                );
                devices
            }
            Err(error) => {
                warn!(%error, "remote device listing failed, serving simulated catalog");
                self.notifications
                    .post("Device scan failed; showing demo devices", NotificationKind::Error);
                simulated_catalog()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::hw::{DeviceOrigin, DiscoveryFailure, FakeBackend, FakeBackendConfig};

    fn fake_catalog(
        failure: Option<DiscoveryFailure>,
        notifications: &NotificationQueue,
    ) -> anyhow::Result<DeviceCatalog> {
        let config = FakeBackendConfig::builder()
            .scan_fixture("hci0/dev_AA|JBL Flip 5|-52|40".parse()?)
            .maybe_discovery_failure(failure)
            .build();
        let probe = CapabilityProbe::with_backend(Arc::new(FakeBackend::new(config)));
        Ok(DeviceCatalog::new(
            &probe,
            DeviceFilter::default(),
            notifications.clone(),
        ))
    }

    #[tokio::test]
    async fn unavailable_backend_serves_the_three_device_catalog() {
        let catalog = DeviceCatalog::simulated(NotificationQueue::default());

        let devices = catalog.discover().await;

        assert_eq!(3, devices.len());
        let sony = &devices[0];
        assert_eq!("Sony WH-1000XM4", sony.name());
        assert_eq!(-45, sony.signal_strength_dbm());
        assert_eq!(false, sony.is_connected());
        assert_eq!(DeviceOrigin::Simulated, sony.origin());
    }

    #[tokio::test]
    async fn hardware_discovery_returns_the_picked_device() -> anyhow::Result<()> {
        let notifications = NotificationQueue::default();
        let catalog = fake_catalog(None, &notifications)?;

        let devices = catalog.discover().await;

        assert_eq!(1, devices.len());
        assert_eq!("hci0/dev_AA", devices[0].identity());
        assert_eq!(DeviceOrigin::Hardware, devices[0].origin());
        assert!(notifications.list().is_empty());
        Ok(())
    }

    #[rstest]
    #[case::cancelled(DiscoveryFailure::Cancelled)]
    #[case::permission_denied(DiscoveryFailure::PermissionDenied)]
    #[case::adapter_lost(DiscoveryFailure::AdapterLost)]
    #[tokio::test]
    async fn backend_failures_degrade_to_simulated_catalog(
        #[case] failure: DiscoveryFailure,
    ) -> anyhow::Result<()> {
        let notifications = NotificationQueue::default();
        let catalog = fake_catalog(Some(failure), &notifications)?;

        let devices = catalog.discover().await;

        assert_eq!(simulated_catalog(), devices);
        let posted = notifications.list();
        assert_eq!(1, posted.len());
        assert_eq!(NotificationKind::Warning, posted[0].kind());
        Ok(())
    }
}
