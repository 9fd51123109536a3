use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use uuid::Uuid;

use super::model::Device;
use crate::error::InteractionError;

/// How long the real backend listens for advertisements per discovery.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(5);

/// Device-picker request passed to [`BluetoothBackend::request_device`].
#[derive(Debug, Clone, Eq, PartialEq, Builder)]
pub struct DeviceFilter {
    /// Restricts candidates to names with this prefix. `None` accepts all devices.
    #[builder(into)]
    name_prefix: Option<String>,
    /// How long a real adapter listens for advertisements.
    #[builder(default = DEFAULT_SCAN_WINDOW)]
    scan_window: Duration,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DeviceFilter {
    #[must_use]
    pub fn name_prefix(&self) -> Option<&str> {
        self.name_prefix.as_deref()
    }

    #[must_use]
    pub fn scan_window(&self) -> Duration {
        self.scan_window
    }

    /// Returns whether an advertised name passes the filter.
    pub(crate) fn accepts(&self, local_name: Option<&str>) -> bool {
        match self.name_prefix.as_deref() {
            None | Some("") => true,
            Some(prefix) => local_name.is_some_and(|name| name.starts_with(prefix)),
        }
    }
}

/// Primary service resolved on a live connection.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct GattServiceRef {
    uuid: Uuid,
}

impl GattServiceRef {
    pub(crate) fn new(uuid: Uuid) -> Self {
        Self { uuid }
    }

    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

/// Characteristic resolved within a primary service.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CharacteristicRef {
    service_uuid: Uuid,
    uuid: Uuid,
}

impl CharacteristicRef {
    pub(crate) fn new(service_uuid: Uuid, uuid: Uuid) -> Self {
        Self { service_uuid, uuid }
    }

    #[must_use]
    pub fn service_uuid(&self) -> Uuid {
        self.service_uuid
    }

    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

/// Hardware entry point: discovers peripherals and opens connections.
#[async_trait]
pub trait BluetoothBackend: Send + Sync + Debug {
    /// Asks the platform for one device matching the filter.
    ///
    /// Mirrors a device picker: user cancellation surfaces as
    /// [`InteractionError::NoDeviceSelected`], missing permissions as
    /// [`InteractionError::PermissionDenied`].
    async fn request_device(&self, filter: &DeviceFilter) -> Result<Device, InteractionError>;

    /// Opens a GATT connection to a previously discovered device.
    async fn connect(&self, device: &Device) -> Result<Box<dyn GattConnection>, InteractionError>;
}

/// A live GATT transport to one peripheral.
///
/// Owned by the session; readers only ever borrow it.
#[async_trait]
pub trait GattConnection: Send + Sync + Debug {
    /// Returns the identity of the connected device.
    fn device_identity(&self) -> &str;

    async fn primary_service(&self, uuid: Uuid) -> Result<GattServiceRef, InteractionError>;

    async fn characteristic(
        &self,
        service: &GattServiceRef,
        uuid: Uuid,
    ) -> Result<CharacteristicRef, InteractionError>;

    async fn characteristics(
        &self,
        service: &GattServiceRef,
    ) -> Result<Vec<CharacteristicRef>, InteractionError>;

    async fn read_value(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<Vec<u8>, InteractionError>;

    /// Releases the transport.
    async fn disconnect(self: Box<Self>) -> Result<(), InteractionError>;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, Some("Anything"), true)]
    #[case(None, None, true)]
    #[case(Some(""), None, true)]
    #[case(Some("Sony"), Some("Sony WH-1000XM4"), true)]
    #[case(Some("Sony"), Some("Apple AirPods"), false)]
    #[case(Some("Sony"), None, false)]
    fn filter_matches_name_prefix(
        #[case] prefix: Option<&str>,
        #[case] name: Option<&str>,
        #[case] expected: bool,
    ) {
        let filter = DeviceFilter::builder().maybe_name_prefix(prefix).build();
        assert_eq!(expected, filter.accepts(name));
    }

    #[test]
    fn default_filter_accepts_everything_for_the_default_window() {
        let filter = DeviceFilter::default();
        assert_eq!(None, filter.name_prefix());
        assert_eq!(DEFAULT_SCAN_WINDOW, filter.scan_window());
    }
}
