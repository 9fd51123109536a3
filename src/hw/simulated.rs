use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::instrument;
use uuid::Uuid;

use super::backend::{CharacteristicRef, GattConnection, GattServiceRef};
use super::gatt_reader::{
    BATTERY_LEVEL_UUID, BATTERY_SERVICE_UUID, DEVICE_INFORMATION_SERVICE_UUID,
    MANUFACTURER_NAME_UUID, MODEL_NUMBER_UUID,
};
use super::model::Device;
use crate::error::InteractionError;

/// In-memory characteristic with a fixed read outcome.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct SimulatedCharacteristic {
    uuid: Uuid,
    value: Option<Vec<u8>>,
}

impl SimulatedCharacteristic {
    pub(crate) fn readable(uuid: Uuid, value: Vec<u8>) -> Self {
        Self {
            uuid,
            value: Some(value),
        }
    }

    /// A characteristic whose reads always fail.
    pub(crate) fn unreadable(uuid: Uuid) -> Self {
        Self { uuid, value: None }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct SimulatedService {
    uuid: Uuid,
    characteristics: Vec<SimulatedCharacteristic>,
}

impl SimulatedService {
    pub(crate) fn new(uuid: Uuid, characteristics: Vec<SimulatedCharacteristic>) -> Self {
        Self {
            uuid,
            characteristics,
        }
    }
}

/// GATT link backed by an in-memory service tree. No I/O is performed.
#[derive(Debug)]
pub(crate) struct SimulatedConnection {
    device_identity: String,
    services: Vec<SimulatedService>,
    open_connections: Option<Arc<AtomicUsize>>,
    read_delay: Duration,
}

impl SimulatedConnection {
    pub(crate) fn new(device_identity: impl Into<String>, services: Vec<SimulatedService>) -> Self {
        Self {
            device_identity: device_identity.into(),
            services,
            open_connections: None,
            read_delay: Duration::ZERO,
        }
    }

    /// Builds the tree exposed by a catalog device: its battery level and a
    /// device-information service derived from the advertised name.
    pub(crate) fn for_device(device: &Device) -> Self {
        let mut services = Vec::with_capacity(2);
        if let Some(level) = device.battery_level_percent() {
            services.push(SimulatedService::new(
                BATTERY_SERVICE_UUID,
                vec![SimulatedCharacteristic::readable(
                    BATTERY_LEVEL_UUID,
                    vec![level],
                )],
            ));
        }

        let (manufacturer, model) = device
            .name()
            .split_once(' ')
            .unwrap_or((device.name(), device.name()));
        services.push(SimulatedService::new(
            DEVICE_INFORMATION_SERVICE_UUID,
            vec![
                SimulatedCharacteristic::readable(
                    MANUFACTURER_NAME_UUID,
                    manufacturer.as_bytes().to_vec(),
                ),
                SimulatedCharacteristic::readable(MODEL_NUMBER_UUID, model.as_bytes().to_vec()),
            ],
        ));

        Self::new(device.identity(), services)
    }

    /// Makes every characteristic read take `read_delay`.
    pub(crate) fn with_read_delay(mut self, read_delay: Duration) -> Self {
        self.read_delay = read_delay;
        self
    }

    /// Counts this link in `open_connections` until it is disconnected.
    pub(crate) fn tracked(mut self, open_connections: Arc<AtomicUsize>) -> Self {
        open_connections.fetch_add(1, Ordering::SeqCst);
        self.open_connections = Some(open_connections);
        self
    }

    fn service(&self, uuid: Uuid) -> Result<&SimulatedService, InteractionError> {
        self.services
            .iter()
            .find(|service| service.uuid == uuid)
            .ok_or(InteractionError::MissingService { uuid })
    }
}

#[async_trait]
impl GattConnection for SimulatedConnection {
    fn device_identity(&self) -> &str {
        &self.device_identity
    }

    async fn primary_service(&self, uuid: Uuid) -> Result<GattServiceRef, InteractionError> {
        self.service(uuid).map(|service| GattServiceRef::new(service.uuid))
    }

    async fn characteristic(
        &self,
        service: &GattServiceRef,
        uuid: Uuid,
    ) -> Result<CharacteristicRef, InteractionError> {
        self.service(service.uuid())?
            .characteristics
            .iter()
            .find(|characteristic| characteristic.uuid == uuid)
            .map(|characteristic| CharacteristicRef::new(service.uuid(), characteristic.uuid))
            .ok_or(InteractionError::MissingCharacteristic { uuid })
    }

    async fn characteristics(
        &self,
        service: &GattServiceRef,
    ) -> Result<Vec<CharacteristicRef>, InteractionError> {
        Ok(self
            .service(service.uuid())?
            .characteristics
            .iter()
            .map(|characteristic| CharacteristicRef::new(service.uuid(), characteristic.uuid))
            .collect())
    }

    async fn read_value(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<Vec<u8>, InteractionError> {
        if !self.read_delay.is_zero() {
            sleep(self.read_delay).await;
        }
        let uuid = characteristic.uuid();
        let entry = self
            .service(characteristic.service_uuid())?
            .characteristics
            .iter()
            .find(|candidate| candidate.uuid == uuid)
            .ok_or(InteractionError::MissingCharacteristic { uuid })?;

        entry
            .value
            .clone()
            .ok_or(InteractionError::UnreadableCharacteristic { uuid })
    }

    #[instrument(skip(self), level = "debug", fields(device = %self.device_identity))]
    async fn disconnect(self: Box<Self>) -> Result<(), InteractionError> {
        if let Some(open_connections) = &self.open_connections {
            open_connections.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::hw::DeviceType;

    #[tokio::test]
    async fn catalog_device_exposes_battery_and_identity() -> anyhow::Result<()> {
        let device = Device::simulated(
            "Sony WH-1000XM4",
            "04:5F:01:02:03",
            -45,
            DeviceType::Headphones,
            false,
            Some(85),
        );
        let connection = SimulatedConnection::for_device(&device);

        let service = connection.primary_service(BATTERY_SERVICE_UUID).await?;
        let characteristic = connection
            .characteristic(&service, BATTERY_LEVEL_UUID)
            .await?;
        assert_eq!(vec![85], connection.read_value(&characteristic).await?);
        assert_eq!("04:5F:01:02:03", connection.device_identity());
        Ok(())
    }

    #[tokio::test]
    async fn device_without_battery_has_no_battery_service() {
        let device = Device::simulated("Gadget", "00:11", -60, DeviceType::Unknown, false, None);
        let connection = SimulatedConnection::for_device(&device);

        let result = connection.primary_service(BATTERY_SERVICE_UUID).await;
        assert_matches!(result, Err(InteractionError::MissingService { .. }));
    }

    #[tokio::test]
    async fn tracked_connection_is_released_on_disconnect() -> anyhow::Result<()> {
        let open = Arc::new(AtomicUsize::new(0));
        let connection = SimulatedConnection::new("AA", Vec::new()).tracked(open.clone());
        assert_eq!(1, open.load(Ordering::SeqCst));

        Box::new(connection).disconnect().await?;
        assert_eq!(0, open.load(Ordering::SeqCst));
        Ok(())
    }
}
