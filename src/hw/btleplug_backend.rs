use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::time::sleep;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use super::backend::{
    BluetoothBackend, CharacteristicRef, DeviceFilter, GattConnection, GattServiceRef,
};
use super::model::Device;
use crate::error::InteractionError;

/// Hardware backend backed by `btleplug`.
#[derive(Debug)]
pub(crate) struct BtleplugBackend {
    adapters: Vec<AdapterHandle>,
    discovered: Mutex<HashMap<String, Peripheral>>,
}

#[derive(Debug)]
struct AdapterHandle {
    adapter: Adapter,
    name: String,
}

impl BtleplugBackend {
    /// Opens the platform manager and enumerates adapters.
    ///
    /// Fails with [`InteractionError::NoAdapters`] when the host has no
    /// usable Bluetooth adapter.
    #[instrument(level = "debug")]
    pub(crate) async fn new() -> Result<Self, InteractionError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        if adapters.is_empty() {
            return Err(InteractionError::NoAdapters);
        }

        let mut handles = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let name = adapter.adapter_info().await?;
            handles.push(AdapterHandle { adapter, name });
        }
        info!(adapter_count = handles.len(), "Bluetooth adapters ready");

        Ok(Self {
            adapters: handles,
            discovered: Mutex::new(HashMap::new()),
        })
    }

    async fn stop_scans(&self) {
        for handle in &self.adapters {
            if let Err(error) = handle.adapter.stop_scan().await {
                debug!(?error, adapter = %handle.name, "failed to stop adapter scan cleanly");
            }
        }
    }

    async fn strongest_match(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Option<(Device, Peripheral)>, InteractionError> {
        let mut best: Option<(Device, Peripheral)> = None;

        for handle in &self.adapters {
            for peripheral in handle.adapter.peripherals().await? {
                let Some(properties) = peripheral.properties().await? else {
                    continue;
                };
                if !filter.accepts(properties.local_name.as_deref()) {
                    continue;
                }

                let device = Device::from_backend(
                    peripheral.id().to_string(),
                    properties.local_name,
                    properties.address.to_string(),
                    properties.rssi,
                );
                trace!(
                    adapter = %handle.name,
                    device = device.identity(),
                    rssi = device.signal_strength_dbm(),
                    "candidate peripheral"
                );
                let stronger = best.as_ref().is_none_or(|(current, _)| {
                    device.signal_strength_dbm() > current.signal_strength_dbm()
                });
                if stronger {
                    best = Some((device, peripheral));
                }
            }
        }

        Ok(best)
    }
}

#[async_trait]
impl BluetoothBackend for BtleplugBackend {
    #[instrument(skip(self), level = "debug", fields(prefix = ?filter.name_prefix()))]
    async fn request_device(&self, filter: &DeviceFilter) -> Result<Device, InteractionError> {
        let scan_filter = ScanFilter::default();
        for handle in &self.adapters {
            handle.adapter.start_scan(scan_filter.clone()).await?;
        }

        sleep(filter.scan_window()).await;
        let selection = self.strongest_match(filter).await;
        self.stop_scans().await;

        let Some((device, peripheral)) = selection? else {
            return Err(InteractionError::NoDeviceSelected);
        };
        info!(device = device.identity(), "selected peripheral");
        self.discovered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device.identity().to_string(), peripheral);
        Ok(device)
    }

    #[instrument(skip(self, device), level = "debug", fields(device = device.identity()))]
    async fn connect(&self, device: &Device) -> Result<Box<dyn GattConnection>, InteractionError> {
        let peripheral = self
            .discovered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device.identity())
            .cloned()
            .ok_or_else(|| InteractionError::UnknownPeripheral {
                device_id: device.identity().to_string(),
            })?;

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        if let Err(error) = peripheral.discover_services().await {
            warn!(%error, "service discovery failed, dropping the link");
            if let Err(disconnect_error) = peripheral.disconnect().await {
                debug!(error = %disconnect_error, "failed to disconnect after discovery error");
            }
            return Err(error.into());
        }
        info!("connected to peripheral");

        Ok(Box::new(BtleplugConnection {
            device_identity: device.identity().to_string(),
            peripheral,
        }))
    }
}

/// Live GATT link to a `btleplug` peripheral.
#[derive(Debug)]
struct BtleplugConnection {
    device_identity: String,
    peripheral: Peripheral,
}

impl BtleplugConnection {
    fn find_characteristic(&self, characteristic: &CharacteristicRef) -> Option<Characteristic> {
        self.peripheral.characteristics().into_iter().find(|candidate| {
            candidate.uuid == characteristic.uuid()
                && candidate.service_uuid == characteristic.service_uuid()
        })
    }
}

#[async_trait]
impl GattConnection for BtleplugConnection {
    fn device_identity(&self) -> &str {
        &self.device_identity
    }

    async fn primary_service(&self, uuid: Uuid) -> Result<GattServiceRef, InteractionError> {
        self.peripheral
            .services()
            .iter()
            .find(|service| service.primary && service.uuid == uuid)
            .map(|service| GattServiceRef::new(service.uuid))
            .ok_or(InteractionError::MissingService { uuid })
    }

    async fn characteristic(
        &self,
        service: &GattServiceRef,
        uuid: Uuid,
    ) -> Result<CharacteristicRef, InteractionError> {
        self.characteristics(service)
            .await?
            .into_iter()
            .find(|characteristic| characteristic.uuid() == uuid)
            .ok_or(InteractionError::MissingCharacteristic { uuid })
    }

    async fn characteristics(
        &self,
        service: &GattServiceRef,
    ) -> Result<Vec<CharacteristicRef>, InteractionError> {
        let services = self.peripheral.services();
        let service = services
            .iter()
            .find(|candidate| candidate.uuid == service.uuid())
            .ok_or(InteractionError::MissingService {
                uuid: service.uuid(),
            })?;

        Ok(service
            .characteristics
            .iter()
            .map(|characteristic| CharacteristicRef::new(service.uuid, characteristic.uuid))
            .collect())
    }

    #[instrument(skip(self), level = "trace", fields(uuid = %characteristic.uuid()))]
    async fn read_value(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<Vec<u8>, InteractionError> {
        let uuid = characteristic.uuid();
        if !self.peripheral.is_connected().await? {
            return Err(InteractionError::NotConnected {
                device_id: self.device_identity.clone(),
            });
        }
        let resolved = self
            .find_characteristic(characteristic)
            .ok_or(InteractionError::MissingCharacteristic { uuid })?;
        if !resolved.properties.contains(CharPropFlags::READ) {
            return Err(InteractionError::UnreadableCharacteristic { uuid });
        }
        Ok(self.peripheral.read(&resolved).await?)
    }

    #[instrument(skip(self), level = "debug", fields(device = %self.device_identity))]
    async fn disconnect(self: Box<Self>) -> Result<(), InteractionError> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}
