use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::time::sleep;
use tracing::{debug, instrument};

use super::backend::{BluetoothBackend, DeviceFilter, GattConnection};
use super::gatt_reader::{
    BATTERY_LEVEL_UUID, BATTERY_SERVICE_UUID, DEVICE_INFORMATION_SERVICE_UUID,
    FIRMWARE_REVISION_UUID, MANUFACTURER_NAME_UUID, MODEL_NUMBER_UUID, SERIAL_NUMBER_UUID,
};
use super::model::Device;
use super::simulated::{SimulatedCharacteristic, SimulatedConnection, SimulatedService};
use crate::error::{FixtureError, InteractionError};

/// Parsed fake scan fixture records.
#[derive(Debug, Clone, derive_more::Into)]
pub struct ScanFixture {
    devices: Vec<Device>,
}

impl FromStr for ScanFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let devices = parse_scan_fixture(value)?;
        Ok(Self { devices })
    }
}

/// GATT tree exposed by fake peripherals once connected.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, clap::ValueEnum)]
pub enum GattFixture {
    /// Battery and device-information services, all readable.
    #[default]
    Full,
    /// No battery service.
    NoBattery,
    /// No device-information service.
    NoDeviceInfo,
    /// Device information with an unreadable and an undecodable characteristic.
    Faulty,
    /// Connection attempts are rejected.
    Unreachable,
}

/// Failure injected into every discovery request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, clap::ValueEnum)]
pub enum DiscoveryFailure {
    /// The user dismissed the device picker.
    Cancelled,
    /// The platform refused Bluetooth access.
    PermissionDenied,
    /// The adapter went away mid-scan.
    AdapterLost,
}

/// Settings for constructing a fake hardware backend.
#[derive(Debug, Clone, Builder)]
pub struct FakeBackendConfig {
    scan_fixture: ScanFixture,
    #[builder(default)]
    gatt: GattFixture,
    discovery_failure: Option<DiscoveryFailure>,
    #[builder(default)]
    discovery_delay: Duration,
    #[builder(default)]
    connect_delay: Duration,
    /// Time spent discovering services after the link is already open.
    #[builder(default)]
    service_discovery_delay: Duration,
    /// Time every characteristic read takes.
    #[builder(default)]
    read_delay: Duration,
}

/// Counters shared between a fake backend and the test observing it.
#[derive(Debug, Clone, Default)]
pub struct FakeBackendStats {
    discovery_requests: Arc<AtomicUsize>,
    connect_attempts: Arc<AtomicUsize>,
    open_connections: Arc<AtomicUsize>,
}

impl FakeBackendStats {
    #[must_use]
    pub fn discovery_requests(&self) -> usize {
        self.discovery_requests.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of connections opened and not yet disconnected.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }
}

/// Fixture-driven backend used in tests and hardware-less environments.
#[derive(Debug)]
pub struct FakeBackend {
    devices: Vec<Device>,
    gatt: GattFixture,
    discovery_failure: Option<DiscoveryFailure>,
    discovery_delay: Duration,
    connect_delay: Duration,
    service_discovery_delay: Duration,
    read_delay: Duration,
    stats: FakeBackendStats,
}

impl FakeBackend {
    #[must_use]
    pub fn new(config: FakeBackendConfig) -> Self {
        Self {
            devices: config.scan_fixture.into(),
            gatt: config.gatt,
            discovery_failure: config.discovery_failure,
            discovery_delay: config.discovery_delay,
            connect_delay: config.connect_delay,
            service_discovery_delay: config.service_discovery_delay,
            read_delay: config.read_delay,
            stats: FakeBackendStats::default(),
        }
    }

    /// Returns a handle to the backend's call counters.
    #[must_use]
    pub fn stats(&self) -> FakeBackendStats {
        self.stats.clone()
    }
}

#[async_trait]
impl BluetoothBackend for FakeBackend {
    #[instrument(skip(self), level = "debug", fields(prefix = ?filter.name_prefix()))]
    async fn request_device(&self, filter: &DeviceFilter) -> Result<Device, InteractionError> {
        self.stats.discovery_requests.fetch_add(1, Ordering::SeqCst);
        if !self.discovery_delay.is_zero() {
            sleep(self.discovery_delay).await;
        }

        match self.discovery_failure {
            Some(DiscoveryFailure::Cancelled) => return Err(InteractionError::NoDeviceSelected),
            Some(DiscoveryFailure::PermissionDenied) => {
                return Err(InteractionError::PermissionDenied);
            }
            Some(DiscoveryFailure::AdapterLost) => return Err(InteractionError::NoAdapters),
            None => {}
        }

        self.devices
            .iter()
            .find(|device| filter.accepts(Some(device.name())))
            .cloned()
            .ok_or(InteractionError::NoDeviceSelected)
    }

    #[instrument(skip(self, device), level = "debug", fields(device = device.identity()))]
    async fn connect(&self, device: &Device) -> Result<Box<dyn GattConnection>, InteractionError> {
        self.stats.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.connect_delay.is_zero() {
            sleep(self.connect_delay).await;
        }

        if !self
            .devices
            .iter()
            .any(|known| known.identity() == device.identity())
        {
            return Err(InteractionError::UnknownPeripheral {
                device_id: device.identity().to_string(),
            });
        }
        if self.gatt == GattFixture::Unreachable {
            return Err(InteractionError::ConnectRejected {
                device_id: device.identity().to_string(),
            });
        }

        debug!(gatt = ?self.gatt, "opening fake GATT connection");
        let services = fixture_services(self.gatt, device);
        let connection = SimulatedConnection::new(device.identity(), services)
            .with_read_delay(self.read_delay)
            .tracked(self.stats.open_connections.clone());
        if !self.service_discovery_delay.is_zero() {
            sleep(self.service_discovery_delay).await;
        }
        Ok(Box::new(connection))
    }
}

fn fixture_services(gatt: GattFixture, device: &Device) -> Vec<SimulatedService> {
    let battery = SimulatedService::new(
        BATTERY_SERVICE_UUID,
        vec![SimulatedCharacteristic::readable(
            BATTERY_LEVEL_UUID,
            vec![device.battery_level_percent().unwrap_or(50)],
        )],
    );
    let mut device_information = vec![
        SimulatedCharacteristic::readable(MANUFACTURER_NAME_UUID, b"Fixture Labs".to_vec()),
        SimulatedCharacteristic::readable(MODEL_NUMBER_UUID, device.name().as_bytes().to_vec()),
    ];
    if gatt == GattFixture::Faulty {
        device_information.push(SimulatedCharacteristic::unreadable(SERIAL_NUMBER_UUID));
        device_information.push(SimulatedCharacteristic::readable(
            FIRMWARE_REVISION_UUID,
            vec![0xC3, 0x28],
        ));
    }
    let device_information =
        SimulatedService::new(DEVICE_INFORMATION_SERVICE_UUID, device_information);

    match gatt {
        GattFixture::Full | GattFixture::Faulty => vec![battery, device_information],
        GattFixture::NoBattery => vec![device_information],
        GattFixture::NoDeviceInfo => vec![battery],
        GattFixture::Unreachable => Vec::new(),
    }
}

fn parse_scan_fixture(raw_fixture: &str) -> Result<Vec<Device>, FixtureError> {
    if raw_fixture.trim().is_empty() {
        return Err(FixtureError::EmptyFixture);
    }

    raw_fixture
        .split(';')
        .map(parse_scan_record)
        .collect::<Result<Vec<_>, _>>()
}

/// Parses `device_id|name|rssi[|battery]`.
fn parse_scan_record(raw_record: &str) -> Result<Device, FixtureError> {
    let fields: Vec<&str> = raw_record.split('|').map(str::trim).collect();
    if !(3..=4).contains(&fields.len()) {
        return Err(FixtureError::InvalidRecordFieldCount);
    }
    if fields.iter().any(|field| field.is_empty()) {
        return Err(FixtureError::EmptyRecordField);
    }

    let name = if fields[1] == "-" {
        None
    } else {
        Some(fields[1].to_string())
    };
    let rssi = fields[2].parse::<i16>().map_err(FixtureError::InvalidRssi)?;
    let battery_level = match fields.get(3) {
        None | Some(&"-") => None,
        Some(raw) => Some(
            raw.parse::<u8>()
                .ok()
                .filter(|level| *level <= 100)
                .ok_or_else(|| FixtureError::InvalidBatteryLevel {
                    value: (*raw).to_string(),
                })?,
        ),
    };

    Ok(Device::from_backend(
        fields[0].to_string(),
        name,
        fields[0].to_string(),
        Some(rssi),
    )
    .with_battery_level(battery_level))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::hw::DeviceOrigin;

    fn backend(fixture: &str) -> anyhow::Result<FakeBackend> {
        let config = FakeBackendConfig::builder()
            .scan_fixture(fixture.parse()?)
            .build();
        Ok(FakeBackend::new(config))
    }

    #[rstest]
    #[case("AA:BB|Sony WH-1000XM4|-45", 1)]
    #[case("AA:BB|Sony WH-1000XM4|-45|85;CC:DD|-|-70", 2)]
    fn parse_scan_fixture_parses_records(#[case] fixture: &str, #[case] expected_count: usize) {
        let devices = parse_scan_fixture(fixture).expect("fixture should parse");
        assert_eq!(expected_count, devices.len());
        assert!(
            devices
                .iter()
                .all(|device| device.origin() == DeviceOrigin::Hardware)
        );
    }

    #[rstest]
    #[case("AA:BB|Speaker")]
    #[case("AA:BB|Speaker|-40|10|extra")]
    fn parse_scan_fixture_rejects_invalid_field_count(#[case] fixture: &str) {
        let result = parse_scan_fixture(fixture);
        assert_matches!(result, Err(FixtureError::InvalidRecordFieldCount));
    }

    #[test]
    fn parse_scan_fixture_rejects_battery_above_hundred() {
        let result = parse_scan_fixture("AA:BB|Speaker|-40|140");
        assert_matches!(result, Err(FixtureError::InvalidBatteryLevel { value }) if value == "140");
    }

    #[tokio::test]
    async fn request_device_returns_first_match_for_prefix() -> anyhow::Result<()> {
        let backend = backend("AA|Apple AirPods Pro|-55;BB|Sony WH-1000XM4|-45")?;
        let filter = DeviceFilter::builder().name_prefix("Sony").build();

        let device = backend.request_device(&filter).await?;

        assert_eq!("BB", device.identity());
        assert_eq!(1, backend.stats().discovery_requests());
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_fixture_rejects_connections() -> anyhow::Result<()> {
        let config = FakeBackendConfig::builder()
            .scan_fixture("AA|Speaker|-40".parse()?)
            .gatt(GattFixture::Unreachable)
            .build();
        let backend = FakeBackend::new(config);
        let device = backend.request_device(&DeviceFilter::default()).await?;

        let result = backend.connect(&device).await;

        assert_matches!(result, Err(InteractionError::ConnectRejected { .. }));
        assert_eq!(0, backend.stats().open_connections());
        Ok(())
    }
}
