use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::backend::{CharacteristicRef, GattConnection};
use crate::error::{InteractionError, ReadError};

pub const BATTERY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);
pub const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);
pub const DEVICE_INFORMATION_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);
pub const MANUFACTURER_NAME_UUID: Uuid = Uuid::from_u128(0x00002a29_0000_1000_8000_00805f9b34fb);
pub const MODEL_NUMBER_UUID: Uuid = Uuid::from_u128(0x00002a24_0000_1000_8000_00805f9b34fb);
pub const SERIAL_NUMBER_UUID: Uuid = Uuid::from_u128(0x00002a25_0000_1000_8000_00805f9b34fb);
pub const FIRMWARE_REVISION_UUID: Uuid = Uuid::from_u128(0x00002a26_0000_1000_8000_00805f9b34fb);
pub const HARDWARE_REVISION_UUID: Uuid = Uuid::from_u128(0x00002a27_0000_1000_8000_00805f9b34fb);
pub const SOFTWARE_REVISION_UUID: Uuid = Uuid::from_u128(0x00002a28_0000_1000_8000_00805f9b34fb);

/// Record key used for the decoded battery level.
pub const BATTERY_LEVEL_KEY: &str = "battery_level";

const KNOWN_CHARACTERISTICS: [(Uuid, &str); 6] = [
    (MANUFACTURER_NAME_UUID, "Manufacturer"),
    (MODEL_NUMBER_UUID, "Model number"),
    (SERIAL_NUMBER_UUID, "Serial number"),
    (FIRMWARE_REVISION_UUID, "Firmware revision"),
    (HARDWARE_REVISION_UUID, "Hardware revision"),
    (SOFTWARE_REVISION_UUID, "Software revision"),
];

/// A characteristic that could not be read during the last pass.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ReadFailure {
    key: String,
    reason: String,
}

impl ReadFailure {
    fn new(key: impl Into<String>, error: &ReadError) -> Self {
        Self {
            key: key.into(),
            reason: error.to_string(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Best-effort values read from a connected peripheral.
///
/// Keys are [`BATTERY_LEVEL_KEY`] and lowercase characteristic UUIDs.
/// Characteristics that failed are absent from the values.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct DeviceInfoRecord {
    values: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<ReadFailure>,
}

impl DeviceInfoRecord {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the value read from a characteristic UUID.
    #[must_use]
    pub fn characteristic(&self, uuid: Uuid) -> Option<&str> {
        self.get(&characteristic_key(uuid))
    }

    #[must_use]
    pub fn battery_level_percent(&self) -> Option<u8> {
        self.get(BATTERY_LEVEL_KEY)
            .and_then(|value| value.parse().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the characteristics skipped during the read pass.
    #[must_use]
    pub fn failures(&self) -> &[ReadFailure] {
        &self.failures
    }

    fn absorb(&mut self, key: String, outcome: Result<String, ReadError>) {
        match outcome {
            Ok(value) => {
                self.values.insert(key, value);
            }
            Err(error) => {
                debug!(%key, %error, "skipping unreadable characteristic");
                self.failures.push(ReadFailure::new(key, &error));
            }
        }
    }
}

/// Returns a human label for a record key.
#[must_use]
pub fn record_label(key: &str) -> &str {
    if key == BATTERY_LEVEL_KEY {
        return "Battery level";
    }

    KNOWN_CHARACTERISTICS
        .iter()
        .find(|(uuid, _)| characteristic_key(*uuid) == key)
        .map_or(key, |(_, label)| label)
}

fn characteristic_key(uuid: Uuid) -> String {
    uuid.to_string().to_ascii_lowercase()
}

/// Walks the battery and device-information services of a connection.
///
/// Every read is independent: a missing service, a missing characteristic or
/// an undecodable payload only removes that key from the record.
pub struct GattInfoReader;

impl GattInfoReader {
    /// Performs one read pass. Never fails; the worst case is an empty record.
    #[instrument(skip(connection), level = "debug", fields(device = connection.device_identity()))]
    pub async fn read(connection: &dyn GattConnection) -> DeviceInfoRecord {
        let mut record = DeviceInfoRecord::default();

        let battery = read_battery_level(connection).await;
        record.absorb(BATTERY_LEVEL_KEY.to_string(), battery);

        match connection
            .primary_service(DEVICE_INFORMATION_SERVICE_UUID)
            .await
        {
            Ok(service) => match connection.characteristics(&service).await {
                Ok(characteristics) => {
                    for characteristic in characteristics {
                        let value = read_text(connection, &characteristic).await;
                        record.absorb(characteristic_key(characteristic.uuid()), value);
                    }
                }
                Err(source) => {
                    let error = ReadError::MissingCharacteristic {
                        uuid: DEVICE_INFORMATION_SERVICE_UUID,
                        source,
                    };
                    record.absorb(characteristic_key(DEVICE_INFORMATION_SERVICE_UUID), Err(error));
                }
            },
            Err(source) => {
                let error = ReadError::MissingService {
                    uuid: DEVICE_INFORMATION_SERVICE_UUID,
                    source,
                };
                record.absorb(characteristic_key(DEVICE_INFORMATION_SERVICE_UUID), Err(error));
            }
        }

        debug!(
            values = record.len(),
            failures = record.failures().len(),
            "GATT info pass finished"
        );
        record
    }
}

async fn read_battery_level(connection: &dyn GattConnection) -> Result<String, ReadError> {
    let service = connection
        .primary_service(BATTERY_SERVICE_UUID)
        .await
        .map_err(|source| ReadError::MissingService {
            uuid: BATTERY_SERVICE_UUID,
            source,
        })?;
    let characteristic = connection
        .characteristic(&service, BATTERY_LEVEL_UUID)
        .await
        .map_err(|source| ReadError::MissingCharacteristic {
            uuid: BATTERY_LEVEL_UUID,
            source,
        })?;
    let payload = read_payload(connection, &characteristic).await?;
    let Some(&level) = payload.first() else {
        return Err(ReadError::EmptyPayload {
            uuid: BATTERY_LEVEL_UUID,
        });
    };
    if level > 100 {
        return Err(ReadError::BatteryOutOfRange { value: level });
    }
    Ok(level.to_string())
}

async fn read_text(
    connection: &dyn GattConnection,
    characteristic: &CharacteristicRef,
) -> Result<String, ReadError> {
    let mut payload = read_payload(connection, characteristic).await?;
    while payload.last() == Some(&0) {
        payload.pop();
    }
    if payload.is_empty() {
        return Err(ReadError::EmptyPayload {
            uuid: characteristic.uuid(),
        });
    }
    String::from_utf8(payload).map_err(|source| ReadError::Utf8 {
        uuid: characteristic.uuid(),
        source,
    })
}

async fn read_payload(
    connection: &dyn GattConnection,
    characteristic: &CharacteristicRef,
) -> Result<Vec<u8>, ReadError> {
    connection
        .read_value(characteristic)
        .await
        .map_err(|source: InteractionError| ReadError::Transport {
            uuid: characteristic.uuid(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::hw::simulated::{SimulatedCharacteristic, SimulatedConnection, SimulatedService};

    fn device_information(characteristics: Vec<SimulatedCharacteristic>) -> SimulatedService {
        SimulatedService::new(DEVICE_INFORMATION_SERVICE_UUID, characteristics)
    }

    fn battery(payload: &[u8]) -> SimulatedService {
        SimulatedService::new(
            BATTERY_SERVICE_UUID,
            vec![SimulatedCharacteristic::readable(
                BATTERY_LEVEL_UUID,
                payload.to_vec(),
            )],
        )
    }

    #[tokio::test]
    async fn reads_battery_and_every_device_information_characteristic() {
        let connection = SimulatedConnection::new(
            "AA:BB",
            vec![
                battery(&[85]),
                device_information(vec![
                    SimulatedCharacteristic::readable(MANUFACTURER_NAME_UUID, b"Sony".to_vec()),
                    SimulatedCharacteristic::readable(MODEL_NUMBER_UUID, b"WH-1000XM4\0".to_vec()),
                ]),
            ],
        );

        let record = GattInfoReader::read(&connection).await;

        assert_eq!(Some(85), record.battery_level_percent());
        assert_eq!(Some("Sony"), record.characteristic(MANUFACTURER_NAME_UUID));
        assert_eq!(Some("WH-1000XM4"), record.characteristic(MODEL_NUMBER_UUID));
        assert_eq!(3, record.len());
        assert!(record.failures().is_empty());
    }

    #[tokio::test]
    async fn one_bad_characteristic_does_not_abort_the_others() {
        let connection = SimulatedConnection::new(
            "AA:BB",
            vec![
                battery(&[40]),
                device_information(vec![
                    SimulatedCharacteristic::readable(MANUFACTURER_NAME_UUID, b"Acme".to_vec()),
                    SimulatedCharacteristic::unreadable(SERIAL_NUMBER_UUID),
                    SimulatedCharacteristic::readable(FIRMWARE_REVISION_UUID, vec![0xFF, 0xFE]),
                    SimulatedCharacteristic::readable(MODEL_NUMBER_UUID, b"X1".to_vec()),
                ]),
            ],
        );

        let record = GattInfoReader::read(&connection).await;

        assert_eq!(Some("Acme"), record.characteristic(MANUFACTURER_NAME_UUID));
        assert_eq!(Some("X1"), record.characteristic(MODEL_NUMBER_UUID));
        assert_eq!(None, record.characteristic(SERIAL_NUMBER_UUID));
        assert_eq!(None, record.characteristic(FIRMWARE_REVISION_UUID));
        assert_eq!(2, record.failures().len());
    }

    #[rstest]
    #[case::empty_payload(vec![battery(&[])])]
    #[case::out_of_range(vec![battery(&[101])])]
    #[case::no_services(vec![])]
    #[case::empty_device_information(vec![device_information(vec![])])]
    #[tokio::test]
    async fn degraded_trees_yield_empty_record(#[case] services: Vec<SimulatedService>) {
        let connection = SimulatedConnection::new("AA:BB", services);

        let record = GattInfoReader::read(&connection).await;

        assert!(record.is_empty());
        assert_eq!(None, record.battery_level_percent());
    }

    #[test]
    fn record_label_names_known_keys() {
        assert_eq!("Battery level", record_label(BATTERY_LEVEL_KEY));
        assert_eq!(
            "Model number",
            record_label("00002a24-0000-1000-8000-00805f9b34fb")
        );
        assert_eq!("custom", record_label("custom"));
    }
}
