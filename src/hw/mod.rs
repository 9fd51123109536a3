mod backend;
mod btleplug_backend;
mod capability;
mod fake_backend;
mod gatt_reader;
mod model;
pub(crate) mod simulated;

pub use self::backend::{
    BluetoothBackend, CharacteristicRef, DEFAULT_SCAN_WINDOW, DeviceFilter, GattConnection,
    GattServiceRef,
};
pub use self::capability::{CapabilityProbe, HardwareBackendKind};
pub use self::fake_backend::{
    DiscoveryFailure, FakeBackend, FakeBackendConfig, FakeBackendStats, GattFixture, ScanFixture,
};
pub use self::gatt_reader::{
    BATTERY_LEVEL_KEY, BATTERY_LEVEL_UUID, BATTERY_SERVICE_UUID, DEVICE_INFORMATION_SERVICE_UUID,
    DeviceInfoRecord, FIRMWARE_REVISION_UUID, GattInfoReader, HARDWARE_REVISION_UUID,
    MANUFACTURER_NAME_UUID, MODEL_NUMBER_UUID, ReadFailure, SERIAL_NUMBER_UUID,
    SOFTWARE_REVISION_UUID, record_label,
};
pub use self::model::{Device, DeviceOrigin, DeviceType};
