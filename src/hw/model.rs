use serde::{Deserialize, Serialize};

/// Signal strength reported for a device after a successful fix.
pub(crate) const HEALTHY_SIGNAL_DBM: i16 = -40;

/// Broad device category, inferred from the advertised name when the
/// backend does not report one.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DeviceType {
    Headphones,
    Earbuds,
    Speaker,
    Keyboard,
    Peripheral,
    Wearable,
    Computer,
    #[serde(other)]
    Unknown,
}

impl DeviceType {
    /// Infers a category from a device name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let name = name.to_lowercase();
        let contains_any = |words: &[&str]| words.iter().any(|word| name.contains(word));

        if contains_any(&["airpod", "earbud", "galaxy bud", "tws"]) {
            Self::Earbuds
        } else if contains_any(&["headphone", "headset", "wh-", "xm"]) {
            Self::Headphones
        } else if contains_any(&["speaker", "soundbar", "jbl", "bose"]) {
            Self::Speaker
        } else if contains_any(&["keyboard", "keys"]) {
            Self::Keyboard
        } else if contains_any(&["mouse", "mx", "logitech"]) {
            Self::Peripheral
        } else if contains_any(&["watch", "fitbit"]) {
            Self::Wearable
        } else {
            Self::Unknown
        }
    }

    /// Returns whether the device carries an audio stream.
    #[must_use]
    pub fn is_audio(self) -> bool {
        matches!(self, Self::Headphones | Self::Earbuds | Self::Speaker)
    }
}

/// Where a device snapshot came from. Decides how a connection is opened.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, derive_more::Display)]
pub enum DeviceOrigin {
    #[display("hardware")]
    Hardware,
    #[default]
    #[display("simulated")]
    Simulated,
    #[display("remote")]
    Remote,
}

/// Immutable snapshot of a Bluetooth peripheral.
///
/// The session replaces snapshots rather than mutating them; the `with_*`
/// methods return updated copies.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    mac_address: String,
    signal_strength: i16,
    device_type: DeviceType,
    connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    battery_level: Option<u8>,
    #[serde(skip)]
    origin: DeviceOrigin,
}

impl Device {
    /// Creates a catalog entry identified by its MAC address.
    #[must_use]
    pub fn simulated(
        name: impl Into<String>,
        mac_address: impl Into<String>,
        signal_strength: i16,
        device_type: DeviceType,
        connected: bool,
        battery_level: Option<u8>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            mac_address: mac_address.into(),
            signal_strength,
            device_type,
            connected,
            battery_level,
            origin: DeviceOrigin::Simulated,
        }
    }

    /// Creates a device reported by the hardware backend.
    pub(crate) fn from_backend(
        id: String,
        name: Option<String>,
        mac_address: String,
        rssi: Option<i16>,
    ) -> Self {
        let name = name.unwrap_or_else(|| "Unknown Device".to_string());
        Self {
            id: Some(id),
            device_type: DeviceType::from_name(&name),
            name,
            mac_address,
            signal_strength: rssi.unwrap_or(i16::MIN),
            connected: false,
            battery_level: None,
            origin: DeviceOrigin::Hardware,
        }
    }

    /// Returns the session identity: the backend id when present, otherwise
    /// the MAC address.
    #[must_use]
    pub fn identity(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.mac_address)
    }

    /// Returns the backend-specific identifier, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn mac_address(&self) -> &str {
        &self.mac_address
    }

    /// Returns the last observed signal strength in dBm.
    #[must_use]
    pub fn signal_strength_dbm(&self) -> i16 {
        self.signal_strength
    }

    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn battery_level_percent(&self) -> Option<u8> {
        self.battery_level
    }

    #[must_use]
    pub fn origin(&self) -> DeviceOrigin {
        self.origin
    }

    pub(crate) fn with_origin(mut self, origin: DeviceOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub(crate) fn with_connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }

    pub(crate) fn with_battery_level(mut self, battery_level: Option<u8>) -> Self {
        if battery_level.is_some() {
            self.battery_level = battery_level;
        }
        self
    }

    /// Returns the snapshot reflecting a completed corrective action.
    pub(crate) fn healed(self) -> Self {
        Self {
            connected: true,
            signal_strength: HEALTHY_SIGNAL_DBM,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Sony WH-1000XM4", DeviceType::Headphones)]
    #[case("Apple AirPods Pro", DeviceType::Earbuds)]
    #[case("Logitech MX Keys", DeviceType::Keyboard)]
    #[case("Logitech MX Master", DeviceType::Peripheral)]
    #[case("JBL Flip 5", DeviceType::Speaker)]
    #[case("Fitbit Charge", DeviceType::Wearable)]
    #[case("Thermostat", DeviceType::Unknown)]
    fn device_type_is_inferred_from_name(#[case] name: &str, #[case] expected: DeviceType) {
        assert_eq!(expected, DeviceType::from_name(name));
    }

    #[test]
    fn identity_prefers_backend_id_over_mac() {
        let hardware = Device::from_backend(
            "hci0/dev_AA".into(),
            Some("Speaker".into()),
            "AA:BB".into(),
            Some(-50),
        );
        let simulated =
            Device::simulated("Speaker", "AA:BB", -50, DeviceType::Speaker, false, None);

        assert_eq!("hci0/dev_AA", hardware.identity());
        assert_eq!("AA:BB", simulated.identity());
    }

    #[test]
    fn serialises_with_wire_field_names() -> anyhow::Result<()> {
        let device = Device::simulated(
            "Sony WH-1000XM4",
            "04:5F:01:02:03",
            -45,
            DeviceType::Headphones,
            false,
            Some(85),
        );

        let value = serde_json::to_value(&device)?;
        assert_eq!(
            serde_json::json!({
                "name": "Sony WH-1000XM4",
                "mac_address": "04:5F:01:02:03",
                "signal_strength": -45,
                "device_type": "headphones",
                "connected": false,
                "battery_level": 85,
            }),
            value
        );
        Ok(())
    }

    #[test]
    fn unknown_device_type_deserialises_as_unknown() -> anyhow::Result<()> {
        let device: Device = serde_json::from_value(serde_json::json!({
            "name": "Gadget",
            "mac_address": "00:11",
            "signal_strength": -70,
            "device_type": "toaster",
            "connected": false,
        }))?;

        assert_eq!(DeviceType::Unknown, device.device_type());
        assert_eq!(None, device.battery_level_percent());
        Ok(())
    }

    #[test]
    fn healed_sets_connected_and_healthy_signal() {
        let device = Device::simulated("Buds", "DC:56", -75, DeviceType::Earbuds, false, Some(10))
            .healed();

        assert_eq!(true, device.is_connected());
        assert_eq!(HEALTHY_SIGNAL_DBM, device.signal_strength_dbm());
    }
}
