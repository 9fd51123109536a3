use std::fmt::{self, Display, Formatter};

use crate::diagnosis::TranslationTable;
use crate::hw::Device;
use crate::utils::{format_battery, format_dbm, yes_no};

use super::painter::Painter;
use super::table::Table;

/// Renders one `Device` as a key-value table.
pub(crate) struct DeviceView<'a> {
    device: &'a Device,
    painter: &'a Painter,
}

impl<'a> DeviceView<'a> {
    pub(crate) fn new(device: &'a Device, painter: &'a Painter) -> Self {
        Self { device, painter }
    }
}

impl Display for DeviceView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let device = self.device;
        let table = Table::key_value(
            self.painter,
            vec![
                ("id", self.painter.value(device.identity())),
                ("name", self.painter.value(device.name())),
                ("mac_address", self.painter.value(device.mac_address())),
                ("type", self.painter.value(device.device_type().to_string())),
                ("signal", self.painter.value(format_dbm(device.signal_strength_dbm()))),
                (
                    "battery",
                    self.painter.value(format_battery(device.battery_level_percent())),
                ),
                ("connected", self.painter.value(yes_no(device.is_connected()))),
                ("source", self.painter.muted(device.origin().to_string())),
            ],
        );
        write!(f, "{table}")
    }
}

/// Renders a scan result as a heading and one row per device.
pub(crate) struct DeviceListView<'a> {
    devices: &'a [Device],
    painter: &'a Painter,
    labels: &'a TranslationTable,
}

impl<'a> DeviceListView<'a> {
    pub(crate) fn new(
        devices: &'a [Device],
        painter: &'a Painter,
        labels: &'a TranslationTable,
    ) -> Self {
        Self {
            devices,
            painter,
            labels,
        }
    }
}

impl Display for DeviceListView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let heading = self.labels.text("found_devices", Some("Found devices"));
        writeln!(
            f,
            "{} {}",
            self.painter.heading(heading),
            self.painter.muted(format!("({})", self.devices.len()))
        )?;

        if self.devices.is_empty() {
            return write!(
                f,
                "{}",
                self.painter
                    .muted(self.labels.text("no_devices", Some("No devices found")))
            );
        }

        let rows = self
            .devices
            .iter()
            .map(|device| {
                vec![
                    device.identity().to_string(),
                    device.name().to_string(),
                    device.device_type().to_string(),
                    format_dbm(device.signal_strength_dbm()),
                    format_battery(device.battery_level_percent()),
                    yes_no(device.is_connected()).to_string(),
                ]
            })
            .collect();
        let table = Table::grid(
            ["id", "name", "type", "signal", "battery", "connected"],
            rows,
        );
        write!(f, "{table}")
    }
}
