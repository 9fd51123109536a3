use std::fmt::{self, Display, Formatter};

use crate::diagnosis::TranslationTable;
use crate::hw::{DeviceInfoRecord, record_label};

use super::painter::Painter;
use super::table::Table;

/// Renders the device-information record read after connecting.
pub(crate) struct DeviceInfoView<'a> {
    record: &'a DeviceInfoRecord,
    painter: &'a Painter,
    labels: &'a TranslationTable,
}

impl<'a> DeviceInfoView<'a> {
    pub(crate) fn new(
        record: &'a DeviceInfoRecord,
        painter: &'a Painter,
        labels: &'a TranslationTable,
    ) -> Self {
        Self {
            record,
            painter,
            labels,
        }
    }
}

impl Display for DeviceInfoView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let heading = self.labels.text("device_info", Some("Device information"));
        writeln!(f, "{}", self.painter.heading(heading))?;

        if self.record.is_empty() {
            write!(f, "{}", self.painter.muted("No readable characteristics"))?;
        } else {
            let rows = self
                .record
                .iter()
                .map(|(key, value)| (record_label(key), self.painter.value(value)))
                .collect();
            write!(f, "{}", Table::key_value(self.painter, rows))?;
        }

        for failure in self.record.failures() {
            write!(
                f,
                "\n{} {}: {}",
                self.painter.warning("!"),
                record_label(failure.key()),
                self.painter.muted(failure.reason())
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::catalog::simulated_catalog;
    use crate::hw::GattInfoReader;
    use crate::hw::simulated::SimulatedConnection;

    #[tokio::test]
    async fn record_rows_use_readable_labels() {
        let devices = simulated_catalog();
        let connection = SimulatedConnection::for_device(&devices[0]);
        let record = GattInfoReader::read(&connection).await;
        let painter = Painter::new(false);
        let labels = TranslationTable::default();

        let rendered = DeviceInfoView::new(&record, &painter, &labels).to_string();

        assert_snapshot!(rendered.lines().next().unwrap_or_default(), @"Device information");
        assert!(rendered.contains("Battery level"));
        assert!(rendered.contains("Manufacturer"));
        assert!(rendered.contains("Sony"));
    }
}
