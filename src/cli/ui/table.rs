use std::fmt::{self, Display, Formatter};

use tabled::{builder::Builder, settings::Style as TableStyle};

use super::painter::Painter;

/// A structured table that renders via `Display`.
#[derive(Debug)]
pub(crate) struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table with column headers and data rows.
    pub(crate) fn grid(
        headers: impl IntoIterator<Item = impl Into<String>>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// Creates a two-column field/value table with muted field names.
    pub(crate) fn key_value(painter: &Painter, rows: Vec<(&str, String)>) -> Self {
        let records = rows
            .into_iter()
            .map(|(field, value)| vec![painter.muted(field), value])
            .collect();
        Self::grid(["field", "value"], records)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        builder.push_record(&self.headers);
        for row in &self.rows {
            builder.push_record(row);
        }
        let mut table = builder.build();
        table.with(TableStyle::rounded());
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn grid_table_renders_headers_above_rows() {
        let table = Table::grid(
            ["name", "signal"],
            vec![
                vec!["Sony WH-1000XM4".into(), "-45 dBm".into()],
                vec!["Logitech MX Keys".into(), "-35 dBm".into()],
            ],
        )
        .to_string();

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(6, lines.len());
        assert!(lines[0].starts_with('╭'));
        assert!(lines[1].contains("name") && lines[1].contains("signal"));
        assert!(lines[3].contains("Sony WH-1000XM4"));
        assert!(lines[4].contains("Logitech MX Keys"));
    }

    #[test]
    fn key_value_table_uses_field_value_headers() {
        let painter = Painter::new(false);
        let table = Table::key_value(&painter, vec![("battery", "85%".into())]).to_string();

        assert!(table.contains("field"));
        assert!(table.contains("battery"));
        assert!(table.contains("85%"));
    }
}
