use std::io;

use anyhow::Result;
use serde_json::json;
use tracing::{instrument, warn};

use crate::diagnosis::ServiceClient;
use crate::terminal::TerminalClient;
use crate::utils::yes_no;

use super::OutputFormat;
use super::ui::{Painter, Table};

/// Executes the `status` command. An unreachable service is reported, not
/// treated as a failure.
#[instrument(
    skip(client, out, terminal_client),
    level = "info",
    fields(base_url = client.base_url())
)]
pub(crate) async fn run<W>(
    client: &ServiceClient,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let status = client.status().await;
    if let Err(error) = &status {
        warn!(%error, "diagnosis service status unavailable");
    }

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", painter.heading(client.base_url()))?;
            match status {
                Ok(status) => {
                    let languages = status
                        .available_languages
                        .keys()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(", ");
                    let table = Table::key_value(
                        &painter,
                        vec![
                            ("ai_system", painter.value(yes_no(status.ai_system))),
                            ("language_system", painter.value(yes_no(status.language_system))),
                            ("languages", painter.value(languages)),
                            (
                                "current_language",
                                painter.value(status.current_language.as_deref().unwrap_or("-")),
                            ),
                        ],
                    );
                    writeln!(out, "{table}")?;
                }
                Err(error) => {
                    writeln!(
                        out,
                        "{} {}",
                        painter.warning("unavailable"),
                        painter.muted(error.to_string())
                    )?;
                }
            }
        }
        OutputFormat::Json => {
            let document = match status {
                Ok(status) => json!({ "available": true, "status": status }),
                Err(error) => json!({ "available": false, "error": error.to_string() }),
            };
            serde_json::to_writer_pretty(&mut *out, &document)?;
            writeln!(out)?;
        }
    }

    Ok(())
}
