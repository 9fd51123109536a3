use std::io;

use anyhow::Result;
use tracing::instrument;

use super::OutputFormat;
use super::context::CommandContext;
use super::ui::DeviceListView;

/// Executes the `scan` command.
#[instrument(skip(context, out), level = "info")]
pub(crate) async fn run<W>(context: &CommandContext<'_>, out: &mut W) -> Result<()>
where
    W: io::Write,
{
    context
        .spinner()
        .with_spinner("Scanning for devices", || context.session().scan())
        .await?;
    let snapshot = context.session().snapshot();

    match context.output_format() {
        OutputFormat::Pretty => {
            let painter = context.painter();
            writeln!(
                out,
                "{}",
                DeviceListView::new(&snapshot.devices, &painter, context.labels())
            )?;
            context.write_notifications(out)?;
        }
        OutputFormat::Json => context.write_json(out, snapshot)?,
    }

    Ok(())
}
