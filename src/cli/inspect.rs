use std::io;

use anyhow::Result;
use tracing::instrument;

use super::context::CommandContext;
use super::ui::{DeviceInfoView, DeviceView};
use super::{DeviceArgs, OutputFormat};

/// Executes the `inspect` command.
#[instrument(skip(context, out), level = "info", fields(device = args.device()))]
pub(crate) async fn run<W>(
    context: &CommandContext<'_>,
    args: &DeviceArgs,
    out: &mut W,
) -> Result<()>
where
    W: io::Write,
{
    let record = context.open(args.device()).await?;
    let snapshot = context.session().snapshot();
    context.session().disconnect().await;

    match context.output_format() {
        OutputFormat::Pretty => {
            let painter = context.painter();
            if let Some(device) = &snapshot.connected {
                writeln!(out, "{}", DeviceView::new(device, &painter))?;
            }
            writeln!(
                out,
                "{}",
                DeviceInfoView::new(&record, &painter, context.labels())
            )?;
            context.write_notifications(out)?;
        }
        OutputFormat::Json => context.write_json(out, snapshot)?,
    }

    Ok(())
}
