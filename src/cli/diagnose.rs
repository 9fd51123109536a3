use std::io;

use anyhow::Result;
use tracing::instrument;

use super::context::CommandContext;
use super::ui::{DeviceView, DiagnosisView};
use super::{DeviceArgs, OutputFormat};

/// Executes the `diagnose` command.
#[instrument(skip(context, out), level = "info", fields(device = args.device()))]
pub(crate) async fn run<W>(
    context: &CommandContext<'_>,
    args: &DeviceArgs,
    out: &mut W,
) -> Result<()>
where
    W: io::Write,
{
    context.open(args.device()).await?;
    let diagnosis = context
        .spinner()
        .with_spinner("Running diagnosis", || context.session().diagnose())
        .await;
    let snapshot = context.session().snapshot();
    context.session().disconnect().await;
    let diagnosis = diagnosis?;

    match context.output_format() {
        OutputFormat::Pretty => {
            let painter = context.painter();
            if let Some(device) = &snapshot.connected {
                writeln!(out, "{}", DeviceView::new(device, &painter))?;
            }
            writeln!(
                out,
                "{}",
                DiagnosisView::new(&diagnosis, &painter, context.labels())
            )?;
            context.write_notifications(out)?;
        }
        OutputFormat::Json => context.write_json(out, snapshot)?,
    }

    Ok(())
}
