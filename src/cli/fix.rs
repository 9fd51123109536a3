use std::io;

use anyhow::Result;
use tracing::instrument;

use super::context::CommandContext;
use super::ui::{DeviceView, DiagnosisView};
use super::{DeviceArgs, OutputFormat};

/// Executes the `fix` command: diagnose, then apply the suggested fix.
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
    let session = context.session();
    let spinner = context.spinner();

    let outcome = async {
        let diagnosis = spinner
            .with_spinner("Running diagnosis", || session.diagnose())
            .await?;
        let fixed = spinner
            .with_spinner("Applying fix", || session.apply_fix())
            .await?;
        anyhow::Ok((diagnosis, fixed))
    }
    .await;
    let snapshot = session.snapshot();
    session.disconnect().await;
    let (diagnosis, fixed) = outcome?;

    match context.output_format() {
        OutputFormat::Pretty => {
            let painter = context.painter();
            writeln!(
                out,
                "{}",
                DiagnosisView::new(&diagnosis, &painter, context.labels())
            )?;
            writeln!(out, "{}", painter.success("Device after fix"))?;
            writeln!(out, "{}", DeviceView::new(&fixed, &painter))?;
            context.write_notifications(out)?;
        }
        OutputFormat::Json => context.write_json(out, snapshot)?,
    }

    Ok(())
}
