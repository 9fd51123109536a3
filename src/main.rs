use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;

use btfix::{Args, OutputFormat, fake_hardware, no_hardware, real_hardware, run_with_log_level};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let mut stdout = std::io::stdout();

    let run_result = async {
        let log_level = args.log_level();
        let output_format = args.output_format().unwrap_or(if stdout.is_terminal() {
            OutputFormat::Pretty
        } else {
            OutputFormat::Json
        });
        let overrides = args.settings_overrides();
        let hardware_disabled = args.no_hardware();
        let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
        let hardware = match maybe_fake_args {
            Some(fake_args) => fake_hardware(fake_args),
            None if hardware_disabled => no_hardware(),
            None => real_hardware(),
        };

        run_with_log_level(
            command,
            &mut stdout,
            hardware,
            overrides,
            log_level,
            output_format,
        )
        .await
    }
    .await;

    match run_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
