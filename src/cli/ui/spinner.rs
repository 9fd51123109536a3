use std::future::Future;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::terminal::TerminalClient;

/// Indefinite progress indicator for scans, connects and diagnoses.
#[derive(Debug)]
pub(crate) struct Spinner {
    enabled: bool,
}

impl Spinner {
    /// Draws only when stderr is an interactive terminal.
    pub(crate) fn for_terminal(terminal_client: &dyn TerminalClient) -> Self {
        Self {
            enabled: terminal_client.stderr_is_terminal(),
        }
    }

    pub(crate) async fn with_spinner<F, Fut, T>(&self, message: &str, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.enabled {
            return operation().await;
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(90));
        let result = operation().await;
        spinner.finish_and_clear();
        result
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan.bold} {msg}")
        .unwrap_or_else(|_error| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    struct Terminal(bool);

    impl TerminalClient for Terminal {
        fn stdout_is_terminal(&self) -> bool {
            self.0
        }

        fn stderr_is_terminal(&self) -> bool {
            self.0
        }
    }

    #[rstest]
    #[case::piped(false)]
    #[case::interactive(true)]
    #[tokio::test]
    async fn with_spinner_returns_operation_result(#[case] interactive: bool) {
        let spinner = Spinner::for_terminal(&Terminal(interactive));
        let result = spinner
            .with_spinner("Scanning for devices", || async { 3 })
            .await;
        assert_eq!(3, result);
    }
}
