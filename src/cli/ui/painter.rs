use owo_colors::{OwoColorize, Style as OwoStyle};

use crate::diagnosis::RiskLevel;
use crate::notification::NotificationKind;

/// Applies colour and style to terminal text.
#[derive(Debug)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn heading<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().cyan())
    }

    pub(crate) fn success<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().green())
    }

    pub(crate) fn warning<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().yellow())
    }

    pub(crate) fn error<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().red())
    }

    pub(crate) fn muted<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().dimmed())
    }

    pub(crate) fn value<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold())
    }

    /// Green for no or low risk, yellow for medium, red for high.
    pub(crate) fn risk(&self, level: RiskLevel) -> String {
        let text = level.to_string();
        match level {
            RiskLevel::None | RiskLevel::Low => self.success(text),
            RiskLevel::Medium => self.warning(text),
            RiskLevel::High => self.error(text),
        }
    }

    pub(crate) fn notification<T: AsRef<str>>(&self, kind: NotificationKind, text: T) -> String {
        match kind {
            NotificationKind::Info => self.value(text),
            NotificationKind::Success => self.success(text),
            NotificationKind::Warning => self.warning(text),
            NotificationKind::Error => self.error(text),
        }
    }

    fn paint(&self, text: &str, style: OwoStyle) -> String {
        if self.use_colour {
            format!("{}", text.style(style))
        } else {
            text.to_string()
        }
    }
}
