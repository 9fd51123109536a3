use std::fmt::{self, Display, Formatter};

use crate::diagnosis::{DiagnosisResult, TranslationTable};
use crate::utils::format_ratio;

use super::painter::Painter;
use super::table::Table;

/// Renders a diagnosis report: summary, detected issues, suggested fixes.
///
/// Demo results are marked so they are never mistaken for a real analysis.
pub(crate) struct DiagnosisView<'a> {
    diagnosis: &'a DiagnosisResult,
    painter: &'a Painter,
    labels: &'a TranslationTable,
}

impl<'a> DiagnosisView<'a> {
    pub(crate) fn new(
        diagnosis: &'a DiagnosisResult,
        painter: &'a Painter,
        labels: &'a TranslationTable,
    ) -> Self {
        Self {
            diagnosis,
            painter,
            labels,
        }
    }
}

impl Display for DiagnosisView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let diagnosis = self.diagnosis;
        let heading = self.labels.text("run_ai_diagnosis", Some("Diagnosis"));
        write!(f, "{}", self.painter.heading(heading))?;
        if diagnosis.is_fallback() {
            write!(f, " {}", self.painter.warning("(demo results)"))?;
        }
        writeln!(f)?;

        let summary = Table::key_value(
            self.painter,
            vec![
                (
                    "confidence",
                    self.painter.value(format_ratio(diagnosis.confidence_score())),
                ),
                ("risk", self.painter.risk(diagnosis.risk_level())),
                ("estimated_time", self.painter.value(diagnosis.estimated_time())),
                ("origin", self.painter.muted(diagnosis.origin().to_string())),
            ],
        );
        writeln!(f, "{summary}")?;

        if diagnosis.detected_issues().is_empty() {
            write!(f, "{}", self.painter.success("No issues detected"))?;
        } else {
            let issues = diagnosis
                .detected_issues()
                .iter()
                .map(|issue| {
                    vec![
                        issue.severity().to_string(),
                        issue.category().unwrap_or("-").to_string(),
                        issue.description().to_string(),
                        format_ratio(issue.confidence()),
                    ]
                })
                .collect();
            write!(
                f,
                "{}",
                Table::grid(["severity", "type", "issue", "confidence"], issues)
            )?;
        }

        if !diagnosis.suggested_fixes().is_empty() {
            let heading = self.labels.text("auto_fix", Some("Suggested fixes"));
            let fixes = diagnosis
                .suggested_fixes()
                .iter()
                .map(|fix| {
                    vec![
                        fix.description().to_string(),
                        format_ratio(fix.success_rate()),
                        fix.estimated_time().unwrap_or("-").to_string(),
                    ]
                })
                .collect();
            write!(
                f,
                "\n{}\n{}",
                self.painter.heading(heading),
                Table::grid(["fix", "success_rate", "time"], fixes)
            )?;
        }
        Ok(())
    }
}
