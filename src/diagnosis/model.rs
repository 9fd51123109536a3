use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Overall risk reported by a diagnosis.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RiskLevel {
    /// No issue was detected.
    None,
    Low,
    Medium,
    High,
}

/// Severity of a single detected issue.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl From<Severity> for RiskLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => Self::Low,
            Severity::Medium => Self::Medium,
            Severity::High => Self::High,
        }
    }
}

/// Who produced a diagnosis.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiagnosisOrigin {
    /// The remote analysis service.
    Remote,
    /// The offline rule engine.
    LocalRules,
    /// The fixed demo result used when analysis could not complete.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedIssue {
    description: String,
    confidence: f64,
    severity: Severity,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

impl DetectedIssue {
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        confidence: f64,
        severity: Severity,
        category: Option<String>,
    ) -> Self {
        Self {
            description: description.into(),
            confidence,
            severity,
            category,
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Issue family such as `connection_issues`, when reported.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestedFix {
    description: String,
    success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    estimated_time: Option<String>,
}

impl SuggestedFix {
    #[must_use]
    pub fn new(description: impl Into<String>, success_rate: f64) -> Self {
        Self {
            description: description.into(),
            success_rate,
            action: None,
            estimated_time: None,
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    #[must_use]
    pub fn with_estimated_time(mut self, estimated_time: impl Into<String>) -> Self {
        self.estimated_time = Some(estimated_time.into());
        self
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    #[must_use]
    pub fn estimated_time(&self) -> Option<&str> {
        self.estimated_time.as_deref()
    }
}

/// A validated diagnosis, tagged with who produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisResult {
    confidence_score: f64,
    risk_level: RiskLevel,
    estimated_time: String,
    detected_issues: Vec<DetectedIssue>,
    suggested_fixes: Vec<SuggestedFix>,
    is_fallback: bool,
    origin: DiagnosisOrigin,
}

impl DiagnosisResult {
    pub(crate) fn new(
        confidence_score: f64,
        risk_level: RiskLevel,
        estimated_time: impl Into<String>,
        detected_issues: Vec<DetectedIssue>,
        suggested_fixes: Vec<SuggestedFix>,
        origin: DiagnosisOrigin,
    ) -> Self {
        Self {
            confidence_score,
            risk_level,
            estimated_time: estimated_time.into(),
            detected_issues,
            suggested_fixes,
            is_fallback: origin == DiagnosisOrigin::Fallback,
            origin,
        }
    }

    /// The constant demo diagnosis shown when analysis cannot complete.
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(
            0.855,
            RiskLevel::Low,
            "5-10 minutes",
            vec![DetectedIssue::new(
                "Weak Bluetooth signal detected",
                0.85,
                Severity::High,
                Some("connection_issues".to_string()),
            )],
            vec![
                SuggestedFix::new("Reset Bluetooth stack and services", 0.85)
                    .with_action("reset_bluetooth_stack"),
                SuggestedFix::new("Reconnect the Bluetooth device", 0.90)
                    .with_action("reconnect_device"),
            ],
            DiagnosisOrigin::Fallback,
        )
    }

    #[must_use]
    pub fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    #[must_use]
    pub fn estimated_time(&self) -> &str {
        &self.estimated_time
    }

    #[must_use]
    pub fn detected_issues(&self) -> &[DetectedIssue] {
        &self.detected_issues
    }

    #[must_use]
    pub fn suggested_fixes(&self) -> &[SuggestedFix] {
        &self.suggested_fixes
    }

    #[must_use]
    pub fn origin(&self) -> DiagnosisOrigin {
        self.origin
    }

    /// True exactly when the remote call failed or timed out.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }
}

/// Unvalidated diagnosis as received from the analysis service.
///
/// Every field is optional so that shape errors surface as
/// [`SchemaError`]s rather than opaque decode failures.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireDiagnosis {
    confidence_score: Option<f64>,
    risk_level: Option<String>,
    estimated_time: Option<String>,
    detected_issues: Option<Vec<WireIssue>>,
    suggested_fixes: Option<Vec<WireFix>>,
}

#[derive(Debug, Default, Deserialize)]
struct WireIssue {
    description: Option<String>,
    confidence: Option<f64>,
    severity: Option<String>,
    #[serde(rename = "type")]
    category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireFix {
    description: Option<String>,
    success_rate: Option<f64>,
    action: Option<String>,
    estimated_time: Option<String>,
}

impl WireDiagnosis {
    /// Validates the payload and tags it with `origin`.
    pub(crate) fn validate(self, origin: DiagnosisOrigin) -> Result<DiagnosisResult, SchemaError> {
        let confidence_score = unit_interval(
            "confidence_score",
            self.confidence_score.ok_or(SchemaError::MissingField {
                field: "confidence_score",
            })?,
        )?;
        let risk_level = self
            .risk_level
            .ok_or(SchemaError::MissingField {
                field: "risk_level",
            })
            .and_then(|value| parse_variant::<RiskLevel>("risk_level", value))?;
        let estimated_time = non_empty(
            "estimated_time",
            self.estimated_time.ok_or(SchemaError::MissingField {
                field: "estimated_time",
            })?,
        )?;

        let detected_issues = self
            .detected_issues
            .ok_or(SchemaError::MissingField {
                field: "detected_issues",
            })?
            .into_iter()
            .enumerate()
            .map(|(index, issue)| issue.validate(index))
            .collect::<Result<Vec<_>, _>>()?;
        let suggested_fixes = self
            .suggested_fixes
            .ok_or(SchemaError::MissingField {
                field: "suggested_fixes",
            })?
            .into_iter()
            .enumerate()
            .map(|(index, fix)| fix.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DiagnosisResult::new(
            confidence_score,
            risk_level,
            estimated_time,
            detected_issues,
            suggested_fixes,
            origin,
        ))
    }
}

impl WireIssue {
    fn validate(self, index: usize) -> Result<DetectedIssue, SchemaError> {
        let field = |name: &str| format!("detected_issues[{index}].{name}");
        let description = non_empty_at(field("description"), self.description)?;
        let confidence = match self.confidence {
            Some(value) => unit_interval(&field("confidence"), value)?,
            None => {
                return Err(SchemaError::MissingField {
                    field: "detected_issues.confidence",
                });
            }
        };
        let severity = match self.severity {
            Some(value) => parse_variant::<Severity>(&field("severity"), value)?,
            None => {
                return Err(SchemaError::MissingField {
                    field: "detected_issues.severity",
                });
            }
        };
        Ok(DetectedIssue::new(
            description,
            confidence,
            severity,
            self.category,
        ))
    }
}

impl WireFix {
    fn validate(self, index: usize) -> Result<SuggestedFix, SchemaError> {
        let field = |name: &str| format!("suggested_fixes[{index}].{name}");
        let description = non_empty_at(field("description"), self.description)?;
        let success_rate = match self.success_rate {
            Some(value) => unit_interval(&field("success_rate"), value)?,
            None => {
                return Err(SchemaError::MissingField {
                    field: "suggested_fixes.success_rate",
                });
            }
        };
        Ok(SuggestedFix {
            description,
            success_rate,
            action: self.action,
            estimated_time: self.estimated_time,
        })
    }
}

fn unit_interval(field: &str, value: f64) -> Result<f64, SchemaError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SchemaError::OutOfUnitRange {
            field: field.to_string(),
            value,
        })
    }
}

fn non_empty(field: &str, value: String) -> Result<String, SchemaError> {
    if value.trim().is_empty() {
        return Err(SchemaError::Empty {
            field: field.to_string(),
        });
    }
    Ok(value)
}

fn non_empty_at(field: String, value: Option<String>) -> Result<String, SchemaError> {
    match value {
        Some(value) => non_empty(&field, value),
        None => Err(SchemaError::Empty { field }),
    }
}

fn parse_variant<T>(field: &str, value: String) -> Result<T, SchemaError>
where
    T: std::str::FromStr,
{
    value.parse().map_err(|_| SchemaError::UnknownVariant {
        field: field.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn wire(value: serde_json::Value) -> WireDiagnosis {
        serde_json::from_value(value).expect("test payload should deserialize")
    }

    fn valid_payload() -> serde_json::Value {
        json!({
            "confidence_score": 0.8,
            "risk_level": "medium",
            "estimated_time": "5-10 minutes",
            "detected_issues": [{
                "type": "battery_issues",
                "description": "Low battery level may cause connectivity issues",
                "confidence": 0.8,
                "severity": "medium"
            }],
            "suggested_fixes": [{
                "action": "calibrate_battery",
                "description": "Calibrate battery for accurate readings",
                "success_rate": 0.85,
                "estimated_time": "2-5 minutes",
                "complexity": "low"
            }],
            "is_fallback": true
        })
    }

    #[test]
    fn valid_payload_is_accepted_and_tagged_by_caller() -> anyhow::Result<()> {
        let result = wire(valid_payload()).validate(DiagnosisOrigin::Remote)?;

        assert_eq!(false, result.is_fallback());
        assert_eq!(DiagnosisOrigin::Remote, result.origin());
        assert_eq!(RiskLevel::Medium, result.risk_level());
        assert_eq!(Some("battery_issues"), result.detected_issues()[0].category());
        assert_eq!(
            Some("calibrate_battery"),
            result.suggested_fixes()[0].action()
        );
        Ok(())
    }

    #[test]
    fn risk_level_none_is_accepted() -> anyhow::Result<()> {
        let result = wire(json!({
            "confidence_score": 0.0,
            "risk_level": "none",
            "estimated_time": "5-10 minutes",
            "detected_issues": [],
            "suggested_fixes": []
        }))
        .validate(DiagnosisOrigin::Remote)?;

        assert_eq!(RiskLevel::None, result.risk_level());
        Ok(())
    }

    #[rstest]
    #[case::missing_confidence("confidence_score", json!(null))]
    #[case::missing_issues("detected_issues", json!(null))]
    #[case::missing_fixes("suggested_fixes", json!(null))]
    fn missing_required_fields_are_rejected(
        #[case] field: &str,
        #[case] replacement: serde_json::Value,
    ) {
        let mut payload = valid_payload();
        payload[field] = replacement;

        let result = wire(payload).validate(DiagnosisOrigin::Remote);

        assert_matches!(result, Err(SchemaError::MissingField { field: missing }) if missing == field);
    }

    #[rstest]
    #[case::score_above_one("/confidence_score", json!(1.5))]
    #[case::negative_issue_confidence("/detected_issues/0/confidence", json!(-0.1))]
    #[case::success_rate_above_one("/suggested_fixes/0/success_rate", json!(90))]
    fn values_outside_unit_interval_are_rejected(
        #[case] pointer: &str,
        #[case] replacement: serde_json::Value,
    ) {
        let mut payload = valid_payload();
        if let Some(slot) = payload.pointer_mut(pointer) {
            *slot = replacement;
        }

        let result = wire(payload).validate(DiagnosisOrigin::Remote);

        assert_matches!(result, Err(SchemaError::OutOfUnitRange { .. }));
    }

    #[test]
    fn unknown_severity_is_rejected() {
        let mut payload = valid_payload();
        payload["detected_issues"][0]["severity"] = json!("catastrophic");

        let result = wire(payload).validate(DiagnosisOrigin::Remote);

        assert_eq!(
            Err(SchemaError::UnknownVariant {
                field: "detected_issues[0].severity".to_string(),
                value: "catastrophic".to_string(),
            }),
            result.map(|_| ())
        );
    }

    #[test]
    fn fallback_matches_the_demo_report() {
        let fallback = DiagnosisResult::fallback();

        assert_eq!(true, fallback.is_fallback());
        assert_eq!(RiskLevel::Low, fallback.risk_level());
        assert_eq!(0.855, fallback.confidence_score());
        assert_eq!("5-10 minutes", fallback.estimated_time());
        assert_eq!(
            vec!["Reset Bluetooth stack and services", "Reconnect the Bluetooth device"],
            fallback
                .suggested_fixes()
                .iter()
                .map(SuggestedFix::description)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn risk_levels_order_by_severity() {
        assert!(RiskLevel::None < RiskLevel::Low);
        assert!(RiskLevel::from(Severity::High) > RiskLevel::Medium);
    }
}
