use async_trait::async_trait;
use tracing::{debug, instrument};

use super::model::{
    DetectedIssue, DiagnosisOrigin, DiagnosisResult, RiskLevel, Severity, SuggestedFix,
};
use super::orchestrator::DiagnosisService;
use crate::error::RemoteError;
use crate::hw::Device;

const WEAK_SIGNAL_DBM: i16 = -60;
const AUDIO_DEGRADED_SIGNAL_DBM: i16 = -50;
const LOW_BATTERY_PERCENT: u8 = 20;
const MAX_SUGGESTED_FIXES: usize = 5;
const FIX_SUCCESS_RATE: f64 = 0.85;
const FIX_ESTIMATED_TIME: &str = "2-5 minutes";
const DIAGNOSIS_ESTIMATED_TIME: &str = "5-10 minutes";

/// Issue families known to the rule engine, each with its fix playbook.
#[derive(Debug, Clone, Copy, Eq, PartialEq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
enum IssueCategory {
    ConnectionIssues,
    AudioIssues,
    BatteryIssues,
}

impl IssueCategory {
    fn strategies(self) -> &'static [&'static str] {
        match self {
            Self::ConnectionIssues => &[
                "reset_bluetooth_stack",
                "reconnect_device",
                "update_drivers",
                "power_cycle_device",
                "check_interference",
            ],
            Self::AudioIssues => &[
                "check_audio_settings",
                "verify_codec_support",
                "reset_audio_stack",
                "update_audio_drivers",
                "adjust_audio_quality",
            ],
            Self::BatteryIssues => &[
                "calibrate_battery",
                "check_charging",
                "update_power_settings",
                "replace_battery",
            ],
        }
    }
}

/// Offline diagnosis from the device snapshot alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRuleEngine;

impl LocalRuleEngine {
    /// Evaluates the signal, audio and battery rules against a device.
    #[must_use]
    #[instrument(skip(self, device), level = "debug", fields(device = device.identity()))]
    pub fn evaluate(&self, device: &Device) -> DiagnosisResult {
        let mut issues: Vec<(IssueCategory, DetectedIssue)> = Vec::new();
        let signal = device.signal_strength_dbm();

        if signal < WEAK_SIGNAL_DBM {
            issues.push(issue(
                IssueCategory::ConnectionIssues,
                "Weak Bluetooth signal detected",
                0.85,
                Severity::High,
            ));
        }
        if device.device_type().is_audio() && signal < AUDIO_DEGRADED_SIGNAL_DBM {
            issues.push(issue(
                IssueCategory::AudioIssues,
                "Potential audio quality issues due to weak connection",
                0.75,
                Severity::Medium,
            ));
        }
        if device
            .battery_level_percent()
            .is_some_and(|level| level < LOW_BATTERY_PERCENT)
        {
            issues.push(issue(
                IssueCategory::BatteryIssues,
                "Low battery level may cause connectivity issues",
                0.80,
                Severity::Medium,
            ));
        }

        let fixes = issues
            .iter()
            .flat_map(|(category, _)| category.strategies())
            .take(MAX_SUGGESTED_FIXES)
            .map(|action| {
                SuggestedFix::new(fix_description(action), FIX_SUCCESS_RATE)
                    .with_action(*action)
                    .with_estimated_time(FIX_ESTIMATED_TIME)
            })
            .collect();
        let issues: Vec<DetectedIssue> = issues.into_iter().map(|(_, issue)| issue).collect();
        debug!(issues = issues.len(), "rules evaluated");

        DiagnosisResult::new(
            confidence(&issues),
            risk_level(&issues),
            DIAGNOSIS_ESTIMATED_TIME,
            issues,
            fixes,
            DiagnosisOrigin::LocalRules,
        )
    }
}

#[async_trait]
impl DiagnosisService for LocalRuleEngine {
    async fn diagnose(&self, device: &Device) -> Result<DiagnosisResult, RemoteError> {
        Ok(self.evaluate(device))
    }
}

fn issue(
    category: IssueCategory,
    description: &str,
    confidence: f64,
    severity: Severity,
) -> (IssueCategory, DetectedIssue) {
    (
        category,
        DetectedIssue::new(description, confidence, severity, Some(category.to_string())),
    )
}

fn fix_description(action: &str) -> String {
    match action {
        "reset_bluetooth_stack" => "Reset Bluetooth stack and services".to_string(),
        "reconnect_device" => "Reconnect the Bluetooth device".to_string(),
        "update_drivers" => "Update Bluetooth drivers to latest version".to_string(),
        "check_audio_settings" => "Check and optimize audio settings".to_string(),
        "calibrate_battery" => "Calibrate battery for accurate readings".to_string(),
        other => format!("Apply {other} fix"),
    }
}

/// Mean issue confidence, capped at 1.0.
fn confidence(issues: &[DetectedIssue]) -> f64 {
    if issues.is_empty() {
        return 0.0;
    }
    let total: f64 = issues.iter().map(DetectedIssue::confidence).sum();
    (total / issues.len() as f64).min(1.0)
}

fn risk_level(issues: &[DetectedIssue]) -> RiskLevel {
    issues
        .iter()
        .map(|issue| RiskLevel::from(issue.severity()))
        .max()
        .unwrap_or(RiskLevel::None)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::hw::DeviceType;

    fn device(device_type: DeviceType, signal: i16, battery: Option<u8>) -> Device {
        Device::simulated("Test Device", "00:11", signal, device_type, false, battery)
    }

    fn descriptions(result: &DiagnosisResult) -> Vec<&str> {
        result
            .detected_issues()
            .iter()
            .map(DetectedIssue::description)
            .collect()
    }

    #[test]
    fn healthy_device_has_no_issues() {
        let result = LocalRuleEngine.evaluate(&device(DeviceType::Keyboard, -35, Some(90)));

        assert!(result.detected_issues().is_empty());
        assert!(result.suggested_fixes().is_empty());
        assert_eq!(RiskLevel::None, result.risk_level());
        assert_eq!(0.0, result.confidence_score());
        assert_eq!(DiagnosisOrigin::LocalRules, result.origin());
        assert_eq!(false, result.is_fallback());
    }

    #[test]
    fn weak_audio_device_reports_connection_and_audio_issues() {
        let result = LocalRuleEngine.evaluate(&device(DeviceType::Headphones, -70, Some(85)));

        assert_eq!(
            vec![
                "Weak Bluetooth signal detected",
                "Potential audio quality issues due to weak connection"
            ],
            descriptions(&result)
        );
        assert_eq!(RiskLevel::High, result.risk_level());
        assert!((result.confidence_score() - 0.8).abs() < 1e-9);
        assert_eq!(5, result.suggested_fixes().len());
        assert_eq!(
            "Reset Bluetooth stack and services",
            result.suggested_fixes()[0].description()
        );
    }

    #[rstest]
    #[case::audio_only(DeviceType::Earbuds, -55, Some(65), RiskLevel::Medium, 1)]
    #[case::battery_only(DeviceType::Keyboard, -35, Some(10), RiskLevel::Medium, 1)]
    #[case::non_audio_moderate_signal(DeviceType::Keyboard, -55, None, RiskLevel::None, 0)]
    fn rules_fire_independently(
        #[case] device_type: DeviceType,
        #[case] signal: i16,
        #[case] battery: Option<u8>,
        #[case] expected_risk: RiskLevel,
        #[case] expected_issues: usize,
    ) {
        let result = LocalRuleEngine.evaluate(&device(device_type, signal, battery));

        assert_eq!(expected_risk, result.risk_level());
        assert_eq!(expected_issues, result.detected_issues().len());
    }

    #[test]
    fn unknown_actions_get_generic_descriptions() {
        assert_eq!("Apply check_charging fix", fix_description("check_charging"));
    }
}
