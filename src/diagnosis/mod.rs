mod client;
mod model;
mod orchestrator;
mod rules;

pub use self::client::{ServiceClient, ServiceStatus, TranslationTable};
pub use self::model::{
    DetectedIssue, DiagnosisOrigin, DiagnosisResult, RiskLevel, Severity, SuggestedFix,
};
pub use self::orchestrator::{DEFAULT_DIAGNOSIS_TIMEOUT, DiagnosisService, DiagnosticsOrchestrator};
pub use self::rules::LocalRuleEngine;
