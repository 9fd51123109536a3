use std::error::Error as _;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use super::model::DiagnosisResult;
use crate::error::RemoteError;
use crate::hw::Device;

/// Upper bound on one diagnosis round trip.
pub const DEFAULT_DIAGNOSIS_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can turn a device snapshot into a diagnosis.
#[async_trait]
pub trait DiagnosisService: Send + Sync + Debug {
    async fn diagnose(&self, device: &Device) -> Result<DiagnosisResult, RemoteError>;
}

/// Runs a diagnosis against a service and never lets it fail outward.
///
/// Transport errors, bad statuses, undecodable or invalid payloads and
/// timeouts all resolve to [`DiagnosisResult::fallback`].
#[derive(Debug, Clone)]
pub struct DiagnosticsOrchestrator {
    service: Arc<dyn DiagnosisService>,
    timeout: Duration,
}

impl DiagnosticsOrchestrator {
    #[must_use]
    pub fn new(service: Arc<dyn DiagnosisService>) -> Self {
        Self {
            service,
            timeout: DEFAULT_DIAGNOSIS_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves within the configured timeout, always with a well-formed result.
    #[instrument(
        skip(self, device),
        level = "info",
        fields(device = device.identity(), timeout_ms = self.timeout.as_millis())
    )]
    pub async fn diagnose(&self, device: &Device) -> DiagnosisResult {
        let outcome = match timeout(self.timeout, self.service.diagnose(device)).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(RemoteError::TimedOut {
                timeout_ms: self.timeout.as_millis(),
            }),
        };

        match outcome {
            Ok(result) => {
                info!(
                    origin = %result.origin(),
                    risk = %result.risk_level(),
                    issues = result.detected_issues().len(),
                    "diagnosis received"
                );
                result
            }
            Err(error) => {
                warn!(
                    %error,
                    source = ?error.source(),
                    "diagnosis unavailable, using demo result"
                );
                DiagnosisResult::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::diagnosis::{DiagnosisOrigin, LocalRuleEngine, RiskLevel};
    use crate::error::SchemaError;
    use crate::hw::DeviceType;

    #[derive(Debug)]
    struct NeverAnswers;

    #[async_trait]
    impl DiagnosisService for NeverAnswers {
        async fn diagnose(&self, _device: &Device) -> Result<DiagnosisResult, RemoteError> {
            std::future::pending().await
        }
    }

    #[derive(Debug)]
    struct Invalid;

    #[async_trait]
    impl DiagnosisService for Invalid {
        async fn diagnose(&self, _device: &Device) -> Result<DiagnosisResult, RemoteError> {
            Err(SchemaError::MissingField {
                field: "confidence_score",
            }
            .into())
        }
    }

    fn device() -> Device {
        Device::simulated(
            "Sony WH-1000XM4",
            "04:5F:01:02:03",
            -45,
            DeviceType::Headphones,
            false,
            Some(85),
        )
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn hung_service_falls_back_at_the_timeout() {
        let orchestrator = DiagnosticsOrchestrator::new(Arc::new(NeverAnswers))
            .with_timeout(Duration::from_secs(10));
        let started = tokio::time::Instant::now();

        let result = orchestrator.diagnose(&device()).await;

        assert_eq!(true, result.is_fallback());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(11));
    }

    #[tokio::test]
    async fn invalid_payload_falls_back() {
        let orchestrator = DiagnosticsOrchestrator::new(Arc::new(Invalid));

        let result = orchestrator.diagnose(&device()).await;

        assert_eq!(DiagnosisResult::fallback(), result);
        assert_eq!(RiskLevel::Low, result.risk_level());
    }

    #[tokio::test]
    async fn successful_service_result_is_passed_through() {
        let orchestrator = DiagnosticsOrchestrator::new(Arc::new(LocalRuleEngine));

        let result = orchestrator.diagnose(&device()).await;

        assert_eq!(false, result.is_fallback());
        assert_eq!(DiagnosisOrigin::LocalRules, result.origin());
    }
}
