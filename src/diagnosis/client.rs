use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::model::{DiagnosisOrigin, DiagnosisResult, WireDiagnosis};
use super::orchestrator::DiagnosisService;
use crate::error::{RemoteError, SchemaError};
use crate::hw::{Device, DeviceOrigin};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Readiness reported by `GET /api/status`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub ai_system: bool,
    pub language_system: bool,
    /// Language code to display name.
    #[serde(default)]
    pub available_languages: BTreeMap<String, String>,
    #[serde(default)]
    pub current_language: Option<String>,
}

/// UI strings for one language, from `GET /api/translations/{lang}`.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct TranslationTable {
    language: String,
    entries: BTreeMap<String, String>,
    is_rtl: bool,
}

impl TranslationTable {
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn is_rtl(&self) -> bool {
        self.is_rtl
    }

    /// Looks up `key`, falling back to `default` and then to the key itself.
    #[must_use]
    pub fn text<'a>(&'a self, key: &'a str, default: Option<&'a str>) -> &'a str {
        self.entries
            .get(key)
            .map(String::as_str)
            .or(default)
            .unwrap_or(key)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

impl<T> Envelope<T> {
    fn into_body(self) -> Result<T, RemoteError> {
        if self.success {
            Ok(self.body)
        } else {
            Err(RemoteError::Rejected {
                message: self
                    .error
                    .unwrap_or_else(|| "no reason given".to_string()),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct DevicesBody {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct DiagnosisBody {
    #[serde(default)]
    diagnosis: Option<WireDiagnosis>,
}

#[derive(Debug, Deserialize)]
struct TranslationsBody {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    translations: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    is_rtl: bool,
}

#[derive(Debug, Serialize)]
struct DiagnoseRequest<'a> {
    device: &'a Device,
}

/// HTTP client for the remote analysis service.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
    base_url: String,
}

impl ServiceClient {
    /// Creates a client with the default per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] when `base_url` is not an
    /// `http://` or `https://` URL.
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] for a malformed base URL, or
    /// [`RemoteError::Request`] when the HTTP client cannot be built.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(RemoteError::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {base_url}"
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// # Errors
    ///
    /// Returns an error when the service is unreachable or answers badly.
    #[instrument(skip(self), level = "debug", fields(base_url = %self.base_url))]
    pub async fn status(&self) -> Result<ServiceStatus, RemoteError> {
        self.get(&format!("{}/api/status", self.base_url)).await
    }

    /// # Errors
    ///
    /// Returns an error when the service is unreachable, answers badly or
    /// does not know the language.
    #[instrument(skip(self), level = "debug", fields(base_url = %self.base_url))]
    pub async fn translations(&self, language: &str) -> Result<TranslationTable, RemoteError> {
        let url = format!("{}/api/translations/{language}", self.base_url);
        let body = self
            .get::<Envelope<TranslationsBody>>(&url)
            .await?
            .into_body()?;

        let entries = body
            .translations
            .into_iter()
            .filter_map(|(key, value)| match value {
                serde_json::Value::String(text) => Some((key, text)),
                _ => None,
            })
            .collect();
        Ok(TranslationTable {
            language: body.language.unwrap_or_else(|| language.to_string()),
            entries,
            is_rtl: body.is_rtl,
        })
    }

    /// Lists devices known to the service, tagged as remote.
    ///
    /// # Errors
    ///
    /// Returns an error when the service is unreachable, answers badly or
    /// reports `success: false`.
    #[instrument(skip(self), level = "debug", fields(base_url = %self.base_url))]
    pub async fn devices(&self) -> Result<Vec<Device>, RemoteError> {
        let url = format!("{}/api/devices", self.base_url);
        let body = self.get::<Envelope<DevicesBody>>(&url).await?.into_body()?;
        debug!(count = body.devices.len(), "remote devices listed");

        Ok(body
            .devices
            .into_iter()
            .map(|device| device.with_origin(DeviceOrigin::Remote))
            .collect())
    }

    /// Requests a diagnosis and validates its shape.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures, non-success statuses,
    /// undecodable bodies and schema violations.
    #[instrument(skip(self, device), level = "debug", fields(device = device.identity()))]
    pub async fn diagnose(&self, device: &Device) -> Result<DiagnosisResult, RemoteError> {
        let url = format!("{}/api/diagnose", self.base_url);
        let body = self
            .post_json::<Envelope<DiagnosisBody>, _>(&url, &DiagnoseRequest { device })
            .await?
            .into_body()?;

        let diagnosis = body.diagnosis.ok_or(SchemaError::MissingField {
            field: "diagnosis",
        })?;
        Ok(diagnosis.validate(DiagnosisOrigin::Remote)?)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, RemoteError> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| RemoteError::NotReachable {
                    url: url.to_string(),
                    source,
                })?;

        handle_response(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        let response = self.client.post(url).json(body).send().await.map_err(|source| {
            RemoteError::NotReachable {
                url: url.to_string(),
                source,
            }
        })?;

        handle_response(response).await
    }
}

#[async_trait]
impl DiagnosisService for ServiceClient {
    async fn diagnose(&self, device: &Device) -> Result<DiagnosisResult, RemoteError> {
        ServiceClient::diagnose(self, device).await
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|value| value.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| status.to_string());
        return Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_slice(&bytes).map_err(RemoteError::Decode)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn client_normalises_trailing_slash() -> anyhow::Result<()> {
        let client = ServiceClient::new("http://127.0.0.1:5000/")?;
        assert_eq!("http://127.0.0.1:5000", client.base_url());
        Ok(())
    }

    #[test]
    fn client_rejects_non_http_urls() {
        let result = ServiceClient::new("127.0.0.1:5000");
        assert_matches!(result, Err(RemoteError::InvalidUrl(_)));
    }

    #[test]
    fn translation_lookup_falls_back_to_default_then_key() {
        let table = TranslationTable {
            language: "es".to_string(),
            entries: BTreeMap::from([("scan".to_string(), "Escanear".to_string())]),
            is_rtl: false,
        };

        assert_eq!("Escanear", table.text("scan", Some("Scan")));
        assert_eq!("Fix", table.text("fix", Some("Fix")));
        assert_eq!("diagnose", table.text("diagnose", None));
    }

    #[test]
    fn failed_envelope_becomes_rejection() -> anyhow::Result<()> {
        let envelope: Envelope<DevicesBody> =
            serde_json::from_str(r#"{"success": false, "error": "AI system not ready"}"#)?;

        let result = envelope.into_body();

        assert_matches!(result, Err(RemoteError::Rejected { message }) if message == "AI system not ready");
        Ok(())
    }
}
