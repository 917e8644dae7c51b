//! Eligibility API client.
//!
//! Sends patient checks as `GET {base_url}/{identifier}` over mutual TLS.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use esp_fixtures::mask_default;
use reqwest::{Certificate, Client, Identity};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::HarnessConfig;
use crate::error::{E2eError, E2eResult};

/// Client certificate file name inside the cert directory.
pub const CLIENT_CERT_FILE: &str = "api_client_cert.pem";
/// Client private key file name.
pub const PRIVATE_KEY_FILE: &str = "api_private_key_cert.pem";
/// CA bundle used when verifying the server strictly.
pub const CA_CERT_FILE: &str = "api_ca_cert.pem";

/// Per-request behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Verify the server against the bundled CA.
    pub strict_ssl: bool,
    /// Turn non-2xx statuses into [`E2eError::Status`].
    pub raise_on_error: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            strict_ssl: false,
            raise_on_error: true,
        }
    }
}

impl RequestOptions {
    /// Return every response, whatever its status.
    #[must_use]
    pub const fn lenient() -> Self {
        Self {
            strict_ssl: false,
            raise_on_error: false,
        }
    }
}

/// Parsed response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// JSON body with the default volatile keys masked.
    Json(Value),
    /// Anything that did not parse as JSON.
    Text(String),
}

impl ResponseBody {
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// Status, headers and body of one API call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status_code: u16,
    /// Header names are lower-case.
    pub headers: BTreeMap<String, String>,
    pub body: ResponseBody,
    /// True for 2xx statuses.
    pub ok: bool,
}

/// Eligibility API client.
#[derive(Debug, Clone)]
pub struct EligibilityApiClient {
    base_url: String,
    lenient: Client,
    strict: Option<Client>,
    ca_path: PathBuf,
}

impl EligibilityApiClient {
    /// Build an mTLS client from the certificates in `config.cert_dir`.
    pub fn new(config: &HarnessConfig) -> E2eResult<Self> {
        let cert_dir = &config.cert_dir;
        let identity_pem = read_identity_pem(cert_dir)?;
        let ca_path = cert_dir.join(CA_CERT_FILE);

        let lenient = Client::builder()
            .timeout(config.request_timeout)
            .identity(Identity::from_pem(&identity_pem)?)
            .danger_accept_invalid_certs(true)
            .build()?;

        let strict = if ca_path.exists() {
            let ca_pem = std::fs::read(&ca_path).map_err(|err| E2eError::io(&ca_path, err))?;
            Some(
                Client::builder()
                    .timeout(config.request_timeout)
                    .identity(Identity::from_pem(&identity_pem)?)
                    .add_root_certificate(Certificate::from_pem(&ca_pem)?)
                    .build()?,
            )
        } else {
            warn!(path = %ca_path.display(), "CA certificate not found; strict SSL unavailable");
            None
        };

        Ok(Self {
            base_url: config.base_url.clone(),
            lenient,
            strict,
            ca_path,
        })
    }

    /// Client without a TLS identity, for plain-HTTP test servers.
    pub fn plain(base_url: impl Into<String>) -> E2eResult<Self> {
        Self::plain_with_timeout(base_url, Duration::from_secs(10))
    }

    /// [`plain`](Self::plain) with an explicit timeout.
    pub fn plain_with_timeout(base_url: impl Into<String>, timeout: Duration) -> E2eResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            lenient: client.clone(),
            strict: Some(client),
            ca_path: PathBuf::new(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL for one identifier.
    #[must_use]
    pub fn url_for(&self, identifier: &str) -> String {
        format!("{}/{identifier}", self.base_url.trim_end_matches('/'))
    }

    /// Check one identifier.
    #[instrument(skip(self, headers, query_params))]
    pub async fn request(
        &self,
        identifier: &str,
        headers: &BTreeMap<String, String>,
        query_params: &BTreeMap<String, String>,
        options: RequestOptions,
    ) -> E2eResult<ApiResponse> {
        let client = if options.strict_ssl {
            self.strict
                .as_ref()
                .ok_or_else(|| E2eError::CertificateMissing {
                    path: self.ca_path.clone(),
                })?
        } else {
            &self.lenient
        };

        let url = self.url_for(identifier);
        let mut request = client.get(&url).query(query_params);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let response_headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let text = response.text().await?;
        debug!(status = status.as_u16(), bytes = text.len(), "received response");

        if options.raise_on_error && !status.is_success() {
            return Err(E2eError::Status {
                status: status.as_u16(),
                url,
                body: text,
            });
        }

        let body = match serde_json::from_str::<Value>(&text) {
            Ok(json) => ResponseBody::Json(mask_default(json)),
            Err(_) => ResponseBody::Text(text),
        };

        Ok(ApiResponse {
            status_code: status.as_u16(),
            headers: response_headers,
            body,
            ok: status.is_success(),
        })
    }
}

fn read_identity_pem(cert_dir: &Path) -> E2eResult<Vec<u8>> {
    let mut pem = Vec::new();
    for name in [PRIVATE_KEY_FILE, CLIENT_CERT_FILE] {
        let path = cert_dir.join(name);
        if !path.exists() {
            return Err(E2eError::CertificateMissing { path });
        }
        let mut bytes = std::fs::read(&path).map_err(|err| E2eError::io(&path, err))?;
        if !bytes.ends_with(b"\n") {
            bytes.push(b'\n');
        }
        pem.extend(bytes);
    }
    Ok(pem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let client = EligibilityApiClient::plain("http://localhost/patient-check/").unwrap();
        assert_eq!(
            client.url_for("9000000001"),
            "http://localhost/patient-check/9000000001"
        );
    }

    #[test]
    fn missing_certificates_are_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = HarnessConfig {
            cert_dir: tmp.path().to_path_buf(),
            ..HarnessConfig::default()
        };
        match EligibilityApiClient::new(&config) {
            Err(E2eError::CertificateMissing { path }) => {
                assert!(path.ends_with(PRIVATE_KEY_FILE));
            }
            other => panic!("expected CertificateMissing, got {other:?}"),
        }
    }

    #[test]
    fn default_options_raise() {
        assert!(RequestOptions::default().raise_on_error);
        assert!(!RequestOptions::lenient().raise_on_error);
    }
}
