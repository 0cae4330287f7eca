use crate::config::ReporterConfig;
use crate::transport::{ReporterError, ReporterResult, Transport, TransportResponse};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

const USER_AGENT_VALUE: &str = concat!("testomat-reporter-rs/", env!("CARGO_PKG_VERSION"));

/// [`Transport`] over a shared `reqwest` client.
///
/// Bodies are neither capped nor truncated in either direction.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ReporterConfig) -> ReporterResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| ReporterError::InvalidConfig {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    fn map_send_error(e: reqwest::Error) -> ReporterError {
        if e.is_timeout() {
            ReporterError::Transport {
                message: "Request timeout".to_string(),
            }
        } else if e.is_connect() {
            ReporterError::Transport {
                message: "Cannot connect to the reporting service".to_string(),
            }
        } else {
            ReporterError::Network(e)
        }
    }

    fn parse_body(text: String) -> Value {
        if text.trim().is_empty() {
            return Value::Null;
        }
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> ReporterResult<TransportResponse> {
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(Self::map_send_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(ReporterError::Network)?;

        debug!("{} answered with status {}", url, status);

        Ok(TransportResponse::new(status, Self::parse_body(text)))
    }
}
