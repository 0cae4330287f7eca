use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReporterError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Reporting API rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Formatting failed: {message}")]
    Formatting { message: String },
}

pub type ReporterResult<T> = Result<T, ReporterError>;

/// Status and parsed body of a reporting API response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Message the server attached to an error response, if any.
    pub fn server_message(&self) -> Option<String> {
        match &self.body {
            Value::Object(map) => map
                .get("message")
                .or_else(|| map.get("error"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        }
    }

    /// Turns a status >= 400 into [`ReporterError::Rejected`].
    pub fn into_result(self) -> ReporterResult<Self> {
        if self.is_error() {
            return Err(ReporterError::Rejected {
                status: self.status,
                message: self
                    .server_message()
                    .unwrap_or_else(|| "no message".to_string()),
            });
        }
        Ok(self)
    }
}

/// Sends one request to the reporting API.
///
/// Responses with an error status are returned as `Ok`; `Err` means no
/// response was received at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> ReporterResult<TransportResponse>;
}
