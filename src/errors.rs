use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Defects found while adapting a source payload to the internal shapes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("month number {0} in source payload is outside 1-12")]
    MonthOutOfRange(i64),
}

/// Failure talking to the external irradiance service.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("irradiance service answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("irradiance service did not answer within the timeout")]
    Timeout,
    #[error("could not reach irradiance service: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("irradiance service returned a body that is not JSON: {0}")]
    MalformedBody(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else if let Some(status) = e.status() {
            SourceError::Status {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            SourceError::Transport(e)
        }
    }
}

/// Request-scoped error returned by the proxy handlers.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("could not process solar data: {0}")]
    Normalize(#[from] NormalizeError),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            // Upstream error statuses are passed through as-is.
            ProxyError::Source(SourceError::Status { status, .. }) => {
                match StatusCode::from_u16(*status) {
                    Ok(code) if code.is_client_error() || code.is_server_error() => code,
                    _ => StatusCode::BAD_GATEWAY,
                }
            }
            ProxyError::Source(SourceError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Source(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Normalize(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
