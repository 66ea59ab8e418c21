use std::error::Error as StdError;

use thiserror::Error;

use crate::constants::BUSY_ERROR_MESSAGE_DETAIL;

/// Errors surfaced to callers of the chat client.
///
/// Every variant except [`ClientError::Busy`] is also recorded into the
/// request tracker's last error when it ends an operation.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request was rejected or the response body could not be opened.
    /// No events were produced.
    #[error("{}", transport_message(.status, .message))]
    Transport { status: Option<u16>, message: String },

    /// The response body failed after streaming started. Events already
    /// delivered stay valid.
    #[error("Stream error: {0}")]
    Stream(String),

    /// A non-streaming response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Another operation is still running on the same client.
    #[error("Request rejected: {}", BUSY_ERROR_MESSAGE_DETAIL)]
    Busy,
}

fn transport_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("HTTP {} error: {}", status, message),
        None => format!("Transport error: {}", message),
    }
}

impl ClientError {
    pub fn transport(message: impl Into<String>) -> Self {
        ClientError::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ClientError::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// HTTP status of a rejected request, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_transport_error(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    pub fn is_stream_error(&self) -> bool {
        matches!(self, ClientError::Stream(_))
    }

    /// Build a mid-stream error from a body read failure.
    pub(crate) fn from_body_error(err: reqwest::Error) -> Self {
        ClientError::Stream(describe_reqwest_error(&err))
    }
}

/// A single `data: ` frame whose payload was not valid JSON.
///
/// Recovered locally by the decoder: logged and skipped, never returned to
/// callers.
#[derive(Error, Debug)]
#[error("malformed frame payload {payload:?}: {source}")]
pub struct FrameDecodeError {
    pub payload: String,
    #[source]
    pub source: serde_json::Error,
}

fn describe_reqwest_error(err: &reqwest::Error) -> String {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else if err.is_request() {
        "request"
    } else if err.is_body() {
        "body"
    } else if err.is_decode() {
        "decode"
    } else {
        "unknown"
    };

    let mut message = match err.url() {
        Some(url) => format!("URL: {} | Error kind: {} | Details: {}", url, kind, err),
        None => format!("Error kind: {} | Details: {}", kind, err),
    };

    let mut source = err.source();
    while let Some(e) = source {
        message.push_str(&format!(" | Caused by: {}", e));
        source = e.source();
    }
    message
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let message = describe_reqwest_error(&err);
        match err.status() {
            Some(status) => ClientError::http(status.as_u16(), message),
            None => ClientError::transport(message),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidParameter(format!("invalid URL: {}", err))
    }
}
