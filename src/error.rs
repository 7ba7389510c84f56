use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by the REST façade.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered 401. The session has already been invalidated and
    /// the login redirect issued by the time a caller sees this.
    #[error("authentication required")]
    Unauthorized,

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode {context} response: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid API base URL {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status for status-class failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Failures reading or writing persisted session values.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session storage is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("realtime socket is not open")]
    NotConnected,

    #[error("realtime client has shut down")]
    Closed,

    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reasons an inbound realtime frame is discarded.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not a JSON envelope: {0}")]
    Json(#[source] serde_json::Error),

    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_reports_401() {
        assert_eq!(ApiError::Unauthorized.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn status_error_message_includes_body() {
        let err = ApiError::Status {
            status: StatusCode::NOT_FOUND,
            body: "Alert not found".into(),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(err.to_string().contains("Alert not found"));
    }
}
