//! Error taxonomy for calls against the remote tracker

use thiserror::Error;

/// Failure kinds surfaced by the tracker capability and the enrichment core.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Network failure or a non-2xx response. `message` carries the response
    /// body when one was received.
    #[error("tracker transport error{}: {message}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The graph endpoint answered with a non-empty `errors` array.
    #[error("graph query error: {}", .0.join("; "))]
    GraphQuery(Vec<String>),

    /// The mutation executed but reported application-level errors.
    #[error("mutation rejected: {}", .0.join("; "))]
    MutationRejected(Vec<String>),

    /// An expected entity was absent from an otherwise successful response.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body could not be decoded.
    #[error("malformed tracker response: {0}")]
    Parse(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl TrackerError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: body.into(),
        }
    }

    /// Short machine-readable name of the kind, used in logs and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::GraphQuery(_) => "graph_query",
            Self::MutationRejected(_) => "mutation_rejected",
            Self::NotFound(_) => "not_found",
            Self::Parse(_) => "parse",
        }
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Parse(err.to_string());
        }
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Convenience `Result` alias for tracker calls.
pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display_includes_status_and_body() {
        let err = TrackerError::status(502, "bad gateway");
        assert_eq!(
            err.to_string(),
            "tracker transport error (status 502): bad gateway"
        );
        assert_eq!(err.kind(), "transport");
    }

    #[test]
    fn test_transport_display_without_status() {
        let err = TrackerError::transport("connection refused");
        assert_eq!(err.to_string(), "tracker transport error: connection refused");
    }

    #[test]
    fn test_graph_errors_are_joined() {
        let err = TrackerError::GraphQuery(vec!["first".into(), "second".into()]);
        assert_eq!(err.to_string(), "graph query error: first; second");
    }

    #[test]
    fn test_serde_error_maps_to_parse() {
        let err: TrackerError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, TrackerError::Parse(_)));
    }
}
