//! Unified error type for ticket-sync.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Gateway API error (status={status}): {message}")]
    Api { status: u16, message: String },

    #[error("Offer stream error: {0}")]
    Stream(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Snapshot storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Plain-language message safe to show next to a view.
    ///
    /// Raw transport detail stays in the `Display` output for logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::Http(_) => {
                "We couldn't reach the ticket service. Please check your connection and try again."
                    .into()
            }
            Error::Api { status: 404, .. } => "We couldn't find what you were looking for.".into(),
            Error::Api { status: 429, .. } => {
                "The ticket service is busy right now. Please try again in a moment.".into()
            }
            Error::Api { status, .. } if *status >= 500 => {
                "The ticket service is having trouble right now. Please try again later.".into()
            }
            Error::Api { .. } => "The ticket service rejected the request.".into(),
            Error::Stream(_) => {
                "We lost the connection while loading ticket offers. Please try again.".into()
            }
            Error::Json(_) => "We received data we couldn't understand.".into(),
            Error::Config(_) | Error::Storage(_) | Error::Io(_) | Error::Other(_) => {
                "Something went wrong. Please try again.".into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_transport_detail() {
        let err = Error::Http("dns error: failed to lookup address information".into());
        let msg = err.user_message();
        assert!(!msg.contains("dns"));
        assert!(err.to_string().contains("dns"));
    }

    #[test]
    fn test_user_message_by_status() {
        let not_found = Error::Api {
            status: 404,
            message: "{\"success\":false}".into(),
        };
        let outage = Error::Api {
            status: 503,
            message: String::new(),
        };
        assert_ne!(not_found.user_message(), outage.user_message());
        assert!(outage.user_message().contains("later"));
    }
}
