use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never completed (connect, timeout, body read).
    #[error("Network failure: {0}")]
    Network(String),

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Backend rejected request ({status}): {message}")]
    BackendRejected { status: u16, message: String },

    #[error("Embedding blocked for {0}")]
    EmbeddingBlocked(String),

    /// A newer request for the same resource started before this one resolved.
    #[error("Superseded: {0}")]
    RaceDiscarded(String),

    #[error("Bookmark toggle already in flight for {0}")]
    ToggleInFlight(String),

    #[error("Invalid article: {0}")]
    InvalidArticle(String),

    /// Rejected locally before any request was made.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Unsupported range: {0} days (expected 7, 30 or 90)")]
    InvalidRange(u32),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ClientError {
    /// Errors that a user-initiated action must surface as a dismissible message.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_)
                | ClientError::BackendRejected { .. }
                | ClientError::ToggleInFlight(_)
                | ClientError::InvalidInput(_)
        )
    }

    /// Gated actions redirect to the credential flow on this error.
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::Unauthenticated)
    }

    pub fn user_message(&self) -> String {
        match self {
            ClientError::Network(_) => {
                "Could not reach the news service. Check your connection and try again.".to_string()
            }
            ClientError::Unauthenticated => "Please log in to continue.".to_string(),
            ClientError::BackendRejected { message, .. } => message.clone(),
            ClientError::ToggleInFlight(_) => "Still saving your last change.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_visible_classification() {
        assert!(ClientError::Network("reset".into()).is_user_visible());
        assert!(ClientError::BackendRejected {
            status: 500,
            message: "Failed to add bookmark".into()
        }
        .is_user_visible());
        assert!(!ClientError::RaceDiscarded("analytics".into()).is_user_visible());
        assert!(!ClientError::EmbeddingBlocked("https://a.test".into()).is_user_visible());
        assert!(!ClientError::Unauthenticated.is_user_visible());
    }

    #[test]
    fn test_unauthenticated_requires_login() {
        assert!(ClientError::Unauthenticated.requires_login());
        assert_eq!(ClientError::Unauthenticated.user_message(), "Please log in to continue.");
    }

    #[test]
    fn test_backend_message_is_shown_verbatim() {
        let err = ClientError::BackendRejected {
            status: 400,
            message: "article_url is required".into(),
        };
        assert_eq!(err.user_message(), "article_url is required");
    }
}
