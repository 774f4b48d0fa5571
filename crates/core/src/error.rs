//! Relay error taxonomy.

/// Errors surfaced by the relay's public operations.
///
/// `MissingField` and `UnknownSession` are client errors and never mutate
/// state. The remaining variants are opaque provider-side faults.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Session '{0}' not found")]
    UnknownSession(String),
    #[error("Text generation failed: {0}")]
    Generation(anyhow::Error),
    #[error("Speech synthesis failed: {0}")]
    Synthesis(anyhow::Error),
    #[error("Failed to store audio: {0}")]
    Delivery(#[from] std::io::Error),
}

impl RelayError {
    /// Whether the caller, not a provider, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::MissingField(_) | RelayError::UnknownSession(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            RelayError::MissingField("sessionId").to_string(),
            "sessionId is required"
        );
        assert_eq!(
            RelayError::UnknownSession("abc".into()).to_string(),
            "Session 'abc' not found"
        );
        assert!(
            RelayError::Generation(anyhow::anyhow!("boom"))
                .to_string()
                .contains("boom")
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(RelayError::MissingField("message").is_client_error());
        assert!(RelayError::UnknownSession("x".into()).is_client_error());
        assert!(!RelayError::Synthesis(anyhow::anyhow!("x")).is_client_error());
        let io = std::io::Error::other("disk full");
        assert!(!RelayError::from(io).is_client_error());
    }
}
