#[derive(Debug, thiserror::Error)]
pub enum DevconfError {
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("A2A error: {0}")]
    A2a(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Coarse classification used when an error crosses a process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A remote agent or the LLM provider is unreachable or erroring.
    DependencyUnavailable,
    /// Malformed input or an unknown conversation id.
    Validation,
    Internal,
}

impl DevconfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DevconfError::DependencyUnavailable(_) | DevconfError::Model(_) => {
                ErrorKind::DependencyUnavailable
            }
            DevconfError::Validation(_) | DevconfError::NotFound(_) => ErrorKind::Validation,
            DevconfError::Session(_)
            | DevconfError::A2a(_)
            | DevconfError::Config(_)
            | DevconfError::Internal(_)
            | DevconfError::Serde(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        DevconfError::NotFound(what.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DevconfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_error_names_agent() {
        let err = DevconfError::DependencyUnavailable("github_agent".to_string());
        assert_eq!(err.to_string(), "Dependency unavailable: github_agent");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            DevconfError::Model("timeout".into()).kind(),
            ErrorKind::DependencyUnavailable
        );
        assert_eq!(DevconfError::not_found("conversation").kind(), ErrorKind::Validation);
        assert_eq!(DevconfError::Validation("empty".into()).kind(), ErrorKind::Validation);
        assert_eq!(DevconfError::Session("locked".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: DevconfError = serde_err.into();
        assert!(matches!(err, DevconfError::Serde(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
