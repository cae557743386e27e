//! Error handling module for the configuration service.
//!
//! Every failure is classified as network, persistence, or validation so the
//! bootstrap sequence can turn it into a fallback transition.

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const PERSISTENCE_ERROR: &str = "PERSISTENCE_ERROR";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
}

/// Application error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// No connectivity, timeout, non-success status or malformed body
    Network(String),
    /// Store transaction or serialization failure
    Persistence(String),
    /// Document missing required sections
    Validation(String),
}

impl AppError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Network(_) => codes::NETWORK_ERROR,
            AppError::Persistence(_) => codes::PERSISTENCE_ERROR,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Network(msg) => msg.clone(),
            AppError::Persistence(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, AppError::Network(_))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Persistence(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Persistence(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP error: {:?}", err);
        if err.is_timeout() {
            AppError::Network(format!("Request timed out: {}", err))
        } else if err.is_decode() {
            AppError::Network(format!("Malformed response body: {}", err))
        } else if let Some(status) = err.status() {
            AppError::Network(format!("Unexpected status {}", status))
        } else {
            AppError::Network(format!("Request failed: {}", err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = AppError::Network("No internet connection".to_string());
        assert_eq!(err.to_string(), "NETWORK_ERROR: No internet connection");
        assert!(err.is_network());
    }

    #[test]
    fn test_json_error_maps_to_persistence() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.error_code(), codes::PERSISTENCE_ERROR);
    }
}
