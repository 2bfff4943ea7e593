//! Unified error handling for the storelink CLI and SDK
//!
//! Every error carries a unique code for debugging and documentation.
//! Authentication and session errors are handled centrally by the HTTP
//! gateway; push errors are contained inside the push manager and only
//! ever surface as warnings.

use std::fmt;
use thiserror::Error;

/// Unified Result type for all storelink operations
pub type Result<T> = std::result::Result<T, StorelinkError>;

/// Error codes for storelink operations
///
/// Each error has a unique code in the format `SLXXX` where:
/// - SL1XX: Authentication and session errors
/// - SL2XX: Network and API errors
/// - SL3XX: Storage and I/O errors
/// - SL4XX: Configuration errors
/// - SL5XX: Validation and input errors
/// - SL6XX: Push and platform errors
/// - SL9XX: Internal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication (SL1XX)
    /// SL101: Authentication failed
    AuthenticationFailed,
    /// SL102: Access token rejected
    TokenRejected,
    /// SL103: No refresh token available
    MissingRefreshToken,
    /// SL105: Session expired (refresh failed while requests were pending)
    SessionExpired,

    // Network (SL2XX)
    /// SL201: HTTP request failed
    HttpError,
    /// SL202: Connection timeout
    ConnectionTimeout,
    /// SL204: Connection refused
    ConnectionRefused,
    /// SL205: API returned error response
    ApiError,
    /// SL206: Invalid API response format
    InvalidResponse,

    // Storage/IO (SL3XX)
    /// SL301: File not found
    FileNotFound,
    /// SL302: Storage read error
    StorageReadError,
    /// SL303: Storage write error
    StorageWriteError,

    // Configuration (SL4XX)
    /// SL401: Configuration error
    ConfigError,
    /// SL402: Invalid endpoint URL
    InvalidEndpoint,

    // Validation (SL5XX)
    /// SL501: Invalid input
    InvalidInput,

    // Push/platform (SL6XX)
    /// SL601: Notification permission denied
    PermissionDenied,
    /// SL602: Push platform registration failed
    RegistrationFailed,
    /// SL603: Token acquisition timed out
    RegistrationTimeout,
    /// SL604: Topic subscription failed
    SubscriptionFailed,

    // Internal (SL9XX)
    /// SL901: Internal error
    InternalError,
    /// SL902: Serialization error
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::AuthenticationFailed => 101,
            ErrorCode::TokenRejected => 102,
            ErrorCode::MissingRefreshToken => 103,
            ErrorCode::SessionExpired => 105,

            ErrorCode::HttpError => 201,
            ErrorCode::ConnectionTimeout => 202,
            ErrorCode::ConnectionRefused => 204,
            ErrorCode::ApiError => 205,
            ErrorCode::InvalidResponse => 206,

            ErrorCode::FileNotFound => 301,
            ErrorCode::StorageReadError => 302,
            ErrorCode::StorageWriteError => 303,

            ErrorCode::ConfigError => 401,
            ErrorCode::InvalidEndpoint => 402,

            ErrorCode::InvalidInput => 501,

            ErrorCode::PermissionDenied => 601,
            ErrorCode::RegistrationFailed => 602,
            ErrorCode::RegistrationTimeout => 603,
            ErrorCode::SubscriptionFailed => 604,

            ErrorCode::InternalError => 901,
            ErrorCode::SerializationError => 902,
        }
    }

    /// Get the string code (e.g., "SL101")
    pub fn as_str(&self) -> String {
        format!("SL{}", self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SL{}", self.code())
    }
}

/// Main error type for all storelink operations
#[derive(Error, Debug)]
pub enum StorelinkError {
    /// Authentication or session error
    #[error("[{code}] Authentication failed: {message}")]
    Authentication {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// HTTP/Network error
    #[error("[{code}] Network error: {message}")]
    Network {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// API error with status code
    #[error("[{code}] API error ({status}): {message}")]
    Api {
        code: ErrorCode,
        status: u16,
        message: String,
    },

    /// Storage or IO error
    #[error("[{code}] {context}: {message}")]
    Io {
        code: ErrorCode,
        context: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration error
    #[error("[{code}] Configuration error: {message}")]
    Config {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<config::ConfigError>,
    },

    /// Invalid input error
    #[error("[{code}] Invalid input: {message}")]
    InvalidInput { code: ErrorCode, message: String },

    /// Push or platform error
    #[error("[{code}] Push error: {message}")]
    Push { code: ErrorCode, message: String },

    /// Internal/Unexpected error
    #[error("[{code}] Internal error: {message}")]
    Internal { code: ErrorCode, message: String },

    /// JSON serialization error
    #[error("[{code}] Serialization error: {message}")]
    Serialization {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

impl StorelinkError {
    // --- Authentication ---

    /// Create authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::AuthenticationFailed,
            message: message.into(),
            source: None,
        }
    }

    /// Create missing-refresh-token error
    pub fn missing_refresh_token() -> Self {
        Self::Authentication {
            code: ErrorCode::MissingRefreshToken,
            message: "No refresh token available".to_string(),
            source: None,
        }
    }

    /// Create session-expired error
    ///
    /// Raised when a credential refresh fails while requests were pending;
    /// distinguishes "the whole session ended" from an individual 401.
    pub fn session_expired() -> Self {
        Self::Authentication {
            code: ErrorCode::SessionExpired,
            message: "Session expired, please log in again".to_string(),
            source: None,
        }
    }

    // --- Network ---

    /// Create network error from message
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            code: ErrorCode::HttpError,
            message: message.into(),
            source: None,
        }
    }

    /// Create network error from reqwest error
    pub fn network_from_reqwest(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::ConnectionTimeout
        } else if err.is_connect() {
            ErrorCode::ConnectionRefused
        } else {
            ErrorCode::HttpError
        };

        Self::Network {
            code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create API error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::ApiError,
            status,
            message: message.into(),
        }
    }

    /// Create invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::InvalidResponse,
            status: 0,
            message: message.into(),
        }
    }

    // --- Storage/IO ---

    /// Create IO error from std::io::Error
    pub fn io_from_error(context: impl Into<String>, err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::StorageWriteError,
            _ => ErrorCode::StorageReadError,
        };

        Self::Io {
            code,
            context: context.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create storage error
    pub fn storage(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            code: ErrorCode::StorageWriteError,
            context: context.into(),
            message: message.into(),
            source: None,
        }
    }

    // --- Configuration ---

    /// Create configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration error with source
    pub fn config_from_error(err: config::ConfigError) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: err.to_string(),
            source: Some(err),
        }
    }

    // --- Validation ---

    /// Create invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code: ErrorCode::InvalidInput,
            message: message.into(),
        }
    }

    // --- Push/platform ---

    /// Create permission-denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::Push {
            code: ErrorCode::PermissionDenied,
            message: message.into(),
        }
    }

    /// Create registration error
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Push {
            code: ErrorCode::RegistrationFailed,
            message: message.into(),
        }
    }

    /// Create registration timeout error
    pub fn registration_timeout(message: impl Into<String>) -> Self {
        Self::Push {
            code: ErrorCode::RegistrationTimeout,
            message: message.into(),
        }
    }

    /// Create subscription error
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Push {
            code: ErrorCode::SubscriptionFailed,
            message: message.into(),
        }
    }

    // --- Internal ---

    /// Create internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: ErrorCode::InternalError,
            message: message.into(),
        }
    }

    // --- Utility Methods ---

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::Api { code, .. } => *code,
            Self::Io { code, .. } => *code,
            Self::Config { code, .. } => *code,
            Self::InvalidInput { code, .. } => *code,
            Self::Push { code, .. } => *code,
            Self::Internal { code, .. } => *code,
            Self::Serialization { code, .. } => *code,
        }
    }

    /// Check if this is an authentication or session error
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Check if this error means the whole session ended
    pub fn is_session_expired(&self) -> bool {
        self.code() == ErrorCode::SessionExpired
    }

    /// Check if this is an HTTP 401 surfaced to the caller
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }
}

// ==================== From Implementations ====================

impl From<std::io::Error> for StorelinkError {
    fn from(err: std::io::Error) -> Self {
        Self::io_from_error("IO operation", err)
    }
}

impl From<reqwest::Error> for StorelinkError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_from_reqwest(err)
    }
}

impl From<serde_json::Error> for StorelinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            code: ErrorCode::SerializationError,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<config::ConfigError> for StorelinkError {
    fn from(err: config::ConfigError) -> Self {
        Self::config_from_error(err)
    }
}

impl From<dialoguer::Error> for StorelinkError {
    fn from(err: dialoguer::Error) -> Self {
        Self::InvalidInput {
            code: ErrorCode::InvalidInput,
            message: format!("Prompt error: {}", err),
        }
    }
}

// Manual Clone implementation that drops non-cloneable sources
impl Clone for StorelinkError {
    fn clone(&self) -> Self {
        match self {
            Self::Authentication {
                code,
                message,
                source: _,
            } => Self::Authentication {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Network {
                code,
                message,
                source: _,
            } => Self::Network {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Api {
                code,
                status,
                message,
            } => Self::Api {
                code: *code,
                status: *status,
                message: message.clone(),
            },
            Self::Io {
                code,
                context,
                message,
                source: _,
            } => Self::Io {
                code: *code,
                context: context.clone(),
                message: message.clone(),
                source: None,
            },
            Self::Config {
                code,
                message,
                source: _,
            } => Self::Config {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::InvalidInput { code, message } => Self::InvalidInput {
                code: *code,
                message: message.clone(),
            },
            Self::Push { code, message } => Self::Push {
                code: *code,
                message: message.clone(),
            },
            Self::Internal { code, message } => Self::Internal {
                code: *code,
                message: message.clone(),
            },
            Self::Serialization {
                code,
                message,
                source: _,
            } => Self::Serialization {
                code: *code,
                message: message.clone(),
                source: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::AuthenticationFailed.code(), 101);
        assert_eq!(ErrorCode::SessionExpired.code(), 105);
        assert_eq!(ErrorCode::HttpError.code(), 201);
        assert_eq!(ErrorCode::PermissionDenied.code(), 601);
    }

    #[test]
    fn test_error_code_string() {
        assert_eq!(ErrorCode::SessionExpired.as_str(), "SL105");
        assert_eq!(ErrorCode::SubscriptionFailed.as_str(), "SL604");
    }

    #[test]
    fn test_error_display() {
        let err = StorelinkError::authentication("Invalid credentials");
        assert!(err.to_string().contains("SL101"));
        assert!(err.to_string().contains("Invalid credentials"));
    }

    #[test]
    fn test_session_expired_classification() {
        let err = StorelinkError::session_expired();
        assert!(err.is_auth_error());
        assert!(err.is_session_expired());
        assert!(!err.is_unauthorized());

        let raw_401 = StorelinkError::api(401, "Unauthorized");
        assert!(raw_401.is_unauthorized());
        assert!(!raw_401.is_session_expired());
    }
}
