/// Structured error handling for the MedFlow data access layer
///
/// Every remote failure is caught at the facade boundary, logged, and
/// converted into a `FlowError` with a typed kind. Callers match on the
/// kind instead of parsing free-text messages.

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

#[derive(Debug, Clone)]
pub enum FlowError {
    /// Transport-level failures: timeouts, refused connections, DNS
    Network { message: String },

    /// Non-2xx responses from the row store REST surface
    Api { status: u16, message: String },

    /// Authentication and authorization failures
    Auth { message: String },

    /// A single-row read matched no rows
    NotFound { what: String },

    /// Response body could not be decoded into the expected shape
    Parse { message: String },

    /// Invalid or incomplete configuration
    Config { message: String },

    /// Realtime feed failures (websocket connect, join, send)
    Realtime { message: String },
}

impl FlowError {
    /// True when the error is the expected "no row matched" case
    pub fn is_not_found(&self) -> bool {
        matches!(self, FlowError::NotFound { .. })
    }

    pub fn network(message: impl Into<String>) -> Self {
        FlowError::Network {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        FlowError::Auth {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        FlowError::NotFound { what: what.into() }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        FlowError::Parse {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        FlowError::Config {
            message: message.into(),
        }
    }

    pub fn realtime(message: impl Into<String>) -> Self {
        FlowError::Realtime {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowError::Network { message } => write!(f, "Network error: {}", message),
            FlowError::Api { status, message } => {
                write!(f, "API error (HTTP {}): {}", status, message)
            }
            FlowError::Auth { message } => write!(f, "Auth error: {}", message),
            FlowError::NotFound { what } => write!(f, "Not found: {}", what),
            FlowError::Parse { message } => write!(f, "Parse error: {}", message),
            FlowError::Config { message } => write!(f, "Configuration error: {}", message),
            FlowError::Realtime { message } => write!(f, "Realtime error: {}", message),
        }
    }
}

impl std::error::Error for FlowError {}

// =============================================================================
// CONVERSIONS
// =============================================================================

impl From<reqwest::Error> for FlowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FlowError::Parse {
                message: err.to_string(),
            }
        } else {
            // Timeouts, connect failures, TLS problems and request build
            // errors all surface as transport failures
            FlowError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Parse {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = FlowError::not_found("patient 42");
        assert!(err.is_not_found());
        assert!(!FlowError::network("timeout").is_not_found());
    }

    #[test]
    fn test_display_includes_status() {
        let err = FlowError::Api {
            status: 403,
            message: "permission denied".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("403"));
        assert!(text.contains("permission denied"));
    }
}
