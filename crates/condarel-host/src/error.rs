use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Network error during {operation} ({stage}): {details}")]
    Network {
        operation: &'static str,
        stage: HostStage,
        details: String,
    },

    #[error("{operation} failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        operation: &'static str,
        status: u16,
        body_snippet: String,
    },

    #[error("Unexpected response during {operation}: {details}")]
    InvalidResponse {
        operation: &'static str,
        details: String,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStage {
    #[error("request")]
    Request,
    #[error("response parse")]
    ResponseParse,
}

impl HostError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn request(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Network {
            operation,
            stage: HostStage::Request,
            details: details.into(),
        }
    }

    pub fn request_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::request(operation, error.to_string())
    }

    pub fn parse(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Network {
            operation,
            stage: HostStage::ResponseParse,
            details: details.into(),
        }
    }

    pub fn parse_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::parse(operation, error.to_string())
    }

    pub fn invalid_response(operation: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation,
            details: details.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
