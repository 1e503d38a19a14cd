//! Query response envelope (stable v1)
//!
//! Every caller-facing query returns a `QueryResponse`. The analysis engine
//! itself is total over its inputs; the envelope is where "no dependencies"
//! and "lookup failed" become distinguishable.

use serde::{Deserialize, Serialize};

/// Response schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ResponseVersion {
    /// Current response schema version
    pub const CURRENT: ResponseVersion = ResponseVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ResponseVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Error classification carried by a failed response
///
/// These classes are STABLE strings. Do not rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// A file or folder could not be read
    IoError,

    /// A structured input (JSON rows, config) could not be decoded
    ParseError,

    /// The requested object does not exist in the catalog
    NotFound,

    /// The request itself was malformed
    InvalidInput,

    /// Configuration could not be loaded
    ConfigError,
}

impl ErrorClass {
    /// Stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IoError => "io_error",
            Self::ParseError => "parse_error",
            Self::NotFound => "not_found",
            Self::InvalidInput => "invalid_input",
            Self::ConfigError => "config_error",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Success-flagged result of a caller-facing operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse<T> {
    /// Schema version
    pub version: ResponseVersion,

    /// Whether the operation succeeded
    pub success: bool,

    /// Result payload (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,

    /// Error classification (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorClass>,

    /// Human-readable failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> QueryResponse<T> {
    /// Successful response
    pub fn ok(result: T) -> Self {
        Self {
            version: ResponseVersion::CURRENT,
            success: true,
            result: Some(result),
            error_type: None,
            message: None,
        }
    }

    /// Failed response
    pub fn failure(error_type: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            version: ResponseVersion::CURRENT,
            success: false,
            result: None,
            error_type: Some(error_type),
            message: Some(message.into()),
        }
    }

    /// Whether the operation succeeded
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Borrow the payload, if any
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    /// Convert into a standard `Result`
    pub fn into_result(self) -> Result<T, (ErrorClass, String)> {
        match (self.result, self.error_type) {
            (Some(result), _) if self.success => Ok(result),
            (_, class) => Err((
                class.unwrap_or(ErrorClass::InvalidInput),
                self.message.unwrap_or_default(),
            )),
        }
    }

    /// Transform the payload of a successful response
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryResponse<U> {
        QueryResponse {
            version: self.version,
            success: self.success,
            result: self.result.map(f),
            error_type: self.error_type,
            message: self.message,
        }
    }
}

impl<T: Serialize> QueryResponse<T> {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_response() {
        let response = QueryResponse::ok(vec![1, 2, 3]);
        assert!(response.is_success());
        assert_eq!(response.result(), Some(&vec![1, 2, 3]));

        let json = response.to_json().unwrap();
        assert!(json.contains("\"success\": true"));
        assert!(!json.contains("error_type"));
    }

    #[test]
    fn failed_response_carries_classification() {
        let response: QueryResponse<()> =
            QueryResponse::failure(ErrorClass::NotFound, "Measure Sales[Nope] not found");
        assert!(!response.is_success());

        let json = response.to_json().unwrap();
        assert!(json.contains("\"not_found\""));
        assert!(json.contains("Sales[Nope]"));

        let err = response.into_result().unwrap_err();
        assert_eq!(err.0, ErrorClass::NotFound);
    }

    #[test]
    fn map_preserves_failure() {
        let response: QueryResponse<u32> = QueryResponse::failure(ErrorClass::IoError, "missing");
        let mapped = response.map(|n| n + 1);
        assert!(!mapped.success);
        assert_eq!(mapped.error_type, Some(ErrorClass::IoError));
    }

    #[test]
    fn error_class_strings_are_stable() {
        assert_eq!(ErrorClass::IoError.as_str(), "io_error");
        assert_eq!(ErrorClass::ConfigError.to_string(), "config_error");
    }
}
