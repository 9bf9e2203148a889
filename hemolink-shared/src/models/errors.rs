use serde::{Deserialize, Serialize};

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// The main error message
    pub message: String,
    /// Optional additional details about the error
    #[serde(default, alias = "error")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Best-effort extraction of a readable message from a raw response body.
    ///
    /// Falls back to the trimmed body text when it is not an error document.
    pub fn describe(body: &str) -> String {
        serde_json::from_str::<Self>(body)
            .map_or_else(|_| body.trim().to_string(), |parsed| parsed.to_string())
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {}", self.message, details),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ErrorResponse {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_without_details_uses_message_only() {
        let body = r#"{"success":false,"message":"Community not found"}"#;
        assert_eq!(ErrorResponse::describe(body), "Community not found");
    }

    #[test]
    fn describe_parses_backend_error_document() {
        let body = r#"{"success":false,"message":"Not authorized","error":"token expired"}"#;
        assert_eq!(ErrorResponse::describe(body), "Not authorized: token expired");
    }

    #[test]
    fn describe_falls_back_to_raw_text() {
        assert_eq!(ErrorResponse::describe("  Bad Gateway \n"), "Bad Gateway");
    }
}
