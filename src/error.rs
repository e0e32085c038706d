use thiserror::Error;

pub type DnsPodResult<T> = Result<T, DnsPodError>;

/// Errors raised while talking to the DNSPod API.
#[derive(Debug, Error)]
pub enum DnsPodError {
    /// None of the account's zones is a suffix of the requested name
    #[error("No DNSPod zone found for domain '{domain}'")]
    ZoneNotFound { domain: String },

    /// The API answered with a `Response.Error` object
    #[error("DNSPod {action} failed for '{target}': {message} ({code})")]
    RemoteApi {
        action: &'static str,
        target: String,
        code: String,
        message: String,
    },

    /// The request never got an answer (connect, TLS, timeout)
    #[error("Failed to send request to DNSPod: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected DNSPod {action} response: {message}")]
    InvalidResponse {
        action: &'static str,
        message: String,
    },

    #[error("Failed to sign DNSPod request: {0}")]
    Signing(String),
}

impl DnsPodError {
    /// Provider error code, if the API produced one
    pub fn code(&self) -> Option<&str> {
        match self {
            DnsPodError::RemoteApi { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_context() {
        let err = DnsPodError::ZoneNotFound {
            domain: "example.org".to_string(),
        };
        assert!(err.to_string().contains("example.org"));

        let err = DnsPodError::RemoteApi {
            action: "CreateTXTRecord",
            target: "example.com".to_string(),
            code: "AuthFailure.SignatureFailure".to_string(),
            message: "The provided credentials could not be validated.".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("CreateTXTRecord"));
        assert!(text.contains("example.com"));
        assert!(text.contains("The provided credentials could not be validated."));
        assert_eq!(err.code(), Some("AuthFailure.SignatureFailure"));
    }
}
