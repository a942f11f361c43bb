use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("booking service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid response from booking service: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Network failures, timeouts and 5xx responses may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RemoteError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            RemoteError::Http(_) => {
                "Could not reach the booking service. Please try again.".to_string()
            }
            RemoteError::Api { message, .. }
            | RemoteError::Conflict(message)
            | RemoteError::NotFound(message)
            | RemoteError::Rejected(message)
                if !message.is_empty() =>
            {
                message.clone()
            }
            RemoteError::Unauthorized => "Please sign in again.".to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}
