use thiserror::Error;

/// Failure of one analysis run, from connect through the last envelope.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response carried no readable body")]
    NoResponseBody,

    /// An `error` envelope sent by the backend. Shown verbatim.
    #[error("{message}")]
    Backend { message: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("runtime error: {message}")]
    Runtime { message: String },
}

impl ClientError {
    pub(crate) fn transport(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Network {
                message: format!("no response from server for {timeout_secs}s"),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }

    /// True for failures reported by the backend itself rather than the
    /// transport or the client.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn backend_message_is_displayed_verbatim() {
        let err = ClientError::Backend {
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "rate limited");
        assert!(err.is_backend());
    }

    #[test]
    fn status_error_includes_code_and_body() {
        let err = ClientError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");
        assert!(!err.is_backend());
    }
}
