pub use crate::http::{ByteStream, Client, HttpClient, HttpRequest, HttpResponse};
pub use crate::options::RequestOptions;
pub use crate::query::AnonymizersQuery;
pub use crate::responses::*;

use std::{fmt, path::PathBuf};

pub mod feeds;
pub mod http;
pub mod options;
pub mod query;
pub mod responses;

/// Why an in-flight call was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired.
    Cancelled,
    /// The deadline in the request options passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "request cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no token provided for client")]
    Unauthenticated,
    #[error("token is not a valid Authorization header value")]
    InvalidToken,
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("performing request to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("invalid input parameters ({url}){}", vendor_message(.message))]
    BadRequest {
        url: String,
        message: Option<String>,
    },
    #[error("no api key was provided or the key is invalid ({url}){}", vendor_message(.message))]
    Unauthorized {
        url: String,
        message: Option<String>,
    },
    #[error("credits have run out ({url}){}", vendor_message(.message))]
    PaymentRequired {
        url: String,
        message: Option<String>,
    },
    #[error("unexpected error occurred ({url}){}", vendor_message(.message))]
    InternalServerError {
        url: String,
        message: Option<String>,
    },
    #[error(
        "status of {status} \"{}\" ({expected} \"{}\" expected) from {url}{}",
        reason_phrase(*.status),
        reason_phrase(*.expected),
        vendor_message(.message)
    )]
    UnexpectedStatus {
        url: String,
        status: u16,
        expected: u16,
        message: Option<String>,
    },
    #[error("parsing json from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("reading response body from {url}: {source}")]
    Stream {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("file already exists: {}", .path.display())]
    FileExists { path: PathBuf },
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{reason} while requesting {url}")]
    Cancelled { url: String, reason: CancelReason },
}

impl ClientError {
    /// The HTTP status that produced this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::BadRequest { .. } => Some(400),
            ClientError::Unauthorized { .. } => Some(401),
            ClientError::PaymentRequired { .. } => Some(402),
            ClientError::InternalServerError { .. } => Some(500),
            ClientError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The `error` field of the vendor's response body, when one was sent.
    pub fn vendor_message(&self) -> Option<&str> {
        match self {
            ClientError::BadRequest { message, .. }
            | ClientError::Unauthorized { message, .. }
            | ClientError::PaymentRequired { message, .. }
            | ClientError::InternalServerError { message, .. }
            | ClientError::UnexpectedStatus { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled { .. })
    }

    pub(crate) fn from_status(
        url: String,
        status: u16,
        expected: u16,
        message: Option<String>,
    ) -> Self {
        match status {
            400 => ClientError::BadRequest { url, message },
            401 => ClientError::Unauthorized { url, message },
            402 => ClientError::PaymentRequired { url, message },
            500 => ClientError::InternalServerError { url, message },
            _ => ClientError::UnexpectedStatus {
                url,
                status,
                expected,
                message,
            },
        }
    }
}

fn vendor_message(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

fn reason_phrase(code: u16) -> &'static str {
    reqwest::StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("")
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_priority() {
        let url = "https://example.test".to_string();
        for (status, expected) in [(400, 400), (401, 200), (402, 402), (500, 204)] {
            let err = ClientError::from_status(url.clone(), status, expected, None);
            assert_eq!(err.status(), Some(status));
            assert!(!matches!(err, ClientError::UnexpectedStatus { .. }));
        }

        let err = ClientError::from_status(url, 404, 200, None);
        match err {
            ClientError::UnexpectedStatus {
                status, expected, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(expected, 200);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unexpected_status_display() {
        let err = ClientError::from_status("https://example.test/x".to_string(), 404, 200, None);
        assert_eq!(
            err.to_string(),
            "status of 404 \"Not Found\" (200 \"OK\" expected) from https://example.test/x"
        );
    }

    #[test]
    fn test_vendor_message_display() {
        let err = ClientError::from_status(
            "https://example.test".to_string(),
            400,
            200,
            Some("invalid ip address".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "invalid input parameters (https://example.test): invalid ip address"
        );
        assert_eq!(err.vendor_message(), Some("invalid ip address"));

        let bare = ClientError::from_status("https://example.test".to_string(), 402, 200, None);
        assert_eq!(bare.to_string(), "credits have run out (https://example.test)");
        assert_eq!(bare.vendor_message(), None);
    }

    #[test]
    fn test_file_exists_display() {
        let err = ClientError::FileExists {
            path: PathBuf::from("/tmp/feed.csv"),
        };
        assert_eq!(err.to_string(), "file already exists: /tmp/feed.csv");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_cancelled_display() {
        let err = ClientError::Cancelled {
            url: "https://example.test".to_string(),
            reason: CancelReason::DeadlineExceeded,
        };
        assert!(err.is_cancelled());
        assert_eq!(
            err.to_string(),
            "deadline exceeded while requesting https://example.test"
        );
    }
}
