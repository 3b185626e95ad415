use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} failed: {message}")]
    Transport {
        url: String,
        message: String,
        /// Whether another attempt may succeed (connect/timeout/5xx/429).
        retryable: bool,
    },

    #[error(
        "not authenticated or session expired; refresh the `cookie` setting from a logged-in browser session"
    )]
    Auth,

    #[error("extract item {id}: {failure}")]
    Extraction {
        id: String,
        failure: ExtractionFailure,
    },

    #[error("resolve series for item {id}: {message}")]
    Resolution { id: String, message: String },

    #[error("persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport { retryable: true, .. })
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Persistence {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    /// The API answered without a body object; the primary stale-cookie signal.
    #[error("api payload has no body (not logged in or cookie expired)")]
    NotAuthenticatedOrExpired,

    #[error("malformed api payload: {0}")]
    MalformedPayload(String),

    #[error("api payload body is missing `{0}`")]
    MissingField(&'static str),

    #[error("no content found in preload data or page body")]
    NoContent,
}

impl ExtractionFailure {
    pub fn into_fetch_error(self, id: &str) -> FetchError {
        match self {
            ExtractionFailure::NotAuthenticatedOrExpired => FetchError::Auth,
            failure => FetchError::Extraction {
                id: id.to_owned(),
                failure,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_session_maps_to_auth_error() {
        let err = ExtractionFailure::NotAuthenticatedOrExpired.into_fetch_error("1");
        assert!(matches!(err, FetchError::Auth));
        assert!(err.to_string().contains("cookie"));
    }

    #[test]
    fn only_transient_transport_errors_are_retryable() {
        let transient = FetchError::Transport {
            url: "http://x".to_owned(),
            message: "timeout".to_owned(),
            retryable: true,
        };
        let permanent = FetchError::Transport {
            url: "http://x".to_owned(),
            message: "404".to_owned(),
            retryable: false,
        };
        assert!(transient.is_retryable());
        assert!(!permanent.is_retryable());
        assert!(!FetchError::Auth.is_retryable());
    }
}
