//! Failures of the CouchDB document store.

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias for CouchDB operations.
pub type CouchResult<T> = Result<T, CouchDaoError>;

#[derive(Debug, Error)]
/// Failure raised while talking to CouchDB.
pub enum CouchDaoError {
    #[error("missing CouchDB environment variable `{var}`")]
    /// A required environment variable is unset.
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    #[error("invalid CouchDB server url `{url}`")]
    /// `COUCH_BASE_URL` is not an absolute URL.
    InvalidUrl {
        /// Rejected value.
        url: String,
        /// Underlying error.
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build CouchDB client")]
    /// The HTTP client could not be built.
    ClientBuilder {
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// Transport or body decoding failure; `action` names the step.
    #[error("CouchDB {action} failed for `{target}`")]
    Http {
        /// Operation that failed.
        action: &'static str,
        /// Resource the request targeted.
        target: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} for `{target}`")]
    /// CouchDB answered with an unexpected status.
    Status {
        /// Resource the request targeted.
        target: String,
        /// Status returned.
        status: StatusCode,
    },
    /// The room document changed between read and write (HTTP 409).
    #[error("CouchDB revision conflict on `{doc_id}`")]
    RevisionConflict {
        /// Document that changed concurrently.
        doc_id: String,
    },
}

impl CouchDaoError {
    pub(super) fn http(
        action: &'static str,
        target: impl Into<String>,
    ) -> impl FnOnce(reqwest::Error) -> Self {
        let target = target.into();
        move |source| Self::Http {
            action,
            target,
            source,
        }
    }
}
