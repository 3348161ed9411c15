use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
/// Failure raised while talking to MongoDB.
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    /// A required environment variable is unset.
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    #[error("invalid MongoDB connection URI `{uri}`")]
    /// `MONGO_URI` could not be parsed.
    InvalidUri {
        /// Rejected value.
        uri: String,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client")]
    /// The driver rejected the parsed options.
    ClientConstruction {
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    #[error("MongoDB did not answer ping after {attempts} attempt(s)")]
    /// The server never answered the startup ping.
    Unreachable {
        /// Connection attempts made.
        attempts: u32,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    #[error("MongoDB health ping failed")]
    /// A periodic health ping failed.
    HealthPing {
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    #[error("failed to create the `{index}` index")]
    /// Index creation failed.
    EnsureIndex {
        /// Index being created.
        index: &'static str,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    /// `action` is one of read, list or write.
    #[error("MongoDB {action} failed for `{path}`")]
    Document {
        /// Operation that failed.
        action: &'static str,
        /// Document path involved.
        path: String,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    /// Transactions need the server to run as a replica set.
    #[error("MongoDB transaction failed during {stage}")]
    Transaction {
        /// Step of the transaction that failed.
        stage: &'static str,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
}

impl MongoDaoError {
    pub(super) fn document(
        action: &'static str,
        path: impl ToString,
    ) -> impl FnOnce(MongoError) -> Self {
        let path = path.to_string();
        move |source| Self::Document {
            action,
            path,
            source,
        }
    }
}
