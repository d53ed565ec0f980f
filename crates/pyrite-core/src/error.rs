use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The error vocabulary shared across the node.
///
/// Validation outcomes that callers are expected to branch on (block
/// addition, transaction execution) are NOT errors; they are expressed as
/// `AdditionResult` and `TransactionStatus` values. These variants cover the
/// genuinely exceptional paths.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("file not accessible: {0}")]
    InaccessibleFile(String),

    #[error("parsing failed: {0}")]
    Parsing(String),

    #[error("crypto failure: {0}")]
    Crypto(String),

    #[error("logic error: {0}")]
    Logic(String),

    #[error("database failure: {0}")]
    Database(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Unrecoverable consensus-layer corruption: difficulty arithmetic
    /// overflow or an inconsistent persistent store. The node must stop.
    #[error("fatal consensus error: {0}")]
    FatalConsensus(String),
}

impl From<pyrite_crypto::CryptoError> for Error {
    fn from(e: pyrite_crypto::CryptoError) -> Self {
        match e {
            pyrite_crypto::CryptoError::KeyFile(msg) => Error::InaccessibleFile(msg),
            other => Error::Crypto(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parsing(e.to_string())
    }
}
