use thiserror::Error;

pub type BloomResult<T> = std::result::Result<T, BloomError>;

/// Error returned by a [`BitProvider`](super::BitProvider) implementation.
///
/// Carried unchanged inside [`BloomError::Provider`].
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum BloomError {
    #[error("Bit size {bits} out of range, expected {min} <= bits <= {max}")]
    SizeOutOfRange { bits: usize, min: usize, max: usize },

    #[error("Buffer too small: need {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("Provider contract violated: {0}")]
    ProviderContract(String),

    #[error("Digest function produced no offsets")]
    EmptyDigest,

    #[error(
        "Hash seed table exhausted: {required} offsets required, \
         only {produced} produced"
    )]
    SeedTableExhausted { required: usize, produced: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider error: {0}")]
    Provider(#[source] ProviderError),

    #[error("Storage backend error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Digest error: {0}")]
    DigestError(String),

    #[error("Filter has been disposed")]
    Disposed,
}

impl From<serde_json::Error> for BloomError {
    fn from(err: serde_json::Error) -> Self {
        BloomError::SerializationError(err.to_string())
    }
}
