use thiserror::Error;

#[derive(Error, Debug)]
pub enum CivicRagError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Text generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CivicRagError {
    /// Whether the failed operation is worth retrying after backoff.
    ///
    /// Embedding-model and generation outages are transient; validation
    /// failures are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable(_) | Self::GenerationUnavailable(_) | Self::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CivicRagError>;
