use thiserror::Error;

/// Ocibom error types
#[derive(Error, Debug)]
pub enum BomError {
    /// Malformed or unusable image reference
    #[error("Image reference error: {0}")]
    Reference(String),

    /// Remote registry operation failed
    #[error("Registry error: {registry}: {message}")]
    Registry { registry: String, message: String },

    /// Tarball extraction failed
    #[error("Extraction error: {0}")]
    Extract(String),

    /// Archive entry tried to escape its extraction root (Zip-Slip)
    #[error("{0}: illegal file path")]
    IllegalPath(String),

    /// Docker archive manifest missing or malformed
    #[error("Archive manifest error: {0}")]
    Manifest(String),

    /// Directory scan failed
    #[error("Scan error: {0}")]
    Scan(String),

    /// License classification failed
    #[error("License error: {0}")]
    License(String),

    /// Go module handling failed
    #[error("Go module error: {0}")]
    GoModule(String),

    /// Worker pool failure
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for BomError {
    fn from(err: serde_json::Error) -> Self {
        BomError::Serialization(err.to_string())
    }
}

/// Result type alias for ocibom operations
pub type Result<T> = std::result::Result<T, BomError>;
