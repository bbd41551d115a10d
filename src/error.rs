//! Error types for dpseg.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DpsegError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Input errors
    #[error("Cannot open input file {path}")]
    InputOpen { path: String },

    #[error("Malformed index file {path}: {message}")]
    IndexFormat { path: String, message: String },

    #[error("Malformed feature data in {path}: {message}")]
    FeatureData { path: String, message: String },

    #[error("No bounds were loaded from the input list")]
    EmptyCorpus,

    // Sampler state errors
    #[error("Cannot remove segment {tag} frame {start} to frame {end} from cluster {cluster}")]
    Bookkeeping {
        tag: String,
        start: usize,
        end: usize,
        cluster: String,
    },

    // Persistence errors
    #[error("Snapshot error: {message}")]
    Snapshot { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, DpsegError>;
