use thiserror::Error;

/// Main error type for the bidding agent
#[derive(Error, Debug)]
pub enum GavelError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Input errors
    #[error("Invalid auction context: {0}")]
    InvalidContext(String),

    // Intelligence dataset errors
    #[error("Intelligence data error: {0}")]
    Intelligence(String),

    // Oracle errors (surfaced only outside the pipeline, e.g. from the CLI)
    #[error("Oracle error: {0}")]
    Oracle(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for GavelError
pub type Result<T> = std::result::Result<T, GavelError>;
