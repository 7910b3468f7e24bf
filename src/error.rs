//! Error types for the cashbook agent

use thiserror::Error;

/// Result type alias for dispatcher and store operations
pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {

    // =============================
    // Input Errors
    // =============================

    #[error("Sorry, I didn't recognize you")]
    UnrecognizedOwner,

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("There are no entries yet")]
    NoEntries,

    // =============================
    // Store Errors
    // =============================

    #[error("Conversation state error: {0}")]
    StateError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    // =============================
    // Rendering / Transport / Setup
    // =============================

    #[error("Report rendering error: {0}")]
    RenderError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Reject the empty owner identifier every store operation refuses
pub fn require_owner(owner: &str) -> Result<()> {
    if owner.is_empty() {
        Err(BotError::UnrecognizedOwner)
    } else {
        Ok(())
    }
}
