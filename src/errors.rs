//! Typed error hierarchy for the recipe feed.
//!
//! Four top-level enums cover the subsystems that talk to the outside world:
//! - `ConfigError`: environment configuration problems
//! - `BackendError`: database, auth and object storage calls
//! - `GeminiError`: generative AI calls
//! - `StoreError`: the durable backing of the local recipe cache
//!
//! Authentication failures are not errors; see [`crate::auth::AuthFailure`].

use thiserror::Error;

/// Errors raised while resolving configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {name}")]
    Missing { name: &'static str },

    #[error("Invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Errors from the backend-as-a-service (rows, RPC, auth, storage).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend is not configured")]
    NotConfigured,

    #[error("Backend request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err)
        }
    }
}

/// Errors from the generative AI integration.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("GEMINI_API_KEY or GOOGLE_API_KEY environment variable is required")]
    MissingApiKey,

    #[error("Gemini API request failed ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("{context} was blocked by Gemini: {reason}")]
    Blocked { context: String, reason: String },

    #[error("Gemini did not return text for: {context}")]
    EmptyText { context: String },

    #[error("Failed to parse recipe JSON: {message}\nRaw output:\n{raw}")]
    InvalidRecipe { message: String, raw: String },

    #[error("Gemini request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors from the durable backing of the recipe cache.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to encode cached recipe: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to prepare cache location: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache lock poisoned")]
    LockPoisoned,
}
