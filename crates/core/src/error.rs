/// Result alias that carries the custom [`PocketError`] type.
pub type Result<T> = std::result::Result<T, PocketError>;

/// Common error type for the core crate.
///
/// Runtime operations on the clock, queue and animators never produce one of
/// these; only configuration loading and store writes can fail.
#[derive(Debug, thiserror::Error)]
pub enum PocketError {
    /// Free-form failure reported by a collaborator such as a store backend.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON in a configuration file or stored value.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl PocketError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}
