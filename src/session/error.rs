use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Spawn, handshake or discovery failed after the retry budget was
    /// exhausted. Carries the last underlying error text.
    #[error("Provider '{provider}' failed to start: {details}")]
    Initialization { provider: String, details: String },

    #[error("Provider '{provider}' discovered no tools")]
    NoToolsDiscovered { provider: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
