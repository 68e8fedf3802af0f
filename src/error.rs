/// Error types for deck building operations
#[derive(thiserror::Error, Debug)]
pub enum DeckError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("External tool failed: {0}")]
    ExternalTool(String),

    #[error("{failed} of {total} clips failed to extract")]
    ClipFailures { failed: usize, total: usize },
}
