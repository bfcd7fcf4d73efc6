// Consider using the 'thiserror' crate if it simplifies things.
// For now, a manual definition:

/// Errors surfaced by the log manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// The log codec could not parse a persisted line. Recovery over a log
    /// containing such a line is unsafe, so this aborts the caller.
    MalformedRecord(String),
    /// A log record could not be rendered to its line form.
    Serialization(String),
    /// The storage engine refused a `page_write` during redo.
    StorageUnavailable(String),
    /// A forward operation or recovery ran before `set_storage_engine`.
    EngineNotSet,
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::MalformedRecord(s) => write!(f, "Malformed log record: {s}"),
            LogError::Serialization(s) => write!(f, "Serialization Error: {s}"),
            LogError::StorageUnavailable(s) => write!(f, "Storage Unavailable: {s}"),
            LogError::EngineNotSet => write!(f, "No storage engine bound to the log manager"),
        }
    }
}

impl std::error::Error for LogError {}
