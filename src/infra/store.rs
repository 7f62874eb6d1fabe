use crate::domain::{Message, SessionSummary};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScanWarningCount(usize);

impl From<usize> for ScanWarningCount {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl ScanWarningCount {
    pub fn get(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to read session data: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse session data: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug)]
pub struct StoreScan {
    pub sessions: Vec<SessionSummary>,
    /// Entries skipped because a single row or file was unreadable. The scan
    /// itself still succeeds; partially written logs are a valid state.
    pub warnings: ScanWarningCount,
}

/// Read-only capability set shared by both storage shapes. The catalog is
/// the only component that knows two implementations exist.
pub trait SessionStore: Send + Sync {
    fn list_sessions(&self) -> Result<StoreScan, StoreError>;

    /// Ordered messages for one session. An id the store does not know, or a
    /// session whose message data is missing, yields an empty sequence
    /// rather than an error.
    fn load_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError>;
}
