use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Which storage shape a session record was read from. When the same id
/// exists in both, the relational copy wins and the legacy one is dropped.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    Relational,
    Legacy,
}

impl SessionSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Relational => "db",
            Self::Legacy => "legacy",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub directory: PathBuf,
    pub parent_id: Option<String>,
    pub model: String,
    pub time_created_ms: Option<i64>,
    pub time_updated_ms: Option<i64>,
    pub source: SessionSource,
}

impl SessionSummary {
    /// Subagent sessions are spawned by another session: either they carry a
    /// parent id or the producer titled them as subagent work.
    pub fn is_subagent(&self) -> bool {
        self.parent_id.is_some() || self.title.to_lowercase().contains("subagent")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub time_created_ms: Option<i64>,
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    ToolCall {
        tool: String,
        input: Value,
        output: Option<String>,
    },
    StepStart,
    StepFinish {
        tokens: TokenUsage,
    },
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub reasoning: u64,
    pub cache_read: u64,
    pub cache_write: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.reasoning)
            .saturating_add(self.cache_read)
            .saturating_add(self.cache_write)
    }
}

/// Full session payload handed to the presentation boundary.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionExport {
    pub summary: SessionSummary,
    pub messages: Vec<Message>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchMatch {
    pub message_id: String,
    pub role: Role,
    pub snippet: String,
    pub time_created_ms: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResult {
    pub session_id: String,
    pub title: String,
    pub directory: PathBuf,
    pub time_updated_ms: Option<i64>,
    /// Capped at a fixed number of entries per session; `total_matches`
    /// reports the true count so the boundary can show "+N more".
    pub matches: Vec<SearchMatch>,
    pub total_matches: usize,
}
