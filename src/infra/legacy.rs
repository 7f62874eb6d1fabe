use crate::domain::{
    Message, SessionSource, SessionSummary, message_time_created_ms, model_name_from_message,
    parse_part_value, parse_role_value,
};
use crate::infra::{ScanWarningCount, SessionStore, StoreError, StoreScan};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ResolveLegacyStorageDirError {
    #[error("home directory not found")]
    HomeDirNotFound,
}

pub fn resolve_legacy_storage_dir() -> Result<PathBuf, ResolveLegacyStorageDirError> {
    if let Some(override_dir) = std::env::var_os("OCBOX_LEGACY_STORAGE_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    if let Some(xdg_data_home) = std::env::var_os("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg_data_home).join("opencode").join("storage"));
    }

    let Some(home) = dirs::home_dir() else {
        return Err(ResolveLegacyStorageDirError::HomeDirNotFound);
    };

    Ok(home
        .join(".local")
        .join("share")
        .join("opencode")
        .join("storage"))
}

/// Read-only adapter over the legacy per-entity JSON file tree:
///
/// ```text
/// <root>/session/info/<session_id>.json
/// <root>/session/message/<session_id>/<message_id>.json
/// <root>/session/part/<session_id>/<message_id>/<part_id>.json
/// ```
///
/// A session exists iff its info file parses. Message and part directories
/// may be missing entirely; a crashed producer leaves partial trees behind
/// and those read as empty, not as errors.
#[derive(Clone, Debug)]
pub struct LegacyTree {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct LegacyInfoFile {
    id: String,
    title: Option<String>,
    directory: Option<String>,
    #[serde(rename = "parentID")]
    parent_id: Option<String>,
    time: Option<LegacyTimeStamps>,
}

#[derive(Debug, Deserialize)]
struct LegacyTimeStamps {
    created: Option<i64>,
    updated: Option<i64>,
}

impl LegacyTree {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn resolve_default() -> Result<Self, ResolveLegacyStorageDirError> {
        Ok(Self::new(resolve_legacy_storage_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn info_dir(&self) -> PathBuf {
        self.root.join("session").join("info")
    }

    fn message_dir(&self, session_id: &str) -> PathBuf {
        self.root.join("session").join("message").join(session_id)
    }

    fn part_dir(&self, session_id: &str, message_id: &str) -> PathBuf {
        self.root
            .join("session")
            .join("part")
            .join(session_id)
            .join(message_id)
    }

    fn scan_session_info(&self, path: &Path) -> Result<SessionSummary, StoreError> {
        let raw = fs::read_to_string(path)?;
        let info: LegacyInfoFile = serde_json::from_str(&raw)?;

        let (time_created_ms, time_updated_ms) = match &info.time {
            Some(time) => (time.created, time.updated),
            None => (None, None),
        };

        let model = self
            .model_from_messages(&info.id)
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(SessionSummary {
            title: info
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "(untitled)".to_string()),
            directory: PathBuf::from(info.directory.unwrap_or_default()),
            parent_id: info.parent_id,
            model,
            time_created_ms,
            time_updated_ms,
            source: SessionSource::Legacy,
            id: info.id,
        })
    }

    /// First model id found in the session's message files, if any.
    fn model_from_messages(&self, session_id: &str) -> Option<String> {
        for value in read_json_dir(&self.message_dir(session_id)).ok()? {
            if let Some(model) = model_name_from_message(&value.1) {
                return Some(model);
            }
        }
        None
    }
}

/// JSON files of one directory in deterministic (file name) order. A missing
/// directory reads as empty.
fn read_json_dir(dir: &Path) -> io::Result<Vec<(String, Value)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error),
    };

    let mut values: Vec<(String, Value)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let Ok(raw) = fs::read_to_string(&path) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        values.push((stem.to_string(), value));
    }

    values.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(values)
}

impl SessionStore for LegacyTree {
    fn list_sessions(&self) -> Result<StoreScan, StoreError> {
        if !self.root.exists() {
            return Err(StoreError::SourceUnavailable(format!(
                "legacy storage not found: {}",
                self.root.display()
            )));
        }

        let info_dir = self.info_dir();
        if !info_dir.exists() {
            // Root exists but holds no sessions yet.
            return Ok(StoreScan {
                sessions: Vec::new(),
                warnings: ScanWarningCount::from(0usize),
            });
        }

        let mut sessions: Vec<SessionSummary> = Vec::new();
        let mut warnings = 0usize;

        let walker = WalkDir::new(&info_dir)
            .max_depth(1)
            .follow_links(false)
            .into_iter();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_error) => {
                    warnings += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match self.scan_session_info(entry.path()) {
                Ok(summary) => sessions.push(summary),
                Err(_) => warnings += 1,
            }
        }

        Ok(StoreScan {
            sessions,
            warnings: ScanWarningCount::from(warnings),
        })
    }

    fn load_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let mut messages: Vec<Message> = Vec::new();

        for (message_id, data) in read_json_dir(&self.message_dir(session_id))? {
            let parts = read_json_dir(&self.part_dir(session_id, &message_id))?
                .iter()
                .filter_map(|(_, value)| parse_part_value(value))
                .collect();

            messages.push(Message {
                role: parse_role_value(&data),
                time_created_ms: message_time_created_ms(&data),
                id: message_id,
                parts,
            });
        }

        messages.sort_by(|a, b| {
            a.time_created_ms
                .unwrap_or(0)
                .cmp(&b.time_created_ms.unwrap_or(0))
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(messages)
    }
}
