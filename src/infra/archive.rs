use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveStateDirError {
    #[error("home directory not found")]
    HomeDirNotFound,
}

pub fn resolve_ocbox_state_dir() -> Result<PathBuf, ResolveStateDirError> {
    if let Some(override_dir) = std::env::var_os("OCBOX_STATE_DIR") {
        return Ok(PathBuf::from(override_dir));
    }
    let Some(home) = dirs::home_dir() else {
        return Err(ResolveStateDirError::HomeDirNotFound);
    };
    Ok(home.join(".ocbox"))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub archived: bool,
    pub updated_unix_ms: i64,
}

#[derive(Debug, Error)]
pub enum LoadArchiveError {
    #[error("failed to read archive state: {0}")]
    Read(#[from] io::Error),

    #[error("failed to parse archive state: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SaveArchiveError {
    #[error("failed to encode archive state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write archive state: {0}")]
    Write(#[from] io::Error),
}

/// Last-write-wins overlay recording which session ids are archived. Lives
/// entirely outside the two read-only sources so upstream rows and files are
/// never mutated, and survives either source going away.
#[derive(Debug)]
pub struct ArchiveStore {
    state_dir: PathBuf,
    entries: Mutex<BTreeMap<String, ArchiveEntry>>,
}

impl ArchiveStore {
    pub fn open(state_dir: &Path) -> Result<Self, LoadArchiveError> {
        let path = archive_path(state_dir);
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => {
                let file: ArchiveFile = serde_json::from_str(&raw)?;
                file.entries
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(error.into()),
        };

        Ok(Self {
            state_dir: state_dir.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    pub fn is_archived(&self, session_id: &str) -> bool {
        self.lock()
            .get(session_id)
            .is_some_and(|entry| entry.archived)
    }

    pub fn archived_ids(&self) -> BTreeSet<String> {
        self.lock()
            .iter()
            .filter(|(_, entry)| entry.archived)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Idempotent: setting the current state again succeeds and refreshes
    /// the stored timestamp. The lock is held across the disk write so
    /// concurrent writers serialize and the file reflects the winning write.
    pub fn set_archived(&self, session_id: &str, archived: bool) -> Result<(), SaveArchiveError> {
        let mut entries = self.lock();
        entries.insert(
            session_id.to_string(),
            ArchiveEntry {
                archived,
                updated_unix_ms: now_unix_ms(),
            },
        );
        self.save(&entries)
    }

    fn save(&self, entries: &BTreeMap<String, ArchiveEntry>) -> Result<(), SaveArchiveError> {
        fs::create_dir_all(&self.state_dir)?;

        let path = archive_path(&self.state_dir);
        let tmp = path.with_extension("json.tmp");
        let file = ArchiveFile {
            version: 1,
            entries: entries.clone(),
        };
        let text = serde_json::to_string_pretty(&file)?;
        fs::write(&tmp, text)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ArchiveEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn archive_path(state_dir: &Path) -> PathBuf {
    state_dir.join("archive.json")
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|delta| i64::try_from(delta.as_millis()).ok())
        .unwrap_or(0)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ArchiveFile {
    version: u32,
    entries: BTreeMap<String, ArchiveEntry>,
}
