use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadOverridesError {
    #[error("failed to read title overrides: {0}")]
    Read(#[from] io::Error),

    #[error("failed to parse title overrides: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SaveOverridesError {
    #[error("failed to encode title overrides: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write title overrides: {0}")]
    Write(#[from] io::Error),
}

/// User-defined title overrides keyed by session id. An absent entry means
/// "use the upstream title"; clearing an override removes its entry. Kept
/// apart from the two read-only sources so neither a DB rebuild nor a
/// storage wipe touches user customisations.
#[derive(Debug)]
pub struct OverrideStore {
    state_dir: PathBuf,
    titles: Mutex<BTreeMap<String, String>>,
}

impl OverrideStore {
    pub fn open(state_dir: &Path) -> Result<Self, LoadOverridesError> {
        let path = overrides_path(state_dir);
        let titles = match fs::read_to_string(&path) {
            Ok(raw) => {
                let file: OverridesFile = serde_json::from_str(&raw)?;
                file.titles
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(error.into()),
        };

        Ok(Self {
            state_dir: state_dir.to_path_buf(),
            titles: Mutex::new(titles),
        })
    }

    pub fn title_override(&self, session_id: &str) -> Option<String> {
        self.lock().get(session_id).cloned()
    }

    /// `Some(title)` replaces the upstream title; `None` or a blank title
    /// clears the override, reverting to the upstream value. The lock is
    /// held across the disk write so concurrent writers serialize.
    pub fn set_title_override(
        &self,
        session_id: &str,
        title: Option<&str>,
    ) -> Result<(), SaveOverridesError> {
        let mut titles = self.lock();
        match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => {
                titles.insert(session_id.to_string(), title.to_string());
            }
            None => {
                titles.remove(session_id);
            }
        }
        self.save(&titles)
    }

    fn save(&self, titles: &BTreeMap<String, String>) -> Result<(), SaveOverridesError> {
        fs::create_dir_all(&self.state_dir)?;

        let path = overrides_path(&self.state_dir);
        let tmp = path.with_extension("json.tmp");
        let file = OverridesFile {
            version: 1,
            titles: titles.clone(),
        };
        let text = serde_json::to_string_pretty(&file)?;
        fs::write(&tmp, text)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.titles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn overrides_path(state_dir: &Path) -> PathBuf {
    state_dir.join("overrides.json")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct OverridesFile {
    version: u32,
    titles: BTreeMap<String, String>,
}
