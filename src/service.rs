use crate::catalog::{Catalog, ListFilter};
use crate::domain::{SearchResult, SessionExport, SessionSummary};
use crate::infra::{
    ArchiveStore, LegacyTree, LoadArchiveError, LoadOverridesError, OpenCodeDb, OverrideStore,
    ResolveLegacyStorageDirError, ResolveOpenCodeDbPathError, ResolveStateDirError,
    SaveArchiveError, SaveOverridesError, StoreError, resolve_ocbox_state_dir,
};
use crate::search::{SearchError, SearchOptions, search_catalog};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenServiceError {
    #[error(transparent)]
    ResolveDbPath(#[from] ResolveOpenCodeDbPathError),

    #[error(transparent)]
    ResolveLegacyDir(#[from] ResolveLegacyStorageDirError),

    #[error(transparent)]
    ResolveStateDir(#[from] ResolveStateDirError),

    #[error(transparent)]
    LoadArchive(#[from] LoadArchiveError),

    #[error(transparent)]
    LoadOverrides(#[from] LoadOverridesError),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Archive(#[from] SaveArchiveError),

    #[error(transparent)]
    Overrides(#[from] SaveOverridesError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The boundary the presentation layer calls. Everything here is scoped to
/// one request; no failure is fatal to the hosting process.
pub struct SessionService {
    catalog: Catalog,
}

impl SessionService {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Wire up the default storage locations (or their environment
    /// overrides) and the persisted archive overlay.
    pub fn open_default() -> Result<Self, OpenServiceError> {
        let relational = OpenCodeDb::resolve_default()?;
        let legacy = LegacyTree::resolve_default()?;
        let state_dir = resolve_ocbox_state_dir()?;
        let archive = ArchiveStore::open(&state_dir)?;
        let overrides = OverrideStore::open(&state_dir)?;
        Ok(Self::new(Catalog::new(
            Box::new(relational),
            Box::new(legacy),
            archive,
            overrides,
        )))
    }

    pub fn sessions(&self, filter: &ListFilter) -> Vec<SessionSummary> {
        self.catalog.sessions(filter)
    }

    pub fn directories(&self) -> BTreeSet<String> {
        self.catalog.directories()
    }

    pub fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        search_catalog(&self.catalog, query, options)
    }

    pub fn is_archived(&self, session_id: &str) -> bool {
        self.catalog.is_archived(session_id)
    }

    /// Toggle the archive overlay for a known session. Unknown ids are
    /// reported, not fatal; re-applying the current state succeeds.
    pub fn set_archived(&self, session_id: &str, archived: bool) -> Result<(), ServiceError> {
        if !self.catalog.contains(session_id) {
            return Err(ServiceError::NotFound(session_id.to_string()));
        }
        self.catalog.set_archived(session_id, archived)?;
        Ok(())
    }

    pub fn title_override(&self, session_id: &str) -> Option<String> {
        self.catalog.title_override(session_id)
    }

    /// Set or clear the user-defined title for a known session. `None`
    /// reverts to the upstream title.
    pub fn set_title(&self, session_id: &str, title: Option<&str>) -> Result<(), ServiceError> {
        if !self.catalog.contains(session_id) {
            return Err(ServiceError::NotFound(session_id.to_string()));
        }
        self.catalog.set_title_override(session_id, title)?;
        Ok(())
    }

    /// Full session payload for the timeline view.
    pub fn export(&self, session_id: &str) -> Result<SessionExport, ServiceError> {
        let Some(summary) = self.catalog.find_session(session_id) else {
            return Err(ServiceError::NotFound(session_id.to_string()));
        };
        let messages = self.catalog.load_messages(session_id)?;
        Ok(SessionExport { summary, messages })
    }

    /// Resync signal from the operational boundary: drop the cached merged
    /// view so the next fetch re-reads both sources.
    pub fn invalidate(&self) {
        self.catalog.invalidate()
    }

    /// Source-availability notices recorded on the current merged view.
    pub fn notices(&self) -> Vec<String> {
        self.catalog.view().notices.clone()
    }
}
