use crate::domain::{Message, SessionSource, SessionSummary};
use crate::infra::{
    ArchiveStore, OverrideStore, SaveArchiveError, SaveOverridesError, SessionStore, StoreError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ListFilter {
    pub include_archived: bool,
    pub include_subagents: bool,
}

/// One merged, sorted view of both storage shapes. Built once per process
/// (or per explicit resync) and shared immutably by concurrent readers.
#[derive(Clone, Debug, Default)]
pub struct CatalogView {
    /// All known sessions, archived ones included, sorted by last-updated
    /// descending with id as tiebreak.
    pub sessions: Vec<SessionSummary>,
    /// One entry per adapter that could not be read this fetch. The other
    /// adapter's data is still served.
    pub notices: Vec<String>,
    pub warnings: usize,
}

/// Merges the relational and legacy adapters into one deduplicated session
/// list, overlays archive state, and caches the merged view until
/// `invalidate` is called.
pub struct Catalog {
    relational: Box<dyn SessionStore>,
    legacy: Box<dyn SessionStore>,
    archive: ArchiveStore,
    overrides: OverrideStore,
    cache: RwLock<Option<Arc<CatalogView>>>,
}

impl Catalog {
    pub fn new(
        relational: Box<dyn SessionStore>,
        legacy: Box<dyn SessionStore>,
        archive: ArchiveStore,
        overrides: OverrideStore,
    ) -> Self {
        Self {
            relational,
            legacy,
            archive,
            overrides,
            cache: RwLock::new(None),
        }
    }

    /// Current merged view, built on first use. In-flight readers holding an
    /// earlier `Arc` keep seeing that view in full; a resync swaps the whole
    /// view at once.
    pub fn view(&self) -> Arc<CatalogView> {
        if let Some(view) = self.read_cache().as_ref() {
            return Arc::clone(view);
        }

        let built = Arc::new(self.build_view());
        let mut guard = self.write_cache();
        // Another request may have built the view while we did; keep the
        // first one so readers converge on a single snapshot.
        match guard.as_ref() {
            Some(existing) => Arc::clone(existing),
            None => {
                *guard = Some(Arc::clone(&built));
                built
            }
        }
    }

    /// Drop the cached view. The next fetch re-reads both adapters; used
    /// when the relational store is known to have changed underneath us.
    pub fn invalidate(&self) {
        *self.write_cache() = None;
    }

    pub fn sessions(&self, filter: &ListFilter) -> Vec<SessionSummary> {
        let view = self.view();
        let archived = self.archive.archived_ids();

        view.sessions
            .iter()
            .filter(|session| filter.include_archived || !archived.contains(&session.id))
            .filter(|session| filter.include_subagents || !session.is_subagent())
            .cloned()
            .map(|session| self.apply_overrides(session))
            .collect()
    }

    /// Distinct non-empty working directories across non-archived sessions,
    /// for the filter UI.
    pub fn directories(&self) -> BTreeSet<String> {
        let view = self.view();
        let archived = self.archive.archived_ids();

        view.sessions
            .iter()
            .filter(|session| !archived.contains(&session.id))
            .map(|session| session.directory.to_string_lossy().to_string())
            .filter(|directory| !directory.is_empty())
            .collect()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.view()
            .sessions
            .iter()
            .any(|session| session.id == session_id)
    }

    pub fn find_session(&self, session_id: &str) -> Option<SessionSummary> {
        self.view()
            .sessions
            .iter()
            .find(|session| session.id == session_id)
            .cloned()
            .map(|session| self.apply_overrides(session))
    }

    /// Title overrides are applied at read time, never baked into the
    /// cached view, so a rename shows up without a resync.
    fn apply_overrides(&self, mut session: SessionSummary) -> SessionSummary {
        if let Some(title) = self.overrides.title_override(&session.id) {
            session.title = title;
        }
        session
    }

    /// Messages for one session, routed to the adapter that owns its record.
    /// Unknown ids fall through both adapters and read as empty.
    pub fn load_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        match self.find_session(session_id).map(|session| session.source) {
            Some(SessionSource::Relational) => self.relational.load_messages(session_id),
            Some(SessionSource::Legacy) => self.legacy.load_messages(session_id),
            None => {
                if let Ok(messages) = self.relational.load_messages(session_id) {
                    if !messages.is_empty() {
                        return Ok(messages);
                    }
                }
                match self.legacy.load_messages(session_id) {
                    Ok(messages) => Ok(messages),
                    Err(_) => Ok(Vec::new()),
                }
            }
        }
    }

    pub fn is_archived(&self, session_id: &str) -> bool {
        self.archive.is_archived(session_id)
    }

    pub fn set_archived(&self, session_id: &str, archived: bool) -> Result<(), SaveArchiveError> {
        self.archive.set_archived(session_id, archived)
    }

    pub fn title_override(&self, session_id: &str) -> Option<String> {
        self.overrides.title_override(session_id)
    }

    pub fn set_title_override(
        &self,
        session_id: &str,
        title: Option<&str>,
    ) -> Result<(), SaveOverridesError> {
        self.overrides.set_title_override(session_id, title)
    }

    fn build_view(&self) -> CatalogView {
        let mut merged: BTreeMap<String, SessionSummary> = BTreeMap::new();
        let mut notices: Vec<String> = Vec::new();
        let mut warnings = 0usize;

        // Legacy first so a relational copy of the same id overwrites it.
        match self.legacy.list_sessions() {
            Ok(scan) => {
                warnings += scan.warnings.get();
                for session in scan.sessions {
                    merged.insert(session.id.clone(), session);
                }
            }
            Err(error) => notices.push(format!("legacy storage unavailable: {error}")),
        }

        match self.relational.list_sessions() {
            Ok(scan) => {
                warnings += scan.warnings.get();
                for session in scan.sessions {
                    merged.insert(session.id.clone(), session);
                }
            }
            Err(error) => notices.push(format!("OpenCode DB unavailable: {error}")),
        }

        let mut sessions: Vec<SessionSummary> = merged.into_values().collect();
        sessions.sort_by(|a, b| {
            b.time_updated_ms
                .unwrap_or(0)
                .cmp(&a.time_updated_ms.unwrap_or(0))
                .then_with(|| a.id.cmp(&b.id))
        });

        CatalogView {
            sessions,
            notices,
            warnings,
        }
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, Option<Arc<CatalogView>>> {
        self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, Option<Arc<CatalogView>>> {
        self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Part, Role};
    use crate::infra::{ScanWarningCount, StoreScan};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct StubStore {
        sessions: Mutex<Vec<SessionSummary>>,
        messages: BTreeMap<String, Vec<Message>>,
        unavailable: bool,
    }

    impl StubStore {
        fn new(sessions: Vec<SessionSummary>) -> Self {
            Self {
                sessions: Mutex::new(sessions),
                messages: BTreeMap::new(),
                unavailable: false,
            }
        }

        fn unavailable() -> Self {
            Self {
                sessions: Mutex::new(Vec::new()),
                messages: BTreeMap::new(),
                unavailable: true,
            }
        }

        fn with_messages(mut self, session_id: &str, messages: Vec<Message>) -> Self {
            self.messages.insert(session_id.to_string(), messages);
            self
        }
    }

    impl SessionStore for StubStore {
        fn list_sessions(&self) -> Result<StoreScan, StoreError> {
            if self.unavailable {
                return Err(StoreError::SourceUnavailable("stub down".to_string()));
            }
            let guard = self.sessions.lock().expect("lock");
            Ok(StoreScan {
                sessions: guard.clone(),
                warnings: ScanWarningCount::from(0usize),
            })
        }

        fn load_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
            if self.unavailable {
                return Err(StoreError::SourceUnavailable("stub down".to_string()));
            }
            Ok(self.messages.get(session_id).cloned().unwrap_or_default())
        }
    }

    fn session(id: &str, source: SessionSource, updated: i64) -> SessionSummary {
        SessionSummary {
            id: id.to_string(),
            title: format!("session {id}"),
            directory: PathBuf::from(format!("/proj/{id}")),
            parent_id: None,
            model: "Unknown".to_string(),
            time_created_ms: Some(1),
            time_updated_ms: Some(updated),
            source,
        }
    }

    fn text_message(id: &str, text: &str) -> Message {
        Message {
            id: id.to_string(),
            role: Role::User,
            time_created_ms: Some(1_000),
            parts: vec![Part::Text {
                text: text.to_string(),
            }],
        }
    }

    fn archive(dir: &std::path::Path) -> ArchiveStore {
        ArchiveStore::open(dir).expect("archive")
    }

    fn overrides(dir: &std::path::Path) -> OverrideStore {
        OverrideStore::open(dir).expect("overrides")
    }

    #[test]
    fn merge_prefers_the_relational_copy_on_id_collision() {
        let dir = tempdir().expect("tempdir");
        let relational = StubStore::new(vec![session("dup", SessionSource::Relational, 50)]);
        let legacy = StubStore::new(vec![
            session("dup", SessionSource::Legacy, 40),
            session("leg-only", SessionSource::Legacy, 30),
        ]);
        let catalog = Catalog::new(
            Box::new(relational),
            Box::new(legacy),
            archive(dir.path()),
            overrides(dir.path()),
        );

        let sessions = catalog.sessions(&ListFilter::default());
        assert_eq!(sessions.len(), 2);
        let dup = sessions.iter().find(|s| s.id == "dup").expect("dup");
        assert_eq!(dup.source, SessionSource::Relational);
        assert_eq!(dup.time_updated_ms, Some(50));
    }

    #[test]
    fn sessions_are_sorted_by_updated_desc_with_id_tiebreak() {
        let dir = tempdir().expect("tempdir");
        let relational = StubStore::new(vec![
            session("b", SessionSource::Relational, 10),
            session("a", SessionSource::Relational, 10),
            session("c", SessionSource::Relational, 99),
        ]);
        let legacy = StubStore::new(Vec::new());
        let catalog = Catalog::new(
            Box::new(relational),
            Box::new(legacy),
            archive(dir.path()),
            overrides(dir.path()),
        );

        let ids: Vec<String> = catalog
            .sessions(&ListFilter::default())
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn adapter_failure_produces_one_notice_and_serves_the_other_source() {
        let dir = tempdir().expect("tempdir");
        let relational = StubStore::unavailable();
        let legacy = StubStore::new(vec![session("leg", SessionSource::Legacy, 30)]);
        let catalog = Catalog::new(
            Box::new(relational),
            Box::new(legacy),
            archive(dir.path()),
            overrides(dir.path()),
        );

        let view = catalog.view();
        assert_eq!(view.sessions.len(), 1);
        assert_eq!(view.notices.len(), 1);
        assert!(view.notices[0].contains("OpenCode DB unavailable"));
    }

    #[test]
    fn archived_sessions_are_filtered_unless_requested() {
        let dir = tempdir().expect("tempdir");
        let relational = StubStore::new(vec![
            session("a", SessionSource::Relational, 50),
            session("b", SessionSource::Relational, 40),
        ]);
        let catalog = Catalog::new(
            Box::new(relational),
            Box::new(StubStore::new(Vec::new())),
            archive(dir.path()),
            overrides(dir.path()),
        );

        catalog.set_archived("a", true).expect("archive");

        let visible: Vec<String> = catalog
            .sessions(&ListFilter::default())
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(visible, vec!["b"]);

        let all: Vec<String> = catalog
            .sessions(&ListFilter {
                include_archived: true,
                include_subagents: false,
            })
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(all, vec!["a", "b"]);
    }

    #[test]
    fn subagents_are_filtered_unless_requested() {
        let dir = tempdir().expect("tempdir");
        let mut sub = session("sub", SessionSource::Relational, 50);
        sub.parent_id = Some("root".to_string());
        let relational = StubStore::new(vec![sub, session("root", SessionSource::Relational, 40)]);
        let catalog = Catalog::new(
            Box::new(relational),
            Box::new(StubStore::new(Vec::new())),
            archive(dir.path()),
            overrides(dir.path()),
        );

        let visible: Vec<String> = catalog
            .sessions(&ListFilter::default())
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(visible, vec!["root"]);

        let all = catalog.sessions(&ListFilter {
            include_archived: false,
            include_subagents: true,
        });
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn directories_are_distinct_and_skip_archived() {
        let dir = tempdir().expect("tempdir");
        let mut same_dir = session("a2", SessionSource::Relational, 20);
        same_dir.directory = PathBuf::from("/proj/a");
        let relational = StubStore::new(vec![session("a", SessionSource::Relational, 50), same_dir]);
        let legacy = StubStore::new(vec![session("b", SessionSource::Legacy, 30)]);
        let catalog = Catalog::new(
            Box::new(relational),
            Box::new(legacy),
            archive(dir.path()),
            overrides(dir.path()),
        );

        let dirs = catalog.directories();
        assert_eq!(
            dirs.into_iter().collect::<Vec<_>>(),
            vec!["/proj/a".to_string(), "/proj/b".to_string()]
        );

        catalog.set_archived("b", true).expect("archive");
        assert!(!catalog.directories().contains("/proj/b"));
    }

    #[test]
    fn cached_view_is_reused_until_invalidated() {
        let dir = tempdir().expect("tempdir");
        let relational = StubStore::new(vec![session("a", SessionSource::Relational, 50)]);
        let catalog = Catalog::new(
            Box::new(relational),
            Box::new(StubStore::new(Vec::new())),
            archive(dir.path()),
            overrides(dir.path()),
        );

        let first = catalog.view();
        let second = catalog.view();
        assert!(Arc::ptr_eq(&first, &second));

        catalog.invalidate();
        let third = catalog.view();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(first.sessions, third.sessions);
    }

    #[test]
    fn load_messages_routes_to_the_owning_adapter() {
        let dir = tempdir().expect("tempdir");
        let relational = StubStore::new(vec![session("dup", SessionSource::Relational, 50)])
            .with_messages("dup", vec![text_message("m-rel", "relational copy")]);
        let legacy = StubStore::new(vec![session("dup", SessionSource::Legacy, 40)])
            .with_messages("dup", vec![text_message("m-leg", "legacy copy")]);
        let catalog = Catalog::new(
            Box::new(relational),
            Box::new(legacy),
            archive(dir.path()),
            overrides(dir.path()),
        );

        let messages = catalog.load_messages("dup").expect("load");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m-rel");
    }

    #[test]
    fn load_messages_for_unknown_id_reads_as_empty() {
        let dir = tempdir().expect("tempdir");
        let catalog = Catalog::new(
            Box::new(StubStore::unavailable()),
            Box::new(StubStore::new(Vec::new())),
            archive(dir.path()),
            overrides(dir.path()),
        );
        let messages = catalog.load_messages("ghost").expect("load");
        assert!(messages.is_empty());
    }

    #[test]
    fn title_override_applies_without_a_resync_and_clears() {
        let dir = tempdir().expect("tempdir");
        let relational = StubStore::new(vec![session("a", SessionSource::Relational, 50)]);
        let catalog = Catalog::new(
            Box::new(relational),
            Box::new(StubStore::new(Vec::new())),
            archive(dir.path()),
            overrides(dir.path()),
        );

        // Populate the cached view before the rename.
        assert_eq!(catalog.sessions(&ListFilter::default())[0].title, "session a");

        catalog.set_title_override("a", Some("renamed")).expect("set");
        assert_eq!(catalog.sessions(&ListFilter::default())[0].title, "renamed");
        assert_eq!(
            catalog.find_session("a").expect("find").title,
            "renamed"
        );

        catalog.set_title_override("a", None).expect("clear");
        assert_eq!(catalog.sessions(&ListFilter::default())[0].title, "session a");
        assert_eq!(catalog.title_override("a"), None);
    }
}
