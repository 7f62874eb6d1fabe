use crate::catalog::{Catalog, ListFilter};
use crate::domain::{
    SNIPPET_LENGTH, SearchMatch, SearchResult, build_snippet, searchable_message_text,
};
use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Special regex-mode query that matches every message of every candidate
/// session; used when only a directory filter is supplied.
pub const WILDCARD_QUERY: &str = "*";

pub const MAX_MATCHES_PER_SESSION: usize = 3;
pub const DEFAULT_RESULT_LIMIT: usize = 50;

#[derive(Clone, Debug)]
pub struct SearchOptions {
    /// Substring filter on the session working directory.
    pub directory: Option<String>,
    pub regex: bool,
    /// Maximum number of sessions returned.
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            directory: None,
            regex: false,
            limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

#[derive(Debug)]
enum Matcher {
    Everything,
    Pattern(Regex),
}

impl Matcher {
    fn compile(query: &str, regex_mode: bool) -> Result<Self, SearchError> {
        if regex_mode && query == WILDCARD_QUERY {
            return Ok(Self::Everything);
        }

        // Plaintext substring search goes through an escaped pattern too so
        // case-insensitive match offsets are exact byte offsets.
        let source = if regex_mode {
            query.to_string()
        } else {
            regex::escape(query)
        };
        let pattern = RegexBuilder::new(&source).case_insensitive(true).build()?;
        Ok(Self::Pattern(pattern))
    }

    fn find(&self, content: &str) -> Option<(usize, usize)> {
        match self {
            Self::Everything => Some((0, 0)),
            Self::Pattern(pattern) => pattern.find(content).map(|m| (m.start(), m.end())),
        }
    }
}

/// Run a query over every non-archived session's message content. Results
/// inherit the catalog's ordering (last-updated descending, id tiebreak);
/// matches within a session stay in message order.
pub fn search_catalog(
    catalog: &Catalog,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, SearchError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let matcher = Matcher::compile(query, options.regex)?;

    let candidates = catalog.sessions(&ListFilter {
        include_archived: false,
        include_subagents: true,
    });

    let mut results: Vec<SearchResult> = Vec::new();
    for session in candidates {
        if results.len() >= options.limit {
            break;
        }

        if let Some(filter) = &options.directory {
            if !session.directory.to_string_lossy().contains(filter.as_str()) {
                continue;
            }
        }

        // A session whose messages cannot be read is a non-match, never a
        // failure of the whole query.
        let messages = match catalog.load_messages(&session.id) {
            Ok(messages) => messages,
            Err(_) => continue,
        };

        let mut matches: Vec<SearchMatch> = Vec::new();
        let mut total_matches = 0usize;

        for message in &messages {
            let Some(content) = searchable_message_text(message) else {
                continue;
            };
            let Some((start, end)) = matcher.find(&content) else {
                continue;
            };

            total_matches += 1;
            if matches.len() < MAX_MATCHES_PER_SESSION {
                matches.push(SearchMatch {
                    message_id: message.id.clone(),
                    role: message.role,
                    snippet: build_snippet(&content, start, end, SNIPPET_LENGTH),
                    time_created_ms: message.time_created_ms,
                });
            }
        }

        if total_matches == 0 {
            continue;
        }

        results.push(SearchResult {
            session_id: session.id,
            title: session.title,
            directory: session.directory,
            time_updated_ms: session.time_updated_ms,
            matches,
            total_matches,
        });
    }

    Ok(results)
}
