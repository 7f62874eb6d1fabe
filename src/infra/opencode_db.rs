use crate::domain::{
    Message, SessionSource, SessionSummary, message_time_created_ms, model_name_from_message,
    parse_part_value, parse_role_value,
};
use crate::infra::{ScanWarningCount, SessionStore, StoreError, StoreScan};
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveOpenCodeDbPathError {
    #[error("home directory not found")]
    HomeDirNotFound,
}

pub fn resolve_opencode_db_path() -> Result<PathBuf, ResolveOpenCodeDbPathError> {
    if let Some(override_path) = std::env::var_os("OCBOX_OPENCODE_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    if let Some(xdg_data_home) = std::env::var_os("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg_data_home)
            .join("opencode")
            .join("opencode.db"));
    }

    let Some(home) = dirs::home_dir() else {
        return Err(ResolveOpenCodeDbPathError::HomeDirNotFound);
    };

    Ok(home
        .join(".local")
        .join("share")
        .join("opencode")
        .join("opencode.db"))
}

/// Read-only adapter over the upstream SQLite database. The `message` and
/// `part` tables keep their payloads as JSON text columns.
#[derive(Clone, Debug)]
pub struct OpenCodeDb {
    db_path: PathBuf,
}

impl OpenCodeDb {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    pub fn resolve_default() -> Result<Self, ResolveOpenCodeDbPathError> {
        Ok(Self::new(resolve_opencode_db_path()?))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, StoreError> {
        if !self.db_path.exists() {
            return Err(StoreError::SourceUnavailable(format!(
                "OpenCode DB not found: {}",
                self.db_path.display()
            )));
        }

        match open_db_readonly(&self.db_path) {
            Ok(conn) => Ok(conn),
            Err(error) => Err(StoreError::SourceUnavailable(format!(
                "OpenCode DB is not readable: {} ({error})",
                self.db_path.display()
            ))),
        }
    }
}

fn open_db_readonly(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let _ = conn.busy_timeout(Duration::from_millis(250));
    Ok(conn)
}

impl SessionStore for OpenCodeDb {
    fn list_sessions(&self) -> Result<StoreScan, StoreError> {
        let conn = self.open()?;

        let sql = r#"
            SELECT id, parent_id, directory, title, time_created, time_updated
            FROM session
            ORDER BY time_updated DESC, id DESC
        "#;

        let mut stmt = match conn.prepare(sql) {
            Ok(stmt) => stmt,
            Err(_) => {
                return Err(StoreError::SourceUnavailable(format!(
                    "OpenCode DB has an unexpected schema: {}",
                    self.db_path.display()
                )));
            }
        };

        let mut model_stmt = conn.prepare(
            r#"
            SELECT data
            FROM message
            WHERE session_id = ?1 AND data LIKE '%modelID%'
            ORDER BY time_created ASC, id ASC
            LIMIT 1
        "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let parent_id: Option<String> = row.get(1)?;
            let directory: Option<String> = row.get(2)?;
            let title: Option<String> = row.get(3)?;
            let time_created: Option<i64> = row.get(4)?;
            let time_updated: Option<i64> = row.get(5)?;
            Ok((id, parent_id, directory, title, time_created, time_updated))
        })?;

        let mut sessions: Vec<SessionSummary> = Vec::new();
        let mut warnings = 0usize;

        for row in rows {
            let (id, parent_id, directory, title, time_created, time_updated) = match row {
                Ok(row) => row,
                Err(_) => {
                    warnings += 1;
                    continue;
                }
            };

            let model = session_model_name(&mut model_stmt, &id).unwrap_or_else(|| {
                "Unknown".to_string()
            });

            sessions.push(SessionSummary {
                id,
                title: title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| "(untitled)".to_string()),
                directory: PathBuf::from(directory.unwrap_or_default()),
                parent_id,
                model,
                time_created_ms: time_created,
                time_updated_ms: time_updated,
                source: SessionSource::Relational,
            });
        }

        Ok(StoreScan {
            sessions,
            warnings: ScanWarningCount::from(warnings),
        })
    }

    fn load_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let conn = self.open()?;

        let mut messages: Vec<(String, Option<i64>, Value)> = Vec::new();
        {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, time_created, data
                FROM message
                WHERE session_id = ?1
                ORDER BY time_created ASC, id ASC
            "#,
            )?;
            let rows = stmt.query_map([session_id], |row| {
                let id: String = row.get(0)?;
                let time_created: Option<i64> = row.get(1)?;
                let raw: String = row.get(2)?;
                Ok((id, time_created, raw))
            })?;

            for row in rows {
                let (id, time_created, raw) = row?;
                // Rows with corrupt JSON are skipped, not fatal.
                let data: Value = match serde_json::from_str(&raw) {
                    Ok(data) => data,
                    Err(_) => continue,
                };
                messages.push((id, time_created, data));
            }
        }

        let mut parts_by_message: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        {
            let mut stmt = conn.prepare(
                r#"
                SELECT message_id, data
                FROM part
                WHERE session_id = ?1
                ORDER BY time_created ASC, message_id ASC, id ASC
            "#,
            )?;
            let rows = stmt.query_map([session_id], |row| {
                let message_id: String = row.get(0)?;
                let raw: String = row.get(1)?;
                Ok((message_id, raw))
            })?;

            for row in rows {
                let (message_id, raw) = row?;
                let data: Value = match serde_json::from_str(&raw) {
                    Ok(data) => data,
                    Err(_) => continue,
                };
                parts_by_message.entry(message_id).or_default().push(data);
            }
        }

        let mut result: Vec<Message> = Vec::with_capacity(messages.len());
        for (id, time_created, data) in messages {
            let parts = parts_by_message
                .remove(&id)
                .unwrap_or_default()
                .iter()
                .filter_map(parse_part_value)
                .collect();
            result.push(Message {
                role: parse_role_value(&data),
                time_created_ms: time_created.or_else(|| message_time_created_ms(&data)),
                id,
                parts,
            });
        }

        Ok(result)
    }
}

fn session_model_name(
    model_stmt: &mut rusqlite::Statement<'_>,
    session_id: &str,
) -> Option<String> {
    let raw: String = model_stmt
        .query_row([session_id], |row| row.get(0))
        .ok()?;
    let data: Value = serde_json::from_str(&raw).ok()?;
    model_name_from_message(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Part, Role};
    use rusqlite::params;
    use tempfile::tempdir;

    fn create_minimal_db(path: &Path) -> Connection {
        let conn = Connection::open(path).expect("open");
        conn.execute_batch(
            r#"
            CREATE TABLE session (
              id TEXT PRIMARY KEY,
              project_id TEXT,
              parent_id TEXT,
              slug TEXT,
              directory TEXT,
              title TEXT,
              version TEXT,
              time_created INTEGER,
              time_updated INTEGER
            );
            CREATE TABLE message (
              id TEXT PRIMARY KEY,
              session_id TEXT NOT NULL,
              time_created INTEGER,
              time_updated INTEGER,
              data TEXT NOT NULL
            );
            CREATE TABLE part (
              id TEXT PRIMARY KEY,
              message_id TEXT NOT NULL,
              session_id TEXT NOT NULL,
              time_created INTEGER,
              time_updated INTEGER,
              data TEXT NOT NULL
            );
        "#,
        )
        .expect("schema");
        conn
    }

    fn insert_session(conn: &Connection, id: &str, directory: &str, updated: i64) {
        conn.execute(
            "INSERT INTO session (id, parent_id, directory, title, time_created, time_updated) VALUES (?1, NULL, ?2, ?3, 10, ?4)",
            params![id, directory, format!("session {id}"), updated],
        )
        .expect("session");
    }

    #[test]
    fn missing_db_file_is_source_unavailable() {
        let dir = tempdir().expect("tempdir");
        let db = OpenCodeDb::new(dir.path().join("missing.db"));
        let error = db.list_sessions().expect_err("should fail");
        assert!(matches!(error, StoreError::SourceUnavailable(_)));
    }

    #[test]
    fn lists_sessions_with_model_from_first_message() {
        let dir = tempdir().expect("tempdir");
        let db_path = dir.path().join("opencode.db");
        let conn = create_minimal_db(&db_path);
        insert_session(&conn, "s1", "/proj/a", 20);

        let message = serde_json::json!({
            "role": "assistant",
            "model": { "providerID": "anthropic", "modelID": "claude-x" }
        });
        conn.execute(
            "INSERT INTO message (id, session_id, time_created, time_updated, data) VALUES (?1, ?2, 100, 100, ?3)",
            params!["m1", "s1", message.to_string()],
        )
        .expect("message");

        let db = OpenCodeDb::new(db_path);
        let scan = db.list_sessions().expect("scan");
        assert_eq!(scan.warnings.get(), 0);
        assert_eq!(scan.sessions.len(), 1);
        assert_eq!(scan.sessions[0].id, "s1");
        assert_eq!(scan.sessions[0].model, "claude-x");
        assert_eq!(scan.sessions[0].source, SessionSource::Relational);
        assert_eq!(scan.sessions[0].directory, PathBuf::from("/proj/a"));
    }

    #[test]
    fn unknown_session_yields_empty_messages_not_error() {
        let dir = tempdir().expect("tempdir");
        let db_path = dir.path().join("opencode.db");
        create_minimal_db(&db_path);

        let db = OpenCodeDb::new(db_path);
        let messages = db.load_messages("nope").expect("load");
        assert!(messages.is_empty());
    }

    #[test]
    fn loads_messages_with_parts_in_source_order() {
        let dir = tempdir().expect("tempdir");
        let db_path = dir.path().join("opencode.db");
        let conn = create_minimal_db(&db_path);
        insert_session(&conn, "s1", "/proj/a", 20);

        let user = serde_json::json!({ "role": "user" });
        conn.execute(
            "INSERT INTO message (id, session_id, time_created, time_updated, data) VALUES (?1, ?2, 1000, 1000, ?3)",
            params!["m1", "s1", user.to_string()],
        )
        .expect("user");
        let assistant = serde_json::json!({ "role": "assistant" });
        conn.execute(
            "INSERT INTO message (id, session_id, time_created, time_updated, data) VALUES (?1, ?2, 2000, 2000, ?3)",
            params!["m2", "s1", assistant.to_string()],
        )
        .expect("assistant");

        for (id, message_id, ts, data) in [
            ("p1", "m1", 1000, serde_json::json!({ "type": "text", "text": "fix the bug" })),
            ("p2", "m2", 2000, serde_json::json!({ "type": "reasoning", "text": "looking" })),
            ("p3", "m2", 2100, serde_json::json!({ "type": "text", "text": "fixed" })),
        ] {
            conn.execute(
                "INSERT INTO part (id, message_id, session_id, time_created, time_updated, data) VALUES (?1, ?2, ?3, ?4, ?4, ?5)",
                params![id, message_id, "s1", ts, data.to_string()],
            )
            .expect("part");
        }

        let db = OpenCodeDb::new(db_path);
        let messages = db.load_messages("s1").expect("load");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "m1");
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(
            messages[0].parts,
            vec![Part::Text {
                text: "fix the bug".to_string()
            }]
        );
        assert_eq!(messages[1].id, "m2");
        assert_eq!(messages[1].parts.len(), 2);
        assert!(matches!(messages[1].parts[0], Part::Reasoning { .. }));
    }

    #[test]
    fn corrupt_message_json_is_skipped() {
        let dir = tempdir().expect("tempdir");
        let db_path = dir.path().join("opencode.db");
        let conn = create_minimal_db(&db_path);
        insert_session(&conn, "s1", "/proj/a", 20);

        conn.execute(
            "INSERT INTO message (id, session_id, time_created, time_updated, data) VALUES ('m1', 's1', 1000, 1000, 'not json')",
            [],
        )
        .expect("corrupt");
        conn.execute(
            "INSERT INTO message (id, session_id, time_created, time_updated, data) VALUES ('m2', 's1', 2000, 2000, '{\"role\":\"user\"}')",
            [],
        )
        .expect("good");

        let db = OpenCodeDb::new(db_path);
        let messages = db.load_messages("s1").expect("load");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m2");
    }
}
