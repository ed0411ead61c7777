use crate::model::{Card, Session};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::{Path, PathBuf};

/// SQLite-backed session store.
///
/// Opened once at process start and passed by reference to collaborators;
/// there is no module-level singleton handle. The background writeback
/// thread opens its own connection to the same file (WAL mode makes that
/// safe).
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        Self::initialize_tables(&conn)?;
        Ok(Store { conn })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_tables(&conn)?;
        Ok(Store { conn })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        Ok(())
    }

    fn initialize_tables(conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                title TEXT,
                summary TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                card_order INTEGER NOT NULL,
                mastered INTEGER DEFAULT 0,
                FOREIGN KEY (session_id) REFERENCES sessions(id)
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cards_session ON cards(session_id)",
            [],
        )?;
        Ok(())
    }

    /// Default database path under `$HOME/.local/state/tubedeck`.
    pub fn default_db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("tubedeck");
            Some(state_dir.join("flashcards.db"))
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", "tubedeck") {
            Some(proj_dirs.data_local_dir().join("flashcards.db"))
        } else {
            None
        }
    }

    /// Insert a session row followed by its cards. The session row lands
    /// before any card row so readers never see orphaned cards.
    pub fn create_session_with_cards(
        &mut self,
        session: &Session,
        cards: &[Card],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (id, url, title, summary) VALUES (?1, ?2, ?3, ?4)",
            params![session.id, session.url, session.title, session.summary],
        )?;
        for card in cards {
            tx.execute(
                r#"
                INSERT INTO cards (id, session_id, front, back, card_order, mastered)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    card.id,
                    card.session_id,
                    card.front,
                    card.back,
                    card.card_order,
                    card.mastered as i64,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// All sessions, newest first.
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, url, title, summary, created_at
            FROM sessions
            ORDER BY created_at DESC, id DESC
            "#,
        )?;
        let rows = stmt.query_map([], Self::session_from_row)?;
        rows.collect()
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.conn
            .query_row(
                "SELECT id, url, title, summary, created_at FROM sessions WHERE id = ?1",
                [session_id],
                Self::session_from_row,
            )
            .optional()
    }

    /// A session's cards, by card_order ascending.
    pub fn cards_for_session(&self, session_id: &str) -> Result<Vec<Card>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, session_id, front, back, card_order, mastered
            FROM cards
            WHERE session_id = ?1
            ORDER BY card_order ASC
            "#,
        )?;
        let rows = stmt.query_map([session_id], |row| {
            Ok(Card {
                id: row.get(0)?,
                session_id: row.get(1)?,
                front: row.get(2)?,
                back: row.get(3)?,
                card_order: row.get(4)?,
                // stored as 0/1, surfaced as bool
                mastered: row.get::<_, i64>(5)? != 0,
            })
        })?;
        rows.collect()
    }

    /// Last-value-wins mastery update keyed by card id.
    pub fn set_card_mastered(&self, card_id: &str, mastered: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE cards SET mastered = ?1 WHERE id = ?2",
            params![mastered as i64, card_id],
        )?;
        Ok(())
    }

    /// Flip every card in the session back to needs-study.
    pub fn reset_cards(&self, session_id: &str) -> Result<()> {
        self.conn
            .execute("UPDATE cards SET mastered = 0 WHERE session_id = ?1", [session_id])?;
        Ok(())
    }

    fn session_from_row(row: &rusqlite::Row<'_>) -> Result<Session> {
        Ok(Session {
            id: row.get(0)?,
            url: row.get(1)?,
            title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            summary: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            created_at: row.get(4)?,
        })
    }
}
