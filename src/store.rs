use crate::app_dirs::AppDirs;
use crate::passage::{Passage, PassageStats, PassageSummary, PracticeRecord};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::{Path, PathBuf};

/// SQLite-backed store for passages and their practice history.
#[derive(Debug)]
pub struct PassageDb {
    conn: Connection,
}

impl PassageDb {
    /// Open (and migrate) the store at the default location.
    pub fn new() -> Result<Self> {
        let db_path = Self::db_path().unwrap_or_else(|| PathBuf::from("recite.db"));

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        Self::open(&db_path)
    }

    /// Open (and migrate) the store at an explicit path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS passages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                text TEXT NOT NULL,
                health REAL,
                last_practiced TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS practices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                passage_id INTEGER NOT NULL REFERENCES passages(id) ON DELETE CASCADE,
                date TEXT NOT NULL,
                score_percent REAL NOT NULL,
                missed_points INTEGER NOT NULL,
                hints_used INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_practices_passage ON practices(passage_id)",
            [],
        )?;

        Ok(PassageDb { conn })
    }

    fn db_path() -> Option<PathBuf> {
        AppDirs::db_path()
    }

    /// Insert a passage, or replace the text of an existing one with the
    /// same name. Stats are kept on replace.
    pub fn upsert_passage(&self, name: &str, text: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO passages (name, text) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET text = excluded.text
            "#,
            params![name, text],
        )?;
        Ok(())
    }

    /// Remove a passage and its practice history. Returns whether a row
    /// was actually deleted.
    pub fn delete_passage(&self, name: &str) -> Result<bool> {
        // Cascade is not on by default in SQLite; clear children first.
        self.conn.execute(
            "DELETE FROM practices WHERE passage_id IN (SELECT id FROM passages WHERE name = ?1)",
            params![name],
        )?;
        let n = self
            .conn
            .execute("DELETE FROM passages WHERE name = ?1", params![name])?;
        Ok(n > 0)
    }

    /// Load a full passage, including its practice history.
    pub fn get_passage(&self, name: &str) -> Result<Option<Passage>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, text, health, last_practiced FROM passages WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, text, health, last_practiced)) = row else {
            return Ok(None);
        };

        let practices = self.practices_for(id)?;
        let stats = health.map(|health| PassageStats {
            health,
            last_practiced: last_practiced.as_deref().and_then(parse_local),
            practices,
        });

        Ok(Some(Passage {
            name: name.to_string(),
            text,
            stats,
        }))
    }

    /// Summaries for the picker, ordered by name.
    pub fn list_passages(&self) -> Result<Vec<PassageSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.name, p.health, p.last_practiced,
                   (SELECT COUNT(*) FROM practices WHERE passage_id = p.id)
            FROM passages p
            ORDER BY p.name
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(PassageSummary {
                name: row.get(0)?,
                health: row.get(1)?,
                last_practiced: row
                    .get::<_, Option<String>>(2)?
                    .as_deref()
                    .and_then(parse_local),
                practice_count: row.get::<_, i64>(3)? as usize,
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }

    /// Append a finished practice and fold the new health into the
    /// passage row.
    pub fn record_practice(
        &self,
        name: &str,
        record: &PracticeRecord,
        new_health: f64,
    ) -> Result<()> {
        let id: i64 = self.conn.query_row(
            "SELECT id FROM passages WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        self.conn.execute(
            r#"
            INSERT INTO practices (passage_id, date, score_percent, missed_points, hints_used)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                id,
                record.date.to_rfc3339(),
                record.score_percent,
                record.missed_points,
                record.hints_used,
            ],
        )?;

        self.conn.execute(
            "UPDATE passages SET health = ?1, last_practiced = ?2 WHERE id = ?3",
            params![new_health, record.date.to_rfc3339(), id],
        )?;

        Ok(())
    }

    fn practices_for(&self, passage_id: i64) -> Result<Vec<PracticeRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, score_percent, missed_points, hints_used
            FROM practices
            WHERE passage_id = ?1
            ORDER BY date
            "#,
        )?;

        let rows = stmt.query_map(params![passage_id], |row| {
            let date_str: String = row.get(0)?;
            let date = parse_local(&date_str).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(
                    0,
                    "date".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;
            Ok(PracticeRecord {
                date,
                score_percent: row.get(1)?,
                missed_points: row.get(2)?,
                hints_used: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Export the full practice history as CSV, one row per practice.
    pub fn export_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.name, pr.date, pr.score_percent, pr.missed_points, pr.hints_used
            FROM practices pr
            JOIN passages p ON p.id = pr.passage_id
            ORDER BY p.name, pr.date
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u32>(4)?,
            ))
        })?;

        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["passage", "date", "score_percent", "missed_points", "hints_used"])
            .map_err(csv_error)?;
        for row in rows {
            let (name, date, score, missed, hints) = row?;
            wtr.write_record([
                name,
                date,
                format!("{:.2}", score),
                missed.to_string(),
                hints.to_string(),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush().map_err(|e| csv_error(csv::Error::from(e)))?;
        Ok(())
    }
}

fn parse_local(s: &str) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Local))
}

fn csv_error(e: csv::Error) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
        Some(format!("csv export failed: {}", e)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> PassageDb {
        PassageDb::open_in_memory().unwrap()
    }

    fn record(score: f64) -> PracticeRecord {
        PracticeRecord {
            date: Local::now(),
            score_percent: score,
            missed_points: 2,
            hints_used: 1,
        }
    }

    #[test]
    fn upsert_and_get_roundtrip() {
        let db = db();
        db.upsert_passage("psalm", "The LORD is my shepherd.").unwrap();

        let p = db.get_passage("psalm").unwrap().unwrap();
        assert_eq!(p.name, "psalm");
        assert_eq!(p.text, "The LORD is my shepherd.");
        assert!(p.stats.is_none());
    }

    #[test]
    fn get_missing_passage_is_none() {
        let db = db();
        assert!(db.get_passage("nope").unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_text_and_keeps_stats() {
        let db = db();
        db.upsert_passage("p", "old text").unwrap();
        db.record_practice("p", &record(90.0), 95.5).unwrap();

        db.upsert_passage("p", "new text").unwrap();
        let p = db.get_passage("p").unwrap().unwrap();
        assert_eq!(p.text, "new text");
        let stats = p.stats.unwrap();
        assert_eq!(stats.health, 95.5);
        assert_eq!(stats.practices.len(), 1);
    }

    #[test]
    fn record_practice_updates_health_and_history() {
        let db = db();
        db.upsert_passage("p", "text").unwrap();
        db.record_practice("p", &record(80.0), 88.0).unwrap();
        db.record_practice("p", &record(100.0), 98.0).unwrap();

        let p = db.get_passage("p").unwrap().unwrap();
        let stats = p.stats.unwrap();
        assert_eq!(stats.health, 98.0);
        assert!(stats.last_practiced.is_some());
        assert_eq!(stats.practices.len(), 2);
        assert_eq!(stats.practices[0].score_percent, 80.0);
        assert_eq!(stats.practices[1].score_percent, 100.0);
    }

    #[test]
    fn list_orders_by_name_with_counts() {
        let db = db();
        db.upsert_passage("zeta", "z").unwrap();
        db.upsert_passage("alpha", "a").unwrap();
        db.record_practice("zeta", &record(50.0), 60.0).unwrap();

        let list = db.list_passages().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "alpha");
        assert_eq!(list[0].practice_count, 0);
        assert!(list[0].health.is_none());
        assert_eq!(list[1].name, "zeta");
        assert_eq!(list[1].practice_count, 1);
        assert_eq!(list[1].health, Some(60.0));
    }

    #[test]
    fn delete_removes_passage_and_history() {
        let db = db();
        db.upsert_passage("p", "text").unwrap();
        db.record_practice("p", &record(70.0), 75.0).unwrap();

        assert!(db.delete_passage("p").unwrap());
        assert!(db.get_passage("p").unwrap().is_none());
        assert!(!db.delete_passage("p").unwrap());
    }

    #[test]
    fn export_csv_includes_header_and_rows() {
        let db = db();
        db.upsert_passage("p", "text").unwrap();
        db.record_practice("p", &record(66.67), 70.0).unwrap();

        let mut out = Vec::new();
        db.export_csv(&mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "passage,date,score_percent,missed_points,hints_used"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("p,"));
        assert!(row.ends_with(",66.67,2,1"));
    }
}
