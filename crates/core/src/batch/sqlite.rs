//! SQLite-backed batch store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::types::{BatchError, BatchItemDetails, BatchRecord, BatchStats, BatchStore};
use crate::ranking::RankedResult;

const SELECT_COLUMNS: &str = "id, discogs_id, title, artist, album, year, catno, format_info, \
     condition, sleeve_condition, notes, relevance_score, match_explanation, original_query, \
     published, created_at, updated_at";

/// SQLite-backed batch store.
pub struct SqliteBatchStore {
    conn: Mutex<Connection>,
}

impl SqliteBatchStore {
    /// Create a new batch store, creating the database file and table if needed.
    pub fn new(path: &Path) -> Result<Self, BatchError> {
        let conn = Connection::open(path).map_err(|e| BatchError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory batch store (useful for testing).
    pub fn in_memory() -> Result<Self, BatchError> {
        let conn = Connection::open_in_memory().map_err(|e| BatchError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), BatchError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS batch_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                discogs_id INTEGER,
                title TEXT NOT NULL,
                artist TEXT,
                album TEXT,
                year INTEGER,
                catno TEXT,
                format_info TEXT NOT NULL,
                condition TEXT,
                sleeve_condition TEXT,
                notes TEXT,
                relevance_score REAL NOT NULL,
                match_explanation TEXT NOT NULL,
                original_query TEXT NOT NULL,
                published INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_batch_records_published ON batch_records(published);
            "#,
        )
        .map_err(|e| BatchError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<BatchRecord> {
        let format_info_json: String = row.get(7)?;
        let created_at_str: String = row.get(15)?;
        let updated_at_str: String = row.get(16)?;

        // Timestamps and format snapshots are written by this store, so
        // parse failures fall back rather than poisoning the whole list.
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let format_info = serde_json::from_str(&format_info_json).unwrap_or_default();

        Ok(BatchRecord {
            id: row.get(0)?,
            discogs_id: row.get(1)?,
            title: row.get(2)?,
            artist: row.get(3)?,
            album: row.get(4)?,
            year: row.get(5)?,
            catno: row.get(6)?,
            format_info,
            condition: row.get(8)?,
            sleeve_condition: row.get(9)?,
            notes: row.get(10)?,
            relevance_score: row.get(11)?,
            match_explanation: row.get(12)?,
            original_query: row.get(13)?,
            published: row.get::<_, i64>(14)? != 0,
            created_at,
            updated_at,
        })
    }
}

impl BatchStore for SqliteBatchStore {
    fn add(&self, result: &RankedResult, details: BatchItemDetails) -> Result<i64, BatchError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        // Artist and album come from the parsed query; the catalog title is
        // usually "Artist - Album" so split it when the query lacks them.
        let (title_artist, title_album) = match result.release.title.split_once(" - ") {
            Some((a, b)) => (Some(a.trim().to_string()), Some(b.trim().to_string())),
            None => (None, None),
        };
        let artist = result.structured_query.artist.clone().or(title_artist);
        let album = result.structured_query.album.clone().or(title_album);

        let format_info = serde_json::to_string(&result.release.formats)
            .map_err(|e| BatchError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO batch_records (discogs_id, title, artist, album, year, catno, \
             format_info, condition, sleeve_condition, notes, relevance_score, \
             match_explanation, original_query, published, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
            params![
                result.release.release_id(),
                result.release.title,
                artist,
                album,
                result.release.year,
                result.release.catno,
                format_info,
                details.condition,
                details.sleeve_condition,
                details.notes,
                result.relevance_score,
                result.match_explanation,
                result.original_query,
                now,
                now,
            ],
        )
        .map_err(|e| BatchError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<BatchRecord>, BatchError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM batch_records WHERE id = ?"),
            params![id],
            Self::row_to_record,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(BatchError::Database(e.to_string())),
        }
    }

    fn list(&self, published: Option<bool>) -> Result<Vec<BatchRecord>, BatchError> {
        let conn = self.conn.lock().unwrap();

        let sql = match published {
            Some(_) => format!(
                "SELECT {SELECT_COLUMNS} FROM batch_records WHERE published = ? ORDER BY created_at ASC, id ASC"
            ),
            None => format!(
                "SELECT {SELECT_COLUMNS} FROM batch_records ORDER BY created_at ASC, id ASC"
            ),
        };

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| BatchError::Database(e.to_string()))?;

        let mut records = Vec::new();
        match published {
            Some(flag) => {
                let rows = stmt
                    .query_map(params![flag as i64], Self::row_to_record)
                    .map_err(|e| BatchError::Database(e.to_string()))?;
                for row in rows {
                    records.push(row.map_err(|e| BatchError::Database(e.to_string()))?);
                }
            }
            None => {
                let rows = stmt
                    .query_map([], Self::row_to_record)
                    .map_err(|e| BatchError::Database(e.to_string()))?;
                for row in rows {
                    records.push(row.map_err(|e| BatchError::Database(e.to_string()))?);
                }
            }
        }
        Ok(records)
    }

    fn update_details(
        &self,
        id: i64,
        details: BatchItemDetails,
    ) -> Result<BatchRecord, BatchError> {
        {
            let conn = self.conn.lock().unwrap();
            let changed = conn
                .execute(
                    "UPDATE batch_records SET condition = ?, sleeve_condition = ?, notes = ?, \
                     updated_at = ? WHERE id = ?",
                    params![
                        details.condition,
                        details.sleeve_condition,
                        details.notes,
                        Utc::now().to_rfc3339(),
                        id,
                    ],
                )
                .map_err(|e| BatchError::Database(e.to_string()))?;

            if changed == 0 {
                return Err(BatchError::NotFound(id));
            }
        }

        self.get(id)?.ok_or(BatchError::NotFound(id))
    }

    fn remove(&self, id: i64) -> Result<(), BatchError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM batch_records WHERE id = ?", params![id])
            .map_err(|e| BatchError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(BatchError::NotFound(id));
        }
        Ok(())
    }

    fn mark_published(&self, ids: &[i64]) -> Result<usize, BatchError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE batch_records SET published = 1, updated_at = ? WHERE id IN ({placeholders})"
        );

        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(Utc::now().to_rfc3339())];
        for id in ids {
            sql_params.push(Box::new(*id));
        }
        let param_refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(|p| p.as_ref()).collect();

        conn.execute(&sql, param_refs.as_slice())
            .map_err(|e| BatchError::Database(e.to_string()))
    }

    fn clear_published(&self) -> Result<usize, BatchError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM batch_records WHERE published = 1", [])
            .map_err(|e| BatchError::Database(e.to_string()))
    }

    fn stats(&self) -> Result<BatchStats, BatchError> {
        let conn = self.conn.lock().unwrap();

        let (total, published): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(published), 0) FROM batch_records",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| BatchError::Database(e.to_string()))?;

        Ok(BatchStats {
            total,
            published,
            pending: total - published,
        })
    }
}
