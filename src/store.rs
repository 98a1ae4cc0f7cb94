//! Persistence layer for ingested subtitle records.
//!
//! One SQLite table keyed by `video_id` with a secondary index on
//! `leetcode_number`. All reads go through short prepared statements; the
//! full-table scan pages through the keyspace instead of loading the table in
//! one statement, continuing after the last seen key until a short page
//! signals completion.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use libsql::{Builder, Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Rows fetched per scan page before continuing from the last seen key.
const SCAN_PAGE_SIZE: usize = 100;

/// One ingested video. `content` is the only field mutated after creation.
/// Every field serializes even when empty so template conditions stay total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleRecord {
    pub video_id: String,
    pub leetcode_number: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl SubtitleRecord {
    /// Builds a record stamped with the current time.
    pub fn new(
        video_id: impl Into<String>,
        leetcode_number: i64,
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            leetcode_number,
            title: title.into(),
            url: url.into(),
            content: content.into(),
            created_at: Some(Utc::now().to_rfc3339()),
        }
    }
}

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS subtitles (
            video_id TEXT PRIMARY KEY,
            leetcode_number INTEGER NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            created_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_subtitles_number ON subtitles(leetcode_number);
        "#,
    )
    .await?;
    Ok(())
}

const RECORD_COLUMNS: &str = "video_id, leetcode_number, title, url, content, created_at";

/// Client for the subtitle table. Cloning shares the underlying connection.
#[derive(Clone)]
pub struct SubtitleStore {
    conn: Connection,
}

impl std::fmt::Debug for SubtitleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubtitleStore").finish_non_exhaustive()
    }
}

impl SubtitleStore {
    /// Opens (and if necessary creates) the database and ensures the expected
    /// schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating data directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening subtitle DB {}", path.display()))?;

        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }

    /// Fetches a single record by primary key.
    pub async fn get(&self, video_id: &str) -> Result<Option<SubtitleRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM subtitles WHERE video_id = ?1"
            ))
            .await?;

        let mut rows = stmt.query([video_id]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(row_to_record(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Conditional insert: never overwrites. A row already holding the same
    /// `video_id` surfaces as [`StoreError::Duplicate`], which also covers the
    /// race where two requests pass the orchestrator pre-check at once.
    pub async fn put(&self, record: &SubtitleRecord) -> Result<(), StoreError> {
        let affected = self
            .conn
            .execute(
                &format!(
                    r#"
                    INSERT OR IGNORE INTO subtitles ({RECORD_COLUMNS})
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#
                ),
                params![
                    record.video_id.as_str(),
                    record.leetcode_number,
                    record.title.as_str(),
                    record.url.as_str(),
                    record.content.as_str(),
                    record.created_at.as_deref(),
                ],
            )
            .await
            .map_err(|err| StoreError::Backend(err.into()))?;

        if affected == 0 {
            return Err(StoreError::Duplicate(record.video_id.clone()));
        }
        Ok(())
    }

    /// Rewrites the subtitle content of an existing record. Updating an
    /// absent id is a no-op, not an error.
    pub async fn update_content(&self, video_id: &str, content: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE subtitles SET content = ?2 WHERE video_id = ?1",
                params![video_id, content],
            )
            .await?;
        Ok(())
    }

    /// Deletes a record. Idempotent; deleting an absent id succeeds.
    pub async fn delete(&self, video_id: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM subtitles WHERE video_id = ?1",
                params![video_id],
            )
            .await?;
        Ok(())
    }

    /// Returns every record ordered by `video_id`, paging through the
    /// keyspace until a page comes back short.
    pub async fn scan_all(&self) -> Result<Vec<SubtitleRecord>> {
        let mut records: Vec<SubtitleRecord> = Vec::new();
        let mut last_key: Option<String> = None;

        loop {
            let mut rows = match &last_key {
                Some(after) => {
                    let mut stmt = self
                        .conn
                        .prepare(&format!(
                            r#"
                            SELECT {RECORD_COLUMNS} FROM subtitles
                            WHERE video_id > ?1
                            ORDER BY video_id ASC
                            LIMIT ?2
                            "#
                        ))
                        .await?;
                    stmt.query(params![after.as_str(), SCAN_PAGE_SIZE as i64])
                        .await?
                }
                None => {
                    let mut stmt = self
                        .conn
                        .prepare(&format!(
                            r#"
                            SELECT {RECORD_COLUMNS} FROM subtitles
                            ORDER BY video_id ASC
                            LIMIT ?1
                            "#
                        ))
                        .await?;
                    stmt.query(params![SCAN_PAGE_SIZE as i64]).await?
                }
            };

            let mut fetched = 0usize;
            while let Some(row) = rows.next().await? {
                records.push(row_to_record(&row)?);
                fetched += 1;
            }

            if fetched < SCAN_PAGE_SIZE {
                break;
            }
            last_key = records.last().map(|record| record.video_id.clone());
        }

        Ok(records)
    }

    /// Exact-match lookup over the `leetcode_number` secondary index.
    pub async fn query_by_number(&self, leetcode_number: i64) -> Result<Vec<SubtitleRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                r#"
                SELECT {RECORD_COLUMNS} FROM subtitles
                WHERE leetcode_number = ?1
                ORDER BY video_id ASC
                "#
            ))
            .await?;

        let mut rows = stmt.query(params![leetcode_number]).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }
}

/// Converts a SQL row into a `SubtitleRecord`.
fn row_to_record(row: &Row) -> Result<SubtitleRecord> {
    // Column order must match RECORD_COLUMNS.
    Ok(SubtitleRecord {
        video_id: row.get(0)?,
        leetcode_number: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}
