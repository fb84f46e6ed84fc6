//! Video metadata persistence.
//!
//! The upload handler only needs two things from storage: fetch a record by
//! id and write it back. Those live on the [`VideoStore`] trait so handlers
//! can be exercised against fakes, while [`MetadataStore`] provides the
//! SQLite-backed implementation used by the backend binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row of the `videos` table.
///
/// `thumbnail_url` is the only field the upload flow mutates; the rest is
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

impl VideoRecord {
    pub fn new(user_id: Uuid, title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title: title.into(),
            description: description.into(),
            user_id,
            thumbnail_url: None,
            video_url: None,
        }
    }
}

/// Record store used by the upload handler. Calls block.
pub trait VideoStore: Send + Sync {
    /// Returns `Ok(None)` when no video has this id.
    fn get_video(&self, id: Uuid) -> Result<Option<VideoRecord>>;

    fn update_video(&self, video: &VideoRecord) -> Result<()>;
}

/// SQLite-backed store that opens a short-lived connection for each call, so
/// it can be cloned freely into blocking tasks.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    db_path: PathBuf,
}

impl MetadataStore {
    /// Opens (and if necessary creates) the DB and ensures the schema exists.
    /// WAL mode is enabled to avoid readers blocking writers.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating metadata directory {}", parent.display()))?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("opening metadata DB {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("enabling WAL mode for metadata DB")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("setting metadata DB synchronous mode")?;
        ensure_tables(&mut conn)?;

        Ok(Self {
            db_path: path.to_path_buf(),
        })
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("opening metadata DB {}", self.db_path.display()))?;
        f(&conn)
    }

    pub fn insert_video(&self, video: &VideoRecord) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO videos (
                    id, created_at, updated_at, title, description,
                    user_id, thumbnail_url, video_url
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    video.id.to_string(),
                    video.created_at.to_rfc3339(),
                    video.updated_at.to_rfc3339(),
                    video.title,
                    video.description,
                    video.user_id.to_string(),
                    video.thumbnail_url,
                    video.video_url,
                ],
            )
            .with_context(|| format!("inserting video {}", video.id))?;
            Ok(())
        })
    }
}

fn ensure_tables(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            user_id TEXT NOT NULL,
            thumbnail_url TEXT,
            video_url TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_videos_user_id ON videos(user_id);
        "#,
    )?;
    tx.commit()?;
    Ok(())
}

impl VideoStore for MetadataStore {
    fn get_video(&self, id: Uuid) -> Result<Option<VideoRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, created_at, updated_at, title, description,
                       user_id, thumbnail_url, video_url
                FROM videos
                WHERE id = ?1
                "#,
            )?;

            let row = stmt
                .query_row([id.to_string()], RawVideoRow::from_row)
                .optional()?;
            row.map(RawVideoRow::into_record).transpose()
        })
    }

    fn update_video(&self, video: &VideoRecord) -> Result<()> {
        self.with_connection(|conn| {
            let changed = conn.execute(
                r#"
                UPDATE videos SET
                    updated_at = ?2,
                    title = ?3,
                    description = ?4,
                    thumbnail_url = ?5,
                    video_url = ?6
                WHERE id = ?1
                "#,
                params![
                    video.id.to_string(),
                    video.updated_at.to_rfc3339(),
                    video.title,
                    video.description,
                    video.thumbnail_url,
                    video.video_url,
                ],
            )?;
            if changed == 0 {
                bail!("video {} does not exist", video.id);
            }
            Ok(())
        })
    }
}

/// Text columns as stored, before UUID/timestamp parsing.
struct RawVideoRow {
    id: String,
    created_at: String,
    updated_at: String,
    title: String,
    description: String,
    user_id: String,
    thumbnail_url: Option<String>,
    video_url: Option<String>,
}

impl RawVideoRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            title: row.get("title")?,
            description: row.get("description")?,
            user_id: row.get("user_id")?,
            thumbnail_url: row.get("thumbnail_url")?,
            video_url: row.get("video_url")?,
        })
    }

    fn into_record(self) -> Result<VideoRecord> {
        Ok(VideoRecord {
            id: Uuid::parse_str(&self.id).context("parsing stored video id")?,
            created_at: parse_timestamp(&self.created_at).context("parsing created_at")?,
            updated_at: parse_timestamp(&self.updated_at).context("parsing updated_at")?,
            title: self.title,
            description: self.description,
            user_id: Uuid::parse_str(&self.user_id).context("parsing stored user id")?,
            thumbnail_url: self.thumbnail_url,
            video_url: self.video_url,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn insert_then_get_round_trips_fields() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("db/tubely.db")).unwrap();
        let video = VideoRecord::new(Uuid::new_v4(), "Boots", "a video about boots");
        store.insert_video(&video).unwrap();

        let loaded = store.get_video(video.id).unwrap().unwrap();
        assert_eq!(loaded.id, video.id);
        assert_eq!(loaded.user_id, video.user_id);
        assert_eq!(loaded.title, "Boots");
        assert_eq!(loaded.thumbnail_url, None);
    }

    #[test]
    fn unknown_id_is_none() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("tubely.db")).unwrap();
        assert!(store.get_video(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn update_persists_thumbnail_and_timestamp() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("tubely.db")).unwrap();
        let mut video = VideoRecord::new(Uuid::new_v4(), "Boots", "");
        store.insert_video(&video).unwrap();

        video.thumbnail_url = Some("http://localhost:8091/assets/x.png".into());
        video.updated_at = video.created_at + chrono::Duration::seconds(5);
        store.update_video(&video).unwrap();

        let loaded = store.get_video(video.id).unwrap().unwrap();
        assert_eq!(loaded.thumbnail_url, video.thumbnail_url);
        assert_eq!(loaded.updated_at, video.updated_at);
        assert_eq!(loaded.created_at, video.created_at);
    }

    #[test]
    fn update_of_missing_video_fails() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("tubely.db")).unwrap();
        let video = VideoRecord::new(Uuid::new_v4(), "ghost", "");
        assert!(store.update_video(&video).is_err());
    }
}
