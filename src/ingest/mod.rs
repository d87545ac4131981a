//! Bulk JSON loader for the analytics tables. Accepts either a bare array of
//! video records or an object with a `videos` key, each video optionally
//! carrying nested snapshots. Reloads are destructive: both tables are
//! recreated first.

use crate::db::schema;
use chrono::{DateTime, NaiveDateTime};
use duckdb::{params, Connection};
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{error, info};

#[derive(Debug)]
pub enum IngestError {
    IoError(std::io::Error),
    ParsingError(String),
    DatabaseError(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::IoError(err) => write!(f, "IO error: {}", err),
            IngestError::ParsingError(msg) => write!(f, "Parsing error: {}", msg),
            IngestError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::IoError(err)
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::ParsingError(err.to_string())
    }
}

impl From<duckdb::Error> for IngestError {
    fn from(err: duckdb::Error) -> Self {
        IngestError::DatabaseError(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VideoFile {
    Wrapped { videos: Vec<VideoRecord> },
    Bare(Vec<VideoRecord>),
}

impl VideoFile {
    fn into_videos(self) -> Vec<VideoRecord> {
        match self {
            VideoFile::Wrapped { videos } => videos,
            VideoFile::Bare(videos) => videos,
        }
    }
}

// Source exports carry creator ids both as strings and as bare numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreatorId {
    Text(String),
    Number(i64),
}

impl fmt::Display for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreatorId::Text(s) => write!(f, "{}", s),
            CreatorId::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VideoRecord {
    id: String,
    creator_id: CreatorId,
    video_created_at: String,
    #[serde(default)]
    views_count: i64,
    #[serde(default)]
    likes_count: i64,
    #[serde(default)]
    comments_count: i64,
    #[serde(default)]
    reports_count: i64,
    created_at: String,
    updated_at: String,
    #[serde(default)]
    snapshots: Vec<SnapshotRecord>,
}

#[derive(Debug, Deserialize)]
struct SnapshotRecord {
    id: String,
    video_id: String,
    #[serde(default)]
    views_count: i64,
    #[serde(default)]
    likes_count: i64,
    #[serde(default)]
    comments_count: i64,
    #[serde(default)]
    reports_count: i64,
    #[serde(default)]
    delta_views_count: i64,
    #[serde(default)]
    delta_likes_count: i64,
    #[serde(default)]
    delta_comments_count: i64,
    #[serde(default)]
    delta_reports_count: i64,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Default)]
pub struct LoadStats {
    pub videos: usize,
    pub snapshots: usize,
    pub skipped: usize,
}

/// Recreates both tables and loads the given JSON export into them. Bad
/// records are skipped with a logged error rather than aborting the load.
pub fn load_json(conn: &Connection, path: &Path) -> Result<LoadStats, IngestError> {
    let raw = fs::read_to_string(path)?;
    let videos = serde_json::from_str::<VideoFile>(&raw)?.into_videos();
    let total = videos.len();

    schema::reset(conn)?;

    let mut stats = LoadStats::default();
    for (i, video) in videos.iter().enumerate() {
        match insert_video(conn, video) {
            Ok(snapshots) => {
                stats.videos += 1;
                stats.snapshots += snapshots;
            }
            Err(e) => {
                error!(video = %video.id, error = %e, "skipping record");
                stats.skipped += 1;
            }
        }

        if (i + 1) % 100 == 0 {
            info!(loaded = i + 1, total, "ingest progress");
        }
    }

    info!(
        videos = stats.videos,
        snapshots = stats.snapshots,
        skipped = stats.skipped,
        "ingest finished"
    );
    Ok(stats)
}

fn insert_video(conn: &Connection, video: &VideoRecord) -> Result<usize, IngestError> {
    conn.execute(
        "INSERT INTO videos (id, creator_id, video_created_at, views_count, likes_count, \
         comments_count, reports_count, created_at, updated_at) \
         VALUES (CAST(? AS UUID), ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, \
         CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
        params![
            video.id,
            video.creator_id.to_string(),
            parse_timestamp(&video.video_created_at)?,
            video.views_count,
            video.likes_count,
            video.comments_count,
            video.reports_count,
            parse_timestamp(&video.created_at)?,
            parse_timestamp(&video.updated_at)?,
        ],
    )?;

    for snapshot in &video.snapshots {
        conn.execute(
            "INSERT INTO video_snapshots (id, video_id, views_count, likes_count, \
             comments_count, reports_count, delta_views_count, delta_likes_count, \
             delta_comments_count, delta_reports_count, created_at, updated_at) \
             VALUES (CAST(? AS UUID), CAST(? AS UUID), ?, ?, ?, ?, ?, ?, ?, ?, \
             CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
            params![
                snapshot.id,
                snapshot.video_id,
                snapshot.views_count,
                snapshot.likes_count,
                snapshot.comments_count,
                snapshot.reports_count,
                snapshot.delta_views_count,
                snapshot.delta_likes_count,
                snapshot.delta_comments_count,
                snapshot.delta_reports_count,
                parse_timestamp(&snapshot.created_at)?,
                parse_timestamp(&snapshot.updated_at)?,
            ],
        )?;
    }

    Ok(video.snapshots.len())
}

/// Accepts RFC 3339 or a plain `YYYY-MM-DD HH:MM:SS` timestamp and normalizes
/// to the form DuckDB casts without ambiguity.
fn parse_timestamp(text: &str) -> Result<String, IngestError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string());
    }
    Err(IngestError::ParsingError(format!("unrecognized timestamp: {}", text)))
}
