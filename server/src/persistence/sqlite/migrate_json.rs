//! One-time import of a JSON data directory into SQLite.

use sqlx::{SqlitePool, Transaction};
use tracing::info;

use super::helpers::{encode_level_set, to_i64};
use crate::persistence::json_progress_store::ProgressFile;
use crate::persistence::{now_timestamp, JsonProgressStore, PersistenceError};
use quiz::SessionRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub skipped: bool,
    pub progress: u64,
    pub sessions: u64,
}

impl MigrationReport {
    fn has_data(&self) -> bool {
        self.progress > 0 || self.sessions > 0
    }
}

/// Copy every JSON progress and session record into SQLite, unless SQLite
/// already holds data. The JSON files are left in place.
pub async fn migrate_json_to_sqlite(
    pool: &SqlitePool,
    json: &JsonProgressStore,
) -> Result<MigrationReport, PersistenceError> {
    info!(data_dir = %json.root().display(), "Checking for JSON data to import");

    let existing = sqlite_counts(pool).await?;
    if existing.has_data() {
        info!(
            progress = existing.progress,
            sessions = existing.sessions,
            "SQLite already contains data, skipping JSON import"
        );
        return Ok(MigrationReport {
            skipped: true,
            ..existing
        });
    }

    let progress = json.load_all_progress()?;
    let sessions = json.load_all_sessions()?;
    if progress.is_empty() && sessions.is_empty() {
        return Ok(MigrationReport {
            skipped: false,
            progress: 0,
            sessions: 0,
        });
    }

    let mut tx = pool.begin().await?;
    insert_progress(&mut tx, &progress).await?;
    insert_sessions(&mut tx, &sessions).await?;
    tx.commit().await?;

    let report = MigrationReport {
        skipped: false,
        progress: progress.len() as u64,
        sessions: sessions.len() as u64,
    };
    info!(
        progress = report.progress,
        sessions = report.sessions,
        "JSON to SQLite import completed"
    );
    Ok(report)
}

async fn sqlite_counts(pool: &SqlitePool) -> Result<MigrationReport, PersistenceError> {
    Ok(MigrationReport {
        skipped: false,
        progress: table_count(pool, "user_progress").await?,
        sessions: table_count(pool, "game_sessions").await?,
    })
}

async fn table_count(pool: &SqlitePool, table: &str) -> Result<u64, PersistenceError> {
    let query = format!("SELECT COUNT(*) FROM {table}");
    let row: (i64,) = sqlx::query_as(&query).fetch_one(pool).await?;
    Ok(row.0 as u64)
}

async fn insert_progress(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    records: &[ProgressFile],
) -> Result<(), PersistenceError> {
    let now = to_i64(now_timestamp());
    for file in records {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO user_progress
                (user_id, completed_levels, total_score, revision, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file.user_id)
        .bind(encode_level_set(&file.completed_levels)?)
        .bind(i64::from(file.total_score))
        .bind(to_i64(file.revision.max(1)))
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_sessions(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    sessions: &[SessionRecord],
) -> Result<(), PersistenceError> {
    for record in sessions {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO game_sessions
                (session_id, user_id, level_id, score, completed, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.session_id)
        .bind(&record.user_id)
        .bind(i64::from(record.level_id))
        .bind(i64::from(record.score))
        .bind(if record.completed { 1_i64 } else { 0_i64 })
        .bind(to_i64(record.created_at))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
