//! SQLite-backed [`ProgressStore`].

use sqlx::SqlitePool;

use quiz::{LevelId, SessionRecord, UserProgress};

use super::helpers::{decode_level_set, encode_level_set, from_i64, to_i64};
use crate::persistence::{now_timestamp, PersistenceError, ProgressStore, StoredProgress};

pub struct SqliteProgressStore {
    pool: SqlitePool,
}

impl SqliteProgressStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ProgressStore for SqliteProgressStore {
    async fn get_progress(&self, user_id: &str) -> Result<Option<StoredProgress>, PersistenceError> {
        let row: Option<(String, i64, i64)> = sqlx::query_as(
            "SELECT completed_levels, total_score, revision FROM user_progress WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(levels, total_score, revision)| {
            Ok(StoredProgress {
                progress: UserProgress {
                    completed_levels: decode_level_set(&levels)?,
                    total_score: u32::try_from(total_score).unwrap_or(0),
                },
                revision: from_i64(revision),
            })
        })
        .transpose()
    }

    async fn put_progress(
        &self,
        user_id: &str,
        progress: &UserProgress,
        expected_revision: u64,
    ) -> Result<bool, PersistenceError> {
        let levels = encode_level_set(&progress.completed_levels)?;
        let total_score = i64::from(progress.total_score);
        let now = to_i64(now_timestamp());

        let result = if expected_revision == 0 {
            sqlx::query(
                r#"
                INSERT INTO user_progress
                    (user_id, completed_levels, total_score, revision, updated_at)
                VALUES (?, ?, ?, 1, ?)
                ON CONFLICT(user_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(&levels)
            .bind(total_score)
            .bind(now)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE user_progress
                SET completed_levels = ?, total_score = ?, revision = revision + 1, updated_at = ?
                WHERE user_id = ? AND revision = ?
                "#,
            )
            .bind(&levels)
            .bind(total_score)
            .bind(now)
            .bind(user_id)
            .bind(to_i64(expected_revision))
            .execute(&self.pool)
            .await?
        };

        Ok(result.rows_affected() == 1)
    }

    async fn append_session(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        let result = sqlx::query(
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
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(session_id = %record.session_id, "Session already recorded");
        }
        Ok(())
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        level_id: LevelId,
    ) -> Result<Vec<SessionRecord>, PersistenceError> {
        let rows: Vec<(String, String, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT session_id, user_id, level_id, score, completed, created_at
            FROM game_sessions
            WHERE user_id = ? AND level_id = ?
            ORDER BY created_at ASC, session_id ASC
            "#,
        )
        .bind(user_id)
        .bind(i64::from(level_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(session_id, user_id, level_id, score, completed, created_at)| SessionRecord {
                    session_id,
                    user_id,
                    level_id: level_id as LevelId,
                    score: score as u32,
                    completed: completed != 0,
                    created_at: from_i64(created_at),
                },
            )
            .collect())
    }
}
