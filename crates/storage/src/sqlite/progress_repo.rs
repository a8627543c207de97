use chrono::{DateTime, Utc};
use chronicles_core::model::{
    CompletedLesson, CompletionOutcome, Fragment, LessonId, UserFragment, UserId,
};
use sqlx::SqliteConnection;

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_completion_row, map_user_fragment_row, user_key};
use crate::repository::{ProgressRepository, StorageError};

/// Upsert a holding, clamping the sum to the fragment's capacity.
async fn add_quantity(
    conn: &mut SqliteConnection,
    user_id: UserId,
    fragment: &Fragment,
    amount: u32,
    at: DateTime<Utc>,
) -> Result<UserFragment, StorageError> {
    let capacity = i64::from(fragment.capacity());
    let row = sqlx::query(
        r"
        INSERT INTO user_fragments (user_id, fragment_id, quantity, updated_at)
        VALUES (?1, ?2, MIN(?3, ?4), ?5)
        ON CONFLICT(user_id, fragment_id) DO UPDATE SET
            quantity = MIN(user_fragments.quantity + excluded.quantity, ?4),
            updated_at = excluded.updated_at
        RETURNING user_id, fragment_id, quantity, updated_at
        ",
    )
    .bind(user_key(user_id))
    .bind(id_i64("fragment_id", fragment.id().value())?)
    .bind(i64::from(amount))
    .bind(capacity)
    .bind(at)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)?;
    map_user_fragment_row(&row)
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn user_fragments(&self, user_id: UserId) -> Result<Vec<UserFragment>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, fragment_id, quantity, updated_at
            FROM user_fragments
            WHERE user_id = ?1
            ORDER BY fragment_id ASC
            ",
        )
        .bind(user_key(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_user_fragment_row).collect()
    }

    async fn add_fragments(
        &self,
        user_id: UserId,
        fragment: &Fragment,
        amount: u32,
        at: DateTime<Utc>,
    ) -> Result<UserFragment, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        add_quantity(&mut *conn, user_id, fragment, amount, at).await
    }

    async fn record_completion(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        reward: Option<&Fragment>,
        at: DateTime<Utc>,
    ) -> Result<CompletionOutcome, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            r"
            INSERT INTO completed_lessons (user_id, lesson_id, completed_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, lesson_id) DO NOTHING
            ",
        )
        .bind(user_key(user_id))
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(CompletionOutcome::AlreadyCompleted);
        }

        if let Some(fragment) = reward {
            add_quantity(&mut *tx, user_id, fragment, 1, at).await?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(CompletionOutcome::Recorded)
    }

    async fn is_completed(&self, user_id: UserId, lesson_id: LessonId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM completed_lessons WHERE user_id = ?1 AND lesson_id = ?2")
            .bind(user_key(user_id))
            .bind(id_i64("lesson_id", lesson_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn completions(&self, user_id: UserId) -> Result<Vec<CompletedLesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, lesson_id, completed_at
            FROM completed_lessons
            WHERE user_id = ?1
            ORDER BY completed_at DESC, lesson_id DESC
            ",
        )
        .bind(user_key(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_completion_row).collect()
    }
}
