use chronicles_core::model::{Activity, ActivityId, LessonId, ValidatedActivity};

use super::SqliteRepository;
use super::mapping::{answer_to_json, db_err, id_i64, map_activity_row, options_to_json};
use crate::repository::{ActivityRepository, StorageError};

#[async_trait::async_trait]
impl ActivityRepository for SqliteRepository {
    async fn insert_activity(&self, activity: &ValidatedActivity) -> Result<Activity, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO activities (lesson_id, prompt, options, answer, position)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("lesson_id", activity.lesson_id.value())?)
        .bind(activity.prompt.as_str())
        .bind(options_to_json(&activity.options)?)
        .bind(answer_to_json(&activity.answer)?)
        .bind(i64::from(activity.position))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("activity_id sign overflow".into()))?;
        Ok(activity.clone().assign_id(ActivityId::new(id)))
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE activities SET
                lesson_id = ?2,
                prompt = ?3,
                options = ?4,
                answer = ?5,
                position = ?6
            WHERE id = ?1
            ",
        )
        .bind(id_i64("activity_id", activity.id.value())?)
        .bind(id_i64("lesson_id", activity.lesson_id.value())?)
        .bind(activity.prompt.as_str())
        .bind(options_to_json(&activity.options)?)
        .bind(answer_to_json(&activity.answer)?)
        .bind(i64::from(activity.position))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_activity(&self, id: ActivityId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM activities WHERE id = ?1")
            .bind(id_i64("activity_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, lesson_id, prompt, options, answer, position
            FROM activities WHERE id = ?1
            ",
        )
        .bind(id_i64("activity_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_activity_row).transpose()
    }

    async fn activities_for_lesson(&self, lesson_id: LessonId) -> Result<Vec<Activity>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, lesson_id, prompt, options, answer, position
            FROM activities
            WHERE lesson_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_activity_row).collect()
    }
}
