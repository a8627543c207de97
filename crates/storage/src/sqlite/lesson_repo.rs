use chronicles_core::model::{Lesson, LessonId, ValidatedLesson};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_lesson_row, urls_to_json};
use crate::repository::{LessonFilter, LessonRepository, StorageError};

const LESSON_COLUMNS: &str = r"
    SELECT id, guardian_id, title, content, unit, position, active, grade_group,
           video_urls, image_url, created_at, updated_at
    FROM lessons
";

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn insert_lesson(&self, lesson: &ValidatedLesson) -> Result<Lesson, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO lessons (
                guardian_id, title, content, unit, position, active, grade_group,
                video_urls, image_url, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            ",
        )
        .bind(id_i64("guardian_id", lesson.guardian_id.value())?)
        .bind(lesson.title.as_str())
        .bind(lesson.content.as_str())
        .bind(i64::from(lesson.unit))
        .bind(i64::from(lesson.position))
        .bind(i64::from(lesson.active))
        .bind(lesson.grade_group.as_str())
        .bind(urls_to_json(&lesson.video_urls)?)
        .bind(lesson.image_url.as_ref().map(|u| u.as_str().to_owned()))
        .bind(lesson.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("lesson_id sign overflow".into()))?;
        Ok(lesson.clone().assign_id(LessonId::new(id)))
    }

    async fn update_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE lessons SET
                guardian_id = ?2,
                title = ?3,
                content = ?4,
                unit = ?5,
                position = ?6,
                active = ?7,
                grade_group = ?8,
                video_urls = ?9,
                image_url = ?10,
                updated_at = ?11
            WHERE id = ?1
            ",
        )
        .bind(id_i64("lesson_id", lesson.id.value())?)
        .bind(id_i64("guardian_id", lesson.guardian_id.value())?)
        .bind(lesson.title.as_str())
        .bind(lesson.content.as_str())
        .bind(i64::from(lesson.unit))
        .bind(i64::from(lesson.position))
        .bind(i64::from(lesson.active))
        .bind(lesson.grade_group.as_str())
        .bind(urls_to_json(&lesson.video_urls)?)
        .bind(lesson.image_url.as_ref().map(|u| u.as_str().to_owned()))
        .bind(lesson.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_lesson(&self, id: LessonId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM lessons WHERE id = ?1")
            .bind(id_i64("lesson_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let sql = format!("{LESSON_COLUMNS} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("lesson_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn list_lessons(&self, filter: LessonFilter) -> Result<Vec<Lesson>, StorageError> {
        let mut sql = String::from(LESSON_COLUMNS);
        sql.push_str(" WHERE 1 = 1");
        if filter.active_only {
            sql.push_str(" AND active = 1");
        }
        if filter.guardian_id.is_some() {
            sql.push_str(" AND guardian_id = ?1");
        }
        sql.push_str(" ORDER BY unit ASC, position ASC, created_at ASC, id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(guardian_id) = filter.guardian_id {
            query = query.bind(id_i64("guardian_id", guardian_id.value())?);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(map_lesson_row).collect()
    }
}
