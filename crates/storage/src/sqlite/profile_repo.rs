use chrono::Utc;
use chronicles_core::model::{GradeGroup, Profile, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, map_profile_row, user_key};
use crate::repository::{ProfileRepository, StorageError};

const PROFILE_COLUMNS: &str = r"
    SELECT user_id, display_name, school, grade, grade_group, birth_date, avatar_url,
           created_at, updated_at
    FROM profiles
";

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn insert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO profiles (
                user_id, display_name, school, grade, grade_group, birth_date, avatar_url,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(user_key(profile.user_id))
        .bind(profile.display_name.as_str())
        .bind(profile.school.as_deref())
        .bind(i64::from(profile.grade.value()))
        .bind(profile.grade_group().as_str())
        .bind(profile.birth_date)
        .bind(profile.avatar_url.as_ref().map(|u| u.as_str().to_owned()))
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE profiles SET
                display_name = ?2,
                school = ?3,
                grade = ?4,
                grade_group = ?5,
                birth_date = ?6,
                avatar_url = ?7,
                updated_at = ?8
            WHERE user_id = ?1
            ",
        )
        .bind(user_key(profile.user_id))
        .bind(profile.display_name.as_str())
        .bind(profile.school.as_deref())
        .bind(i64::from(profile.grade.value()))
        .bind(profile.grade_group().as_str())
        .bind(profile.birth_date)
        .bind(profile.avatar_url.as_ref().map(|u| u.as_str().to_owned()))
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, StorageError> {
        let sql = format!("{PROFILE_COLUMNS} WHERE user_id = ?1");
        let row = sqlx::query(&sql)
            .bind(user_key(user_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_profile_row).transpose()
    }

    async fn list_profiles(&self, group: Option<GradeGroup>) -> Result<Vec<Profile>, StorageError> {
        let rows = match group {
            Some(group) if group != GradeGroup::All => {
                let sql = format!("{PROFILE_COLUMNS} WHERE grade_group = ?1 ORDER BY created_at, user_id");
                sqlx::query(&sql)
                    .bind(group.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            _ => {
                let sql = format!("{PROFILE_COLUMNS} ORDER BY created_at, user_id");
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(db_err)?;

        rows.iter().map(map_profile_row).collect()
    }

    async fn is_admin(&self, user_id: UserId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM admins WHERE user_id = ?1")
            .bind(user_key(user_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn grant_admin(&self, user_id: UserId) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO admins (user_id, created_at)
            VALUES (?1, ?2)
            ON CONFLICT(user_id) DO NOTHING
            ",
        )
        .bind(user_key(user_id))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
