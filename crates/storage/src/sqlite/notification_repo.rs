use chronicles_core::model::{NewNotification, Notification, NotificationId, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_notification_row, user_key};
use crate::repository::{NotificationRepository, StorageError};

#[async_trait::async_trait]
impl NotificationRepository for SqliteRepository {
    async fn insert_notifications(
        &self,
        batch: &[NewNotification],
    ) -> Result<Vec<Notification>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut stored = Vec::with_capacity(batch.len());

        for item in batch {
            let res = sqlx::query(
                r"
                INSERT INTO notifications (user_id, title, message, icon, color, link, read, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)
                ",
            )
            .bind(user_key(item.user_id))
            .bind(item.title.as_str())
            .bind(item.message.as_str())
            .bind(item.icon.as_str())
            .bind(item.color.as_str())
            .bind(item.link.as_deref())
            .bind(item.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            let id = u64::try_from(res.last_insert_rowid())
                .map_err(|_| StorageError::Serialization("notification_id sign overflow".into()))?;
            stored.push(item.clone().with_id(NotificationId::new(id)));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(stored)
    }

    async fn notifications_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, title, message, icon, color, link, read, created_at
            FROM notifications
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_key(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_notification_row).collect()
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StorageError> {
        let res = sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0")
            .bind(user_key(user_id))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }

    async fn delete_notification(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM notifications WHERE id = ?1 AND user_id = ?2")
            .bind(id_i64("notification_id", id.value())?)
            .bind(user_key(user_id))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
