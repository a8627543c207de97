use chronicles_core::model::{Fragment, Guardian, GuardianId};
use chronicles_core::progress::CatalogEntry;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    db_err, guardian_from_columns, id_i64, map_fragment_row, map_guardian_row, ser,
};
use crate::repository::{CatalogRepository, StorageError};

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_guardian(&self, guardian: &Guardian) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO guardians (id, name, area, progression_order, unlock_threshold)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                area = excluded.area,
                progression_order = excluded.progression_order,
                unlock_threshold = excluded.unlock_threshold
            ",
        )
        .bind(id_i64("guardian_id", guardian.id().value())?)
        .bind(guardian.name())
        .bind(guardian.area().as_str())
        .bind(i64::from(guardian.progression_order()))
        .bind(guardian.unlock_threshold())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_guardians(&self) -> Result<Vec<Guardian>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, area, progression_order, unlock_threshold
            FROM guardians
            ORDER BY progression_order ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_guardian_row).collect()
    }

    async fn get_guardian(&self, id: GuardianId) -> Result<Option<Guardian>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, name, area, progression_order, unlock_threshold
            FROM guardians WHERE id = ?1
            ",
        )
        .bind(id_i64("guardian_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_guardian_row).transpose()
    }

    async fn upsert_fragment(&self, fragment: &Fragment) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO fragments (id, guardian_id, name, capacity)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                guardian_id = excluded.guardian_id,
                name = excluded.name,
                capacity = excluded.capacity
            ",
        )
        .bind(id_i64("fragment_id", fragment.id().value())?)
        .bind(id_i64("guardian_id", fragment.guardian_id().value())?)
        .bind(fragment.name())
        .bind(i64::from(fragment.capacity()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT f.id, f.guardian_id, f.name, f.capacity,
                   g.id AS g_id, g.name AS g_name, g.area AS g_area,
                   g.progression_order AS g_order, g.unlock_threshold AS g_threshold
            FROM fragments f
            LEFT JOIN guardians g ON g.id = f.guardian_id
            ORDER BY f.id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let fragment = map_fragment_row(row)?;
            let has_guardian = row.try_get::<Option<i64>, _>("g_id").map_err(ser)?.is_some();
            let guardian = if has_guardian {
                Some(guardian_from_columns(
                    row,
                    "g_id",
                    "g_name",
                    "g_area",
                    "g_order",
                    "g_threshold",
                )?)
            } else {
                None
            };
            entries.push(CatalogEntry::new(fragment, guardian));
        }
        Ok(entries)
    }

    async fn fragment_for_guardian(
        &self,
        guardian_id: GuardianId,
    ) -> Result<Option<Fragment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, guardian_id, name, capacity
            FROM fragments
            WHERE guardian_id = ?1
            ORDER BY id ASC
            LIMIT 1
            ",
        )
        .bind(id_i64("guardian_id", guardian_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_fragment_row).transpose()
    }
}
