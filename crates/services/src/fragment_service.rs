use std::collections::HashSet;
use std::sync::Arc;

use chronicles_core::model::{GuardianId, UserFragment, UserId};
use chronicles_core::progress::{self, FragmentProgress};
use storage::repository::{CatalogRepository, ProgressRepository};
use tracing::{debug, info};

use crate::Clock;
use crate::error::ProgressServiceError;

/// Joins the fragment catalog with a user's holdings.
#[derive(Clone)]
pub struct FragmentService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl FragmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            progress,
        }
    }

    /// Quantity, percentage and unlock flag for every fragment in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn progress(&self, user_id: UserId) -> Result<Vec<FragmentProgress>, ProgressServiceError> {
        let catalog = self.catalog.list_catalog().await?;
        let owned = self.progress.user_fragments(user_id).await?;
        let view = progress::aggregate(&catalog, &owned);
        debug!(
            %user_id,
            fragments = view.len(),
            unlocked = view.iter().filter(|p| p.unlocked).count(),
            "computed fragment progress"
        );
        Ok(view)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn unlocked_guardians(
        &self,
        user_id: UserId,
    ) -> Result<HashSet<GuardianId>, ProgressServiceError> {
        let view = self.progress(user_id).await?;
        Ok(progress::unlocked_guardian_ids(&view))
    }

    /// Whether the guardian at `order` is open for the user.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn is_guardian_unlocked(
        &self,
        user_id: UserId,
        order: u32,
    ) -> Result<bool, ProgressServiceError> {
        if order == 1 {
            return Ok(true);
        }
        let catalog = self.catalog.list_catalog().await?;
        let owned = self.progress.user_fragments(user_id).await?;
        Ok(progress::is_unlocked(order, &catalog, &owned))
    }

    /// Give the user `amount` of the guardian's fragment, clamped to capacity.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NoFragment` if the guardian has no
    /// fragment, or `ProgressServiceError::Storage` on repository failure.
    pub async fn add_fragments(
        &self,
        user_id: UserId,
        guardian_id: GuardianId,
        amount: u32,
    ) -> Result<UserFragment, ProgressServiceError> {
        let fragment = self
            .catalog
            .fragment_for_guardian(guardian_id)
            .await?
            .ok_or(ProgressServiceError::NoFragment)?;
        let held = self
            .progress
            .add_fragments(user_id, &fragment, amount, self.clock.now())
            .await?;
        info!(%user_id, %guardian_id, amount, quantity = held.quantity, "fragments added");
        Ok(held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicles_core::model::{Area, Fragment, FragmentId, Guardian};
    use chronicles_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    async fn service() -> FragmentService {
        let repo = InMemoryRepository::new();
        for (id, order) in [(1, 1), (2, 2)] {
            let guardian =
                Guardian::new(GuardianId::new(id), format!("G{id}"), Area::Math, order, 50.0).unwrap();
            repo.upsert_guardian(&guardian).await.unwrap();
            let fragment = Fragment::new(FragmentId::new(id), guardian.id(), "F", 4).unwrap();
            repo.upsert_fragment(&fragment).await.unwrap();
        }
        FragmentService::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo))
    }

    #[tokio::test]
    async fn earning_fragments_unlocks_next_guardian() {
        let service = service().await;
        let user = UserId::random();
        assert!(service.is_guardian_unlocked(user, 1).await.unwrap());
        assert!(!service.is_guardian_unlocked(user, 2).await.unwrap());

        service.add_fragments(user, GuardianId::new(1), 2).await.unwrap();
        assert!(service.is_guardian_unlocked(user, 2).await.unwrap());

        let unlocked = service.unlocked_guardians(user).await.unwrap();
        assert_eq!(unlocked.len(), 2);
    }

    #[tokio::test]
    async fn adding_past_capacity_clamps() {
        let service = service().await;
        let user = UserId::random();
        let held = service.add_fragments(user, GuardianId::new(2), 9).await.unwrap();
        assert_eq!(held.quantity, 4);

        let view = service.progress(user).await.unwrap();
        assert_eq!(view[1].percentage, 100.0);
        assert_eq!(view[0].quantity, 0);
    }

    #[tokio::test]
    async fn unknown_guardian_has_no_fragment() {
        let service = service().await;
        let err = service
            .add_fragments(UserId::random(), GuardianId::new(7), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::NoFragment));
    }
}
