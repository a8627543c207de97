use std::collections::HashSet;

use chronicles_core::model::{GradeGroup, Guardian, GuardianId, Role, UserId};
use chronicles_core::progress;
use storage::repository::{CatalogRepository, ProfileRepository, ProgressRepository, StorageError};

/// Role of `user_id` according to the admins table.
pub(crate) async fn role_of(
    profiles: &dyn ProfileRepository,
    user_id: UserId,
) -> Result<Role, StorageError> {
    if profiles.is_admin(user_id).await? {
        Ok(Role::Admin)
    } else {
        Ok(Role::Student)
    }
}

/// Grade group used to filter content for `user_id`. Users without a
/// profile see every group.
pub(crate) async fn viewer_group(
    profiles: &dyn ProfileRepository,
    user_id: UserId,
) -> Result<GradeGroup, StorageError> {
    Ok(profiles
        .get_profile(user_id)
        .await?
        .map_or(GradeGroup::All, |p| p.grade_group()))
}

/// Guardians currently open for `user_id`. The first guardian is open even
/// when it has no fragment in the catalog.
pub(crate) async fn open_guardians(
    catalog: &dyn CatalogRepository,
    holdings: &dyn ProgressRepository,
    user_id: UserId,
) -> Result<HashSet<GuardianId>, StorageError> {
    let guardians = catalog.list_guardians().await?;
    let entries = catalog.list_catalog().await?;
    let owned = holdings.user_fragments(user_id).await?;
    Ok(guardians
        .iter()
        .filter(|g| progress::is_unlocked(g.progression_order(), &entries, &owned))
        .map(Guardian::id)
        .collect())
}
