use std::sync::Arc;

use chronicles_core::model::{Profile, ProfileUpdate, Role, SignUpForm, UserId};
use rand::Rng;
use storage::repository::ProfileRepository;
use tracing::{debug, info, warn};

use crate::Clock;
use crate::access::role_of;
use crate::avatar::{AvatarStore, content_type_for};
use crate::error::{AvatarError, ProfileServiceError};

/// The signed-in user as the rest of the app sees them.
///
/// A fresh identity may not have a profile row yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub profile: Option<Profile>,
    pub role: Role,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Resolves, creates and edits user profiles.
#[derive(Clone)]
pub struct ProfileService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    avatars: Option<Arc<dyn AvatarStore>>,
}

impl ProfileService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        avatars: Option<Arc<dyn AvatarStore>>,
    ) -> Self {
        Self {
            clock,
            profiles,
            avatars,
        }
    }

    /// Load the profile and role for an authenticated identity.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Storage` if repository access fails.
    pub async fn resolve(&self, user_id: UserId) -> Result<CurrentUser, ProfileServiceError> {
        let profile = self.profiles.get_profile(user_id).await?;
        let role = role_of(self.profiles.as_ref(), user_id).await?;
        debug!(%user_id, has_profile = profile.is_some(), ?role, "resolved user");
        Ok(CurrentUser {
            user_id,
            profile,
            role,
        })
    }

    /// Validate a sign-up form and create the profile for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Profile` for invalid input and
    /// `ProfileServiceError::Storage` (with `Conflict`) if the profile exists.
    pub async fn sign_up(
        &self,
        user_id: UserId,
        form: SignUpForm,
    ) -> Result<Profile, ProfileServiceError> {
        let profile = form.validate(user_id, self.clock.now())?;
        self.profiles.insert_profile(&profile).await?;
        info!(%user_id, grade = %profile.grade, "profile created");
        Ok(profile)
    }

    /// # Errors
    ///
    /// Returns `ProfileServiceError::NotFound` if the user has no profile.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<Profile, ProfileServiceError> {
        let mut profile = self.load(user_id).await?;
        profile.apply(update, self.clock.now())?;
        self.profiles.update_profile(&profile).await?;
        info!(%user_id, group = %profile.grade_group(), "profile updated");
        Ok(profile)
    }

    /// Upload a new avatar image and point the profile at it.
    ///
    /// The object lands at `{user_id}/{random}.{extension}` so every upload gets
    /// a fresh URL.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Avatar` when uploads are disabled, the file
    /// type is not an image, or the upload fails.
    pub async fn upload_avatar(
        &self,
        user_id: UserId,
        bytes: Vec<u8>,
        extension: &str,
    ) -> Result<Profile, ProfileServiceError> {
        let store = self.avatars.as_ref().ok_or(AvatarError::Disabled)?;
        if bytes.is_empty() {
            return Err(AvatarError::EmptyUpload.into());
        }
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        let content_type = content_type_for(&extension)
            .ok_or_else(|| AvatarError::UnsupportedType(extension.clone()))?;

        let mut profile = self.load(user_id).await?;
        let suffix: u64 = rand::rng().random();
        let path = format!("{user_id}/{suffix:016x}.{extension}");

        let url = store.upload(&path, bytes, content_type).await.map_err(|e| {
            warn!(%user_id, error = %e, "avatar upload failed");
            e
        })?;
        profile.set_avatar(url, self.clock.now());
        self.profiles.update_profile(&profile).await?;
        info!(%user_id, %path, "avatar updated");
        Ok(profile)
    }

    async fn load(&self, user_id: UserId) -> Result<Profile, ProfileServiceError> {
        self.profiles
            .get_profile(user_id)
            .await?
            .ok_or(ProfileServiceError::NotFound)
    }
}
