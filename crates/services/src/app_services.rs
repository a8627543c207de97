use std::sync::Arc;

use chrono::FixedOffset;
use storage::repository::Storage;

use crate::Clock;
use crate::activity_service::ActivityService;
use crate::avatar::AvatarStore;
use crate::error::AppServicesError;
use crate::fragment_service::FragmentService;
use crate::lesson_service::LessonService;
use crate::notifications::NotificationService;
use crate::profile_service::ProfileService;
use crate::stats_service::StatsService;

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    profiles: Arc<ProfileService>,
    fragments: Arc<FragmentService>,
    lessons: Arc<LessonService>,
    activities: Arc<ActivityService>,
    stats: Arc<StatsService>,
    notifications: Arc<NotificationService>,
}

impl AppServices {
    /// Wire every service to `storage`. `utc_offset` sets the streak calendar;
    /// without an avatar store uploads are disabled.
    #[must_use]
    pub fn new(
        storage: &Storage,
        clock: Clock,
        utc_offset: FixedOffset,
        avatars: Option<Arc<dyn AvatarStore>>,
    ) -> Self {
        let profiles = Arc::new(ProfileService::new(
            clock,
            Arc::clone(&storage.profiles),
            avatars,
        ));
        let fragments = Arc::new(FragmentService::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.progress),
        ));
        let lessons = Arc::new(LessonService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
        ));
        let activities = Arc::new(ActivityService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.activities),
            Arc::clone(&storage.progress),
        ));
        let stats = Arc::new(StatsService::new(
            clock,
            utc_offset,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
        ));
        let notifications = Arc::new(NotificationService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.notifications),
        ));

        Self {
            profiles,
            fragments,
            lessons,
            activities,
            stats,
            notifications,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        utc_offset: FixedOffset,
        avatars: Option<Arc<dyn AvatarStore>>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock, utc_offset, avatars))
    }

    #[must_use]
    pub fn profiles(&self) -> Arc<ProfileService> {
        Arc::clone(&self.profiles)
    }

    #[must_use]
    pub fn fragments(&self) -> Arc<FragmentService> {
        Arc::clone(&self.fragments)
    }

    #[must_use]
    pub fn lessons(&self) -> Arc<LessonService> {
        Arc::clone(&self.lessons)
    }

    #[must_use]
    pub fn activities(&self) -> Arc<ActivityService> {
        Arc::clone(&self.activities)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<StatsService> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn notifications(&self) -> Arc<NotificationService> {
        Arc::clone(&self.notifications)
    }
}
