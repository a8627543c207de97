use std::sync::Arc;

use chrono::FixedOffset;
use chronicles_core::model::UserId;
use chronicles_core::progress;
use chronicles_core::stats::{UserStats, build_stats, latest_completion};
use storage::repository::{CatalogRepository, LessonRepository, ProgressRepository};
use tracing::debug;

use crate::Clock;
use crate::error::ProgressServiceError;

/// Dashboard statistics for one learner.
#[derive(Clone)]
pub struct StatsService {
    clock: Clock,
    utc_offset: FixedOffset,
    catalog: Arc<dyn CatalogRepository>,
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl StatsService {
    /// `utc_offset` fixes the calendar used for the study streak.
    #[must_use]
    pub fn new(
        clock: Clock,
        utc_offset: FixedOffset,
        catalog: Arc<dyn CatalogRepository>,
        lessons: Arc<dyn LessonRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            utc_offset,
            catalog,
            lessons,
            progress,
        }
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn stats(&self, user_id: UserId) -> Result<UserStats, ProgressServiceError> {
        let catalog = self.catalog.list_catalog().await?;
        let owned = self.progress.user_fragments(user_id).await?;
        let view = progress::aggregate(&catalog, &owned);

        let completions = self.progress.completions(user_id).await?;
        let last_lesson = match latest_completion(&completions) {
            Some(done) => self.lessons.get_lesson(done.lesson_id).await?,
            None => None,
        };

        let now = self.clock.now().with_timezone(&self.utc_offset);
        let stats = build_stats(&view, &completions, last_lesson, now);
        debug!(
            %user_id,
            streak = stats.streak,
            total_lessons = stats.total_lessons,
            progress_percent = stats.progress_percent,
            "computed stats"
        );
        Ok(stats)
    }
}
