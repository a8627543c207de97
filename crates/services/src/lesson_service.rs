use std::collections::BTreeMap;
use std::sync::Arc;

use chronicles_core::model::{GuardianId, Lesson, LessonDraft, LessonId, UserId};
use chronicles_core::sequencer::{self, NextLesson};
use chronicles_core::stats::latest_completion;
use storage::repository::{
    CatalogRepository, LessonFilter, LessonRepository, ProfileRepository, ProgressRepository,
};
use tracing::{debug, info};

use crate::Clock;
use crate::access::{open_guardians, role_of, viewer_group};
use crate::error::LessonServiceError;

/// Lesson administration and learner-facing lesson queries.
#[derive(Clone)]
pub struct LessonService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    catalog: Arc<dyn CatalogRepository>,
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl LessonService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        catalog: Arc<dyn CatalogRepository>,
        lessons: Arc<dyn LessonRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            profiles,
            catalog,
            lessons,
            progress,
        }
    }

    async fn require_admin(&self, actor: UserId) -> Result<(), LessonServiceError> {
        if role_of(self.profiles.as_ref(), actor).await?.is_admin() {
            Ok(())
        } else {
            Err(LessonServiceError::Forbidden)
        }
    }

    //
    // ─── ADMIN ─────────────────────────────────────────────────────────────────
    //

    /// Create a lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonServiceError::Forbidden` for non-admins,
    /// `LessonServiceError::Lesson` for invalid input and
    /// `LessonServiceError::Storage` on repository failure.
    pub async fn create(&self, actor: UserId, draft: LessonDraft) -> Result<Lesson, LessonServiceError> {
        self.require_admin(actor).await?;
        let validated = draft.validate(self.clock.now())?;
        let lesson = self.lessons.insert_lesson(&validated).await?;
        info!(%actor, lesson_id = %lesson.id, guardian_id = %lesson.guardian_id, "lesson created");
        Ok(lesson)
    }

    /// Replace a lesson's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `LessonServiceError::Forbidden` for non-admins,
    /// `LessonServiceError::NotFound` if the lesson is missing and
    /// `LessonServiceError::Lesson` for invalid input.
    pub async fn update(
        &self,
        actor: UserId,
        id: LessonId,
        draft: LessonDraft,
    ) -> Result<Lesson, LessonServiceError> {
        self.require_admin(actor).await?;
        let current = self.get(id).await?;
        let now = self.clock.now();
        let revised = current.revise(draft.validate(now)?, now);
        self.lessons.update_lesson(&revised).await?;
        info!(%actor, lesson_id = %id, "lesson updated");
        Ok(revised)
    }

    /// Delete a lesson together with its activities and completions.
    ///
    /// # Errors
    ///
    /// Returns `LessonServiceError::Forbidden` for non-admins and
    /// `LessonServiceError::NotFound` if the lesson is missing.
    pub async fn delete(&self, actor: UserId, id: LessonId) -> Result<(), LessonServiceError> {
        self.require_admin(actor).await?;
        self.lessons.delete_lesson(id).await.map_err(not_found)?;
        info!(%actor, lesson_id = %id, "lesson deleted");
        Ok(())
    }

    /// Every lesson, inactive ones included.
    ///
    /// # Errors
    ///
    /// Returns `LessonServiceError::Forbidden` for non-admins.
    pub async fn list_all(&self, actor: UserId) -> Result<Vec<Lesson>, LessonServiceError> {
        self.require_admin(actor).await?;
        Ok(self.lessons.list_lessons(LessonFilter::default()).await?)
    }

    //
    // ─── LEARNER ───────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `LessonServiceError::NotFound` if no lesson has this id.
    pub async fn get(&self, id: LessonId) -> Result<Lesson, LessonServiceError> {
        self.lessons
            .get_lesson(id)
            .await?
            .ok_or(LessonServiceError::NotFound)
    }

    /// Lessons available to the user: active, visible to their grade group
    /// and under an unlocked guardian. Optionally limited to one guardian.
    ///
    /// # Errors
    ///
    /// Returns `LessonServiceError::Storage` if repository access fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        guardian_id: Option<GuardianId>,
    ) -> Result<Vec<Lesson>, LessonServiceError> {
        let group = viewer_group(self.profiles.as_ref(), user_id).await?;
        let unlocked =
            open_guardians(self.catalog.as_ref(), self.progress.as_ref(), user_id).await?;
        let filter = match guardian_id {
            Some(id) => LessonFilter::active().for_guardian(id),
            None => LessonFilter::active(),
        };
        let lessons: Vec<Lesson> = self
            .lessons
            .list_lessons(filter)
            .await?
            .into_iter()
            .filter(|l| l.is_visible_to(group) && unlocked.contains(&l.guardian_id))
            .collect();
        debug!(%user_id, %group, count = lessons.len(), "listed lessons");
        Ok(lessons)
    }

    /// Same as [`Self::list_for_user`], grouped by unit and sorted by position.
    ///
    /// # Errors
    ///
    /// Returns `LessonServiceError::Storage` if repository access fails.
    pub async fn lessons_by_unit(
        &self,
        user_id: UserId,
        guardian_id: Option<GuardianId>,
    ) -> Result<BTreeMap<u32, Vec<Lesson>>, LessonServiceError> {
        let mut units: BTreeMap<u32, Vec<Lesson>> = BTreeMap::new();
        for lesson in self.list_for_user(user_id, guardian_id).await? {
            units.entry(lesson.unit).or_default().push(lesson);
        }
        for lessons in units.values_mut() {
            lessons.sort_by_key(|l| (l.position, l.created_at, l.id));
        }
        Ok(units)
    }

    /// The lesson the user should open next.
    ///
    /// # Errors
    ///
    /// Returns `LessonServiceError::Storage` if repository access fails.
    pub async fn next_lesson(&self, user_id: UserId) -> Result<NextLesson, LessonServiceError> {
        let group = viewer_group(self.profiles.as_ref(), user_id).await?;
        let unlocked =
            open_guardians(self.catalog.as_ref(), self.progress.as_ref(), user_id).await?;

        let completions = self.progress.completions(user_id).await?;
        let last = match latest_completion(&completions) {
            Some(done) => self.lessons.get_lesson(done.lesson_id).await?,
            None => None,
        };

        let lessons = self.lessons.list_lessons(LessonFilter::active()).await?;
        let next = sequencer::next_lesson(&lessons, &unlocked, group, last.as_ref());
        debug!(
            %user_id,
            unlocked = unlocked.len(),
            next = ?next.lesson().map(|l| l.id),
            "resolved next lesson"
        );
        Ok(next)
    }
}

fn not_found(err: storage::StorageError) -> LessonServiceError {
    match err {
        storage::StorageError::NotFound => LessonServiceError::NotFound,
        other => LessonServiceError::Storage(other),
    }
}
