use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicles_core::model::{
    Activity, ActivityId, CompletedLesson, CompletionOutcome, Fragment, FragmentId, GradeGroup,
    Guardian, GuardianId, Lesson, LessonId, NewNotification, Notification, NotificationId, Profile,
    UserFragment, UserId, ValidatedActivity, ValidatedLesson, clamp_quantity,
};
use chronicles_core::progress::CatalogEntry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Profiles and the admin role table.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Create the profile for a freshly registered user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already has a profile.
    async fn insert_profile(&self, profile: &Profile) -> Result<(), StorageError>;

    /// Overwrite an existing profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user has no profile.
    async fn update_profile(&self, profile: &Profile) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, StorageError>;

    /// List profiles, optionally restricted to one grade group. `All` and
    /// `None` both return everyone.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_profiles(&self, group: Option<GradeGroup>) -> Result<Vec<Profile>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn is_admin(&self, user_id: UserId) -> Result<bool, StorageError>;

    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn grant_admin(&self, user_id: UserId) -> Result<(), StorageError>;
}

/// The static guardian/fragment catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the guardian cannot be stored.
    async fn upsert_guardian(&self, guardian: &Guardian) -> Result<(), StorageError>;

    /// Guardians in progression order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_guardians(&self) -> Result<Vec<Guardian>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_guardian(&self, id: GuardianId) -> Result<Option<Guardian>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the guardian does not exist.
    async fn upsert_fragment(&self, fragment: &Fragment) -> Result<(), StorageError>;

    /// Every fragment joined with its guardian, when the guardian exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn fragment_for_guardian(
        &self,
        guardian_id: GuardianId,
    ) -> Result<Option<Fragment>, StorageError>;
}

/// Query options for listing lessons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LessonFilter {
    pub guardian_id: Option<GuardianId>,
    pub active_only: bool,
}

impl LessonFilter {
    #[must_use]
    pub fn active() -> Self {
        Self {
            guardian_id: None,
            active_only: true,
        }
    }

    #[must_use]
    pub fn for_guardian(mut self, guardian_id: GuardianId) -> Self {
        self.guardian_id = Some(guardian_id);
        self
    }

    fn matches(self, lesson: &Lesson) -> bool {
        (!self.active_only || lesson.active)
            && self.guardian_id.is_none_or(|id| id == lesson.guardian_id)
    }
}

#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Insert a lesson and return it with its new id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the guardian does not exist.
    async fn insert_lesson(&self, lesson: &ValidatedLesson) -> Result<Lesson, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist.
    async fn update_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// Delete a lesson together with its activities and completions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist.
    async fn delete_lesson(&self, id: LessonId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Lessons ordered by unit, position, creation time and id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_lessons(&self, filter: LessonFilter) -> Result<Vec<Lesson>, StorageError>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist.
    async fn insert_activity(&self, activity: &ValidatedActivity) -> Result<Activity, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the activity does not exist.
    async fn update_activity(&self, activity: &Activity) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the activity does not exist.
    async fn delete_activity(&self, id: ActivityId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StorageError>;

    /// Activities of a lesson in position order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn activities_for_lesson(&self, lesson_id: LessonId) -> Result<Vec<Activity>, StorageError>;
}

/// Fragment holdings and lesson completions.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn user_fragments(&self, user_id: UserId) -> Result<Vec<UserFragment>, StorageError>;

    /// Add `amount` to the user's holding of `fragment`, clamped to its capacity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the fragment does not exist.
    async fn add_fragments(
        &self,
        user_id: UserId,
        fragment: &Fragment,
        amount: u32,
        at: DateTime<Utc>,
    ) -> Result<UserFragment, StorageError>;

    /// Mark a lesson completed. On a first completion, `reward` (if any)
    /// gains one unit in the same atomic step. A repeat completion changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist.
    async fn record_completion(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        reward: Option<&Fragment>,
        at: DateTime<Utc>,
    ) -> Result<CompletionOutcome, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn is_completed(&self, user_id: UserId, lesson_id: LessonId) -> Result<bool, StorageError>;

    /// Completions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn completions(&self, user_id: UserId) -> Result<Vec<CompletedLesson>, StorageError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert a batch atomically and return the stored rows in input order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any row cannot be stored; nothing is kept then.
    async fn insert_notifications(
        &self,
        batch: &[NewNotification],
    ) -> Result<Vec<Notification>, StorageError>;

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn notifications_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, StorageError>;

    /// Returns how many notifications flipped from unread to read.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` unless the notification exists and
    /// belongs to `user_id`.
    async fn delete_notification(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct State {
    profiles: HashMap<UserId, Profile>,
    admins: HashSet<UserId>,
    guardians: HashMap<GuardianId, Guardian>,
    fragments: BTreeMap<FragmentId, Fragment>,
    lessons: BTreeMap<LessonId, Lesson>,
    activities: BTreeMap<ActivityId, Activity>,
    holdings: HashMap<(UserId, FragmentId), UserFragment>,
    completions: HashMap<(UserId, LessonId), CompletedLesson>,
    notifications: BTreeMap<NotificationId, Notification>,
    next_lesson_id: u64,
    next_activity_id: u64,
    next_notification_id: u64,
}

impl State {
    fn add_quantity(
        &mut self,
        user_id: UserId,
        fragment: &Fragment,
        amount: u32,
        at: DateTime<Utc>,
    ) -> Result<UserFragment, StorageError> {
        if !self.fragments.contains_key(&fragment.id()) {
            return Err(StorageError::NotFound);
        }
        let held = self
            .holdings
            .entry((user_id, fragment.id()))
            .or_insert_with(|| UserFragment {
                user_id,
                fragment_id: fragment.id(),
                quantity: 0,
                updated_at: at,
            });
        held.quantity = clamp_quantity(held.quantity, amount, fragment.capacity());
        held.updated_at = at;
        Ok(held.clone())
    }
}

fn next_id(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn insert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.profiles.contains_key(&profile.user_id) {
            return Err(StorageError::Conflict);
        }
        state.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn update_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let slot = state
            .profiles
            .get_mut(&profile.user_id)
            .ok_or(StorageError::NotFound)?;
        *slot = profile.clone();
        Ok(())
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, StorageError> {
        Ok(self.lock()?.profiles.get(&user_id).cloned())
    }

    async fn list_profiles(&self, group: Option<GradeGroup>) -> Result<Vec<Profile>, StorageError> {
        let state = self.lock()?;
        let mut out: Vec<Profile> = state
            .profiles
            .values()
            .filter(|p| group.is_none_or(|g| g.admits(p.grade_group())))
            .cloned()
            .collect();
        out.sort_by_key(|p| (p.created_at, p.user_id));
        Ok(out)
    }

    async fn is_admin(&self, user_id: UserId) -> Result<bool, StorageError> {
        Ok(self.lock()?.admins.contains(&user_id))
    }

    async fn grant_admin(&self, user_id: UserId) -> Result<(), StorageError> {
        self.lock()?.admins.insert(user_id);
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_guardian(&self, guardian: &Guardian) -> Result<(), StorageError> {
        self.lock()?.guardians.insert(guardian.id(), guardian.clone());
        Ok(())
    }

    async fn list_guardians(&self) -> Result<Vec<Guardian>, StorageError> {
        let mut out: Vec<Guardian> = self.lock()?.guardians.values().cloned().collect();
        out.sort_by_key(|g| (g.progression_order(), g.id()));
        Ok(out)
    }

    async fn get_guardian(&self, id: GuardianId) -> Result<Option<Guardian>, StorageError> {
        Ok(self.lock()?.guardians.get(&id).cloned())
    }

    async fn upsert_fragment(&self, fragment: &Fragment) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.guardians.contains_key(&fragment.guardian_id()) {
            return Err(StorageError::NotFound);
        }
        state.fragments.insert(fragment.id(), fragment.clone());
        Ok(())
    }

    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .fragments
            .values()
            .map(|f| CatalogEntry::new(f.clone(), state.guardians.get(&f.guardian_id()).cloned()))
            .collect())
    }

    async fn fragment_for_guardian(
        &self,
        guardian_id: GuardianId,
    ) -> Result<Option<Fragment>, StorageError> {
        Ok(self
            .lock()?
            .fragments
            .values()
            .find(|f| f.guardian_id() == guardian_id)
            .cloned())
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn insert_lesson(&self, lesson: &ValidatedLesson) -> Result<Lesson, StorageError> {
        let mut state = self.lock()?;
        if !state.guardians.contains_key(&lesson.guardian_id) {
            return Err(StorageError::NotFound);
        }
        let id = LessonId::new(next_id(&mut state.next_lesson_id));
        let stored = lesson.clone().assign_id(id);
        state.lessons.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.guardians.contains_key(&lesson.guardian_id) {
            return Err(StorageError::NotFound);
        }
        let slot = state.lessons.get_mut(&lesson.id).ok_or(StorageError::NotFound)?;
        *slot = lesson.clone();
        Ok(())
    }

    async fn delete_lesson(&self, id: LessonId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.lessons.remove(&id).ok_or(StorageError::NotFound)?;
        state.activities.retain(|_, a| a.lesson_id != id);
        state.completions.retain(|(_, lesson_id), _| *lesson_id != id);
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(self.lock()?.lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, filter: LessonFilter) -> Result<Vec<Lesson>, StorageError> {
        let mut out: Vec<Lesson> = self
            .lock()?
            .lessons
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        out.sort_by_key(|l| (l.unit, l.position, l.created_at, l.id));
        Ok(out)
    }
}

#[async_trait]
impl ActivityRepository for InMemoryRepository {
    async fn insert_activity(&self, activity: &ValidatedActivity) -> Result<Activity, StorageError> {
        let mut state = self.lock()?;
        if !state.lessons.contains_key(&activity.lesson_id) {
            return Err(StorageError::NotFound);
        }
        let id = ActivityId::new(next_id(&mut state.next_activity_id));
        let stored = activity.clone().assign_id(id);
        state.activities.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.lessons.contains_key(&activity.lesson_id) {
            return Err(StorageError::NotFound);
        }
        let slot = state
            .activities
            .get_mut(&activity.id)
            .ok_or(StorageError::NotFound)?;
        *slot = activity.clone();
        Ok(())
    }

    async fn delete_activity(&self, id: ActivityId) -> Result<(), StorageError> {
        self.lock()?
            .activities
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StorageError> {
        Ok(self.lock()?.activities.get(&id).cloned())
    }

    async fn activities_for_lesson(&self, lesson_id: LessonId) -> Result<Vec<Activity>, StorageError> {
        let mut out: Vec<Activity> = self
            .lock()?
            .activities
            .values()
            .filter(|a| a.lesson_id == lesson_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| (a.position, a.id));
        Ok(out)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn user_fragments(&self, user_id: UserId) -> Result<Vec<UserFragment>, StorageError> {
        let mut out: Vec<UserFragment> = self
            .lock()?
            .holdings
            .values()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|h| h.fragment_id);
        Ok(out)
    }

    async fn add_fragments(
        &self,
        user_id: UserId,
        fragment: &Fragment,
        amount: u32,
        at: DateTime<Utc>,
    ) -> Result<UserFragment, StorageError> {
        self.lock()?.add_quantity(user_id, fragment, amount, at)
    }

    async fn record_completion(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        reward: Option<&Fragment>,
        at: DateTime<Utc>,
    ) -> Result<CompletionOutcome, StorageError> {
        // One lock for the whole step keeps check, insert and reward atomic.
        let mut state = self.lock()?;
        if !state.lessons.contains_key(&lesson_id) {
            return Err(StorageError::NotFound);
        }
        if state.completions.contains_key(&(user_id, lesson_id)) {
            return Ok(CompletionOutcome::AlreadyCompleted);
        }
        if let Some(fragment) = reward {
            state.add_quantity(user_id, fragment, 1, at)?;
        }
        state.completions.insert(
            (user_id, lesson_id),
            CompletedLesson {
                user_id,
                lesson_id,
                completed_at: at,
            },
        );
        Ok(CompletionOutcome::Recorded)
    }

    async fn is_completed(&self, user_id: UserId, lesson_id: LessonId) -> Result<bool, StorageError> {
        Ok(self.lock()?.completions.contains_key(&(user_id, lesson_id)))
    }

    async fn completions(&self, user_id: UserId) -> Result<Vec<CompletedLesson>, StorageError> {
        let mut out: Vec<CompletedLesson> = self
            .lock()?
            .completions
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| (b.completed_at, b.lesson_id).cmp(&(a.completed_at, a.lesson_id)));
        Ok(out)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryRepository {
    async fn insert_notifications(
        &self,
        batch: &[NewNotification],
    ) -> Result<Vec<Notification>, StorageError> {
        let mut state = self.lock()?;
        let mut out = Vec::with_capacity(batch.len());
        for item in batch {
            let id = NotificationId::new(next_id(&mut state.next_notification_id));
            let stored = item.clone().with_id(id);
            state.notifications.insert(id, stored.clone());
            out.push(stored);
        }
        Ok(out)
    }

    async fn notifications_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, StorageError> {
        let mut out: Vec<Notification> = self
            .lock()?
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(out)
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StorageError> {
        let mut state = self.lock()?;
        let mut changed = 0;
        for n in state.notifications.values_mut() {
            if n.user_id == user_id && !n.read {
                n.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_notification(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let owned = state
            .notifications
            .get(&id)
            .is_some_and(|n| n.user_id == user_id);
        if !owned {
            return Err(StorageError::NotFound);
        }
        state.notifications.remove(&id);
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub profiles: Arc<dyn ProfileRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub lessons: Arc<dyn LessonRepository>,
    pub activities: Arc<dyn ActivityRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wire every repository to one backend.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: ProfileRepository
            + CatalogRepository
            + LessonRepository
            + ActivityRepository
            + ProgressRepository
            + NotificationRepository
            + Clone
            + 'static,
    {
        Self {
            profiles: Arc::new(repo.clone()),
            catalog: Arc::new(repo.clone()),
            lessons: Arc::new(repo.clone()),
            activities: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            notifications: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicles_core::model::{
        ActivityDraft, Area, CorrectAnswer, LessonDraft, NotificationDraft,
    };
    use chronicles_core::time::fixed_now;

    async fn seeded() -> (InMemoryRepository, Fragment, Lesson) {
        let repo = InMemoryRepository::new();
        let guardian = Guardian::new(GuardianId::new(1), "Numera", Area::Math, 1, 0.0).unwrap();
        repo.upsert_guardian(&guardian).await.unwrap();
        let fragment = Fragment::new(FragmentId::new(1), guardian.id(), "Rune", 2).unwrap();
        repo.upsert_fragment(&fragment).await.unwrap();
        let lesson = LessonDraft {
            guardian_id: guardian.id(),
            title: "Fractions".into(),
            content: "Halves".into(),
            unit: 1,
            position: 1,
            active: true,
            grade_group: GradeGroup::All,
            video_urls: Vec::new(),
            image_url: None,
        }
        .validate(fixed_now())
        .unwrap();
        let lesson = repo.insert_lesson(&lesson).await.unwrap();
        (repo, fragment, lesson)
    }

    #[tokio::test]
    async fn completion_is_recorded_once_and_rewards_once() {
        let (repo, fragment, lesson) = seeded().await;
        let user = UserId::random();

        let first = repo
            .record_completion(user, lesson.id, Some(&fragment), fixed_now())
            .await
            .unwrap();
        let second = repo
            .record_completion(user, lesson.id, Some(&fragment), fixed_now())
            .await
            .unwrap();
        assert_eq!(first, CompletionOutcome::Recorded);
        assert_eq!(second, CompletionOutcome::AlreadyCompleted);

        let held = repo.user_fragments(user).await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].quantity, 1);
        assert!(repo.is_completed(user, lesson.id).await.unwrap());
    }

    #[tokio::test]
    async fn fragments_are_clamped_to_capacity() {
        let (repo, fragment, _) = seeded().await;
        let user = UserId::random();
        let held = repo.add_fragments(user, &fragment, 5, fixed_now()).await.unwrap();
        assert_eq!(held.quantity, 2);
    }

    #[tokio::test]
    async fn deleting_lesson_cascades() {
        let (repo, _, lesson) = seeded().await;
        let activity = ActivityDraft {
            lesson_id: lesson.id,
            prompt: "1/2 + 1/2?".into(),
            options: vec!["1".into(), "2".into()],
            answer: CorrectAnswer::Index(0),
            position: 1,
        }
        .validate()
        .unwrap();
        repo.insert_activity(&activity).await.unwrap();
        repo.record_completion(UserId::random(), lesson.id, None, fixed_now())
            .await
            .unwrap();

        repo.delete_lesson(lesson.id).await.unwrap();
        assert!(repo.activities_for_lesson(lesson.id).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_lesson(lesson.id).await.unwrap_err(),
            StorageError::NotFound
        ));
    }

    #[tokio::test]
    async fn notifications_are_scoped_to_owner() {
        let repo = InMemoryRepository::new();
        let (ana, bia) = (UserId::random(), UserId::random());
        let note = NotificationDraft::new("Hi", "Welcome").validate().unwrap();
        let stored = repo
            .insert_notifications(&[
                note.addressed_to(ana, fixed_now()),
                note.addressed_to(bia, fixed_now()),
            ])
            .await
            .unwrap();

        assert!(matches!(
            repo.delete_notification(ana, stored[1].id).await.unwrap_err(),
            StorageError::NotFound
        ));
        assert_eq!(repo.mark_all_read(ana).await.unwrap(), 1);
        assert_eq!(repo.mark_all_read(ana).await.unwrap(), 0);
        repo.delete_notification(ana, stored[0].id).await.unwrap();
        assert!(repo.notifications_for_user(ana).await.unwrap().is_empty());
        assert_eq!(repo.notifications_for_user(bia).await.unwrap().len(), 1);
    }
}
