use std::collections::HashMap;
use std::sync::Arc;

use chronicles_core::model::{
    Activity, ActivityDraft, ActivityId, Answer, CompletionOutcome, LessonId, UserId,
};
use chronicles_core::validator::{ValidationReport, validate_answers};
use storage::StorageError;
use storage::repository::{
    ActivityRepository, CatalogRepository, LessonRepository, ProfileRepository, ProgressRepository,
};
use tracing::{debug, error, info, warn};

use crate::Clock;
use crate::access::{open_guardians, role_of, viewer_group};
use crate::error::ActivityServiceError;

/// Result of grading one lesson attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub report: ValidationReport,
    /// `None` when the attempt failed and nothing was recorded.
    pub completion: Option<CompletionOutcome>,
    pub fragment_awarded: bool,
}

impl Submission {
    /// The lesson had already been completed, so this pass earned nothing.
    #[must_use]
    pub fn is_review(&self) -> bool {
        self.completion == Some(CompletionOutcome::AlreadyCompleted)
    }
}

/// Parse a JSON answer sheet keyed by activity index, e.g.
/// `{"0": 1, "1": [0, 2], "2": "rio"}`. Values of any other shape are kept
/// and graded as wrong.
///
/// # Errors
///
/// Returns `ActivityServiceError::InvalidAnswers` if the JSON is malformed
/// or is not an object keyed by index.
pub fn parse_answers(raw: &str) -> Result<HashMap<usize, Answer>, ActivityServiceError> {
    serde_json::from_str(raw).map_err(|e| ActivityServiceError::InvalidAnswers(e.to_string()))
}

/// Activity administration plus grading and completion.
#[derive(Clone)]
pub struct ActivityService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    catalog: Arc<dyn CatalogRepository>,
    lessons: Arc<dyn LessonRepository>,
    activities: Arc<dyn ActivityRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ActivityService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        catalog: Arc<dyn CatalogRepository>,
        lessons: Arc<dyn LessonRepository>,
        activities: Arc<dyn ActivityRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            profiles,
            catalog,
            lessons,
            activities,
            progress,
        }
    }

    async fn require_admin(&self, actor: UserId) -> Result<(), ActivityServiceError> {
        if role_of(self.profiles.as_ref(), actor).await?.is_admin() {
            Ok(())
        } else {
            Err(ActivityServiceError::Forbidden)
        }
    }

    async fn require_lesson(&self, lesson_id: LessonId) -> Result<(), ActivityServiceError> {
        match self.lessons.get_lesson(lesson_id).await? {
            Some(_) => Ok(()),
            None => Err(ActivityServiceError::NotFound),
        }
    }

    /// # Errors
    ///
    /// Returns `ActivityServiceError::Forbidden` for non-admins,
    /// `ActivityServiceError::NotFound` if the lesson is missing and
    /// `ActivityServiceError::Activity` for invalid input.
    pub async fn create(
        &self,
        actor: UserId,
        draft: ActivityDraft,
    ) -> Result<Activity, ActivityServiceError> {
        self.require_admin(actor).await?;
        self.require_lesson(draft.lesson_id).await?;
        let activity = self.activities.insert_activity(&draft.validate()?).await?;
        info!(%actor, activity_id = %activity.id, lesson_id = %activity.lesson_id, "activity created");
        Ok(activity)
    }

    /// # Errors
    ///
    /// Returns `ActivityServiceError::Forbidden` for non-admins,
    /// `ActivityServiceError::NotFound` if the activity or its new lesson
    /// is missing and `ActivityServiceError::Activity` for invalid input.
    pub async fn update(
        &self,
        actor: UserId,
        id: ActivityId,
        draft: ActivityDraft,
    ) -> Result<Activity, ActivityServiceError> {
        self.require_admin(actor).await?;
        if self.activities.get_activity(id).await?.is_none() {
            return Err(ActivityServiceError::NotFound);
        }
        self.require_lesson(draft.lesson_id).await?;
        let activity = draft.validate()?.assign_id(id);
        self.activities.update_activity(&activity).await?;
        info!(%actor, activity_id = %id, "activity updated");
        Ok(activity)
    }

    /// # Errors
    ///
    /// Returns `ActivityServiceError::Forbidden` for non-admins and
    /// `ActivityServiceError::NotFound` if the activity is missing.
    pub async fn delete(&self, actor: UserId, id: ActivityId) -> Result<(), ActivityServiceError> {
        self.require_admin(actor).await?;
        self.activities.delete_activity(id).await.map_err(|e| match e {
            StorageError::NotFound => ActivityServiceError::NotFound,
            other => ActivityServiceError::Storage(other),
        })?;
        info!(%actor, activity_id = %id, "activity deleted");
        Ok(())
    }

    /// Activities of a lesson in position order.
    ///
    /// # Errors
    ///
    /// Returns `ActivityServiceError::Storage` if repository access fails.
    pub async fn activities_for_lesson(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<Activity>, ActivityServiceError> {
        Ok(self.activities.activities_for_lesson(lesson_id).await?)
    }

    /// Grade an attempt. A passing first attempt records the completion and
    /// awards one fragment of the lesson's guardian in the same step.
    ///
    /// # Errors
    ///
    /// Returns `ActivityServiceError::NotFound` if the lesson is missing,
    /// inactive or outside the user's grade group,
    /// `ActivityServiceError::Locked` if its guardian is still locked and
    /// `ActivityServiceError::Storage` on repository failure.
    pub async fn submit(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        answers: &HashMap<usize, Answer>,
    ) -> Result<Submission, ActivityServiceError> {
        let lesson = self
            .lessons
            .get_lesson(lesson_id)
            .await?
            .ok_or(ActivityServiceError::NotFound)?;
        let group = viewer_group(self.profiles.as_ref(), user_id).await?;
        if !lesson.is_visible_to(group) {
            debug!(%user_id, %lesson_id, %group, "lesson hidden from user");
            return Err(ActivityServiceError::NotFound);
        }
        let unlocked =
            open_guardians(self.catalog.as_ref(), self.progress.as_ref(), user_id).await?;
        if !unlocked.contains(&lesson.guardian_id) {
            warn!(%user_id, %lesson_id, guardian_id = %lesson.guardian_id, "submission for locked guardian");
            return Err(ActivityServiceError::Locked);
        }

        let activities = self.activities.activities_for_lesson(lesson_id).await?;
        let report = validate_answers(&activities, answers);
        debug!(
            %user_id,
            %lesson_id,
            correct = report.correct,
            total = report.total,
            passed = report.passed,
            "graded submission"
        );

        if !report.passed {
            return Ok(Submission {
                report,
                completion: None,
                fragment_awarded: false,
            });
        }

        let fragment = self.catalog.fragment_for_guardian(lesson.guardian_id).await?;
        if fragment.is_none() {
            warn!(guardian_id = %lesson.guardian_id, "guardian has no fragment; completion earns nothing");
        }

        let outcome = self
            .progress
            .record_completion(user_id, lesson_id, fragment.as_ref(), self.clock.now())
            .await
            .inspect_err(|e| error!(%user_id, %lesson_id, error = %e, "failed to record completion"))?;

        let fragment_awarded = outcome.is_new() && fragment.is_some();
        match outcome {
            CompletionOutcome::Recorded => {
                info!(%user_id, %lesson_id, fragment_awarded, "lesson completed");
            }
            CompletionOutcome::AlreadyCompleted => {
                warn!(%user_id, %lesson_id, "lesson already completed; review mode");
            }
        }

        Ok(Submission {
            report,
            completion: Some(outcome),
            fragment_awarded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicles_core::model::{
        Area, CorrectAnswer, Fragment, FragmentId, GradeGroup, Guardian, GuardianId, LessonDraft,
    };
    use chronicles_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    struct Fixture {
        repo: InMemoryRepository,
        service: ActivityService,
        admin: UserId,
        lesson: LessonId,
    }

    async fn fixture(with_fragment: bool) -> Fixture {
        let repo = InMemoryRepository::new();
        let guardian = Guardian::new(GuardianId::new(1), "Pythagoras", Area::Math, 1, 0.0).unwrap();
        repo.upsert_guardian(&guardian).await.unwrap();
        if with_fragment {
            let fragment = Fragment::new(FragmentId::new(1), guardian.id(), "Triangle", 3).unwrap();
            repo.upsert_fragment(&fragment).await.unwrap();
        }
        let lesson = LessonDraft {
            guardian_id: guardian.id(),
            title: "Primes".into(),
            content: "Numbers divisible only by 1 and themselves.".into(),
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

        let admin = UserId::random();
        repo.grant_admin(admin).await.unwrap();
        let service = ActivityService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );

        for (position, answer, options) in [
            (1, CorrectAnswer::Index(1), vec!["4", "5"]),
            (2, CorrectAnswer::Indices(vec![0, 2]), vec!["2", "4", "7"]),
            (3, CorrectAnswer::Text("Rio".into()), vec![]),
        ] {
            let draft = ActivityDraft {
                lesson_id: lesson.id,
                prompt: format!("Question {position}"),
                options: options.into_iter().map(str::to_owned).collect(),
                answer,
                position,
            };
            service.create(admin, draft).await.unwrap();
        }

        Fixture {
            repo,
            service,
            admin,
            lesson: lesson.id,
        }
    }

    fn all_right() -> HashMap<usize, Answer> {
        parse_answers(r#"{"0": 1, "1": [2, 0], "2": " rio "}"#).unwrap()
    }

    #[tokio::test]
    async fn passing_twice_awards_once() {
        let f = fixture(true).await;
        let user = UserId::random();

        let first = f.service.submit(user, f.lesson, &all_right()).await.unwrap();
        assert!(first.report.passed);
        assert_eq!(first.completion, Some(CompletionOutcome::Recorded));
        assert!(first.fragment_awarded);

        let second = f.service.submit(user, f.lesson, &all_right()).await.unwrap();
        assert!(second.is_review());
        assert!(!second.fragment_awarded);

        let held = f.repo.user_fragments(user).await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].quantity, 1);
    }

    #[tokio::test]
    async fn failing_attempt_records_nothing() {
        let f = fixture(true).await;
        let user = UserId::random();
        // One of three is 33%.
        let answers = parse_answers(r#"{"0": 1, "1": [0]}"#).unwrap();
        let sub = f.service.submit(user, f.lesson, &answers).await.unwrap();
        assert!(!sub.report.passed);
        assert_eq!(sub.completion, None);
        assert!(!f.repo.is_completed(user, f.lesson).await.unwrap());
    }

    #[tokio::test]
    async fn missing_fragment_still_completes() {
        let f = fixture(false).await;
        let user = UserId::random();
        let sub = f.service.submit(user, f.lesson, &all_right()).await.unwrap();
        assert_eq!(sub.completion, Some(CompletionOutcome::Recorded));
        assert!(!sub.fragment_awarded);
        assert!(f.repo.user_fragments(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_only_crud() {
        let f = fixture(true).await;
        let student = UserId::random();
        let existing = f.service.activities_for_lesson(f.lesson).await.unwrap();
        assert_eq!(existing.len(), 3);

        let err = f.service.delete(student, existing[0].id).await.unwrap_err();
        assert!(matches!(err, ActivityServiceError::Forbidden));

        let mut draft = ActivityDraft {
            lesson_id: f.lesson,
            prompt: "Capital?".into(),
            options: Vec::new(),
            answer: CorrectAnswer::Text("Brasilia".into()),
            position: 3,
        };
        let updated = f.service.update(f.admin, existing[2].id, draft.clone()).await.unwrap();
        assert_eq!(updated.prompt, "Capital?");

        draft.lesson_id = LessonId::new(999);
        assert!(matches!(
            f.service.create(f.admin, draft).await.unwrap_err(),
            ActivityServiceError::NotFound
        ));

        f.service.delete(f.admin, existing[0].id).await.unwrap();
        assert_eq!(f.service.activities_for_lesson(f.lesson).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn wrong_shaped_answers_are_graded_not_rejected() {
        let answers = parse_answers(r#"{"0": true, "1": 1}"#).unwrap();
        assert!(matches!(answers[&0], Answer::Other(_)));
        assert_eq!(answers[&1], Answer::Choice(1));

        let f = fixture(true).await;
        let answers = parse_answers(r#"{"0": 1, "1": true, "2": " rio "}"#).unwrap();
        let activities = f.service.activities_for_lesson(f.lesson).await.unwrap();
        let report = validate_answers(&activities, &answers);
        assert!(report.results[0].is_correct);
        assert!(!report.results[1].is_correct);
        assert!(report.results[2].is_correct);

        let answers = parse_answers(r#"{"0": null, "1": 1, "2": [0, "a"]}"#).unwrap();
        let sub = f.service.submit(UserId::random(), f.lesson, &answers).await.unwrap();
        assert_eq!(sub.report.correct, 0);
        assert_eq!(sub.report.total, 3);
        assert_eq!(sub.completion, None);
    }

    #[tokio::test]
    async fn locked_or_hidden_lessons_cannot_be_submitted() {
        let f = fixture(true).await;
        let guardian = Guardian::new(GuardianId::new(2), "Herodotus", Area::Humanities, 2, 60.0).unwrap();
        f.repo.upsert_guardian(&guardian).await.unwrap();
        let fragment = Fragment::new(FragmentId::new(2), guardian.id(), "Scroll", 3).unwrap();
        f.repo.upsert_fragment(&fragment).await.unwrap();

        let mut draft = LessonDraft {
            guardian_id: guardian.id(),
            title: "Egypt".into(),
            content: "The Nile.".into(),
            unit: 1,
            position: 1,
            active: true,
            grade_group: GradeGroup::All,
            video_urls: Vec::new(),
            image_url: None,
        };
        let locked = f.repo.insert_lesson(&draft.clone().validate(fixed_now()).unwrap()).await.unwrap();
        f.service
            .create(
                f.admin,
                ActivityDraft {
                    lesson_id: locked.id,
                    prompt: "River?".into(),
                    options: Vec::new(),
                    answer: CorrectAnswer::Text("Nile".into()),
                    position: 1,
                },
            )
            .await
            .unwrap();

        let user = UserId::random();
        let answers = parse_answers(r#"{"0": "nile"}"#).unwrap();
        let err = f.service.submit(user, locked.id, &answers).await.unwrap_err();
        assert!(matches!(err, ActivityServiceError::Locked));
        assert!(!f.repo.is_completed(user, locked.id).await.unwrap());
        assert!(f.repo.user_fragments(user).await.unwrap().is_empty());

        draft.guardian_id = GuardianId::new(1);
        draft.active = false;
        let inactive = f.repo.insert_lesson(&draft.validate(fixed_now()).unwrap()).await.unwrap();
        let err = f.service.submit(user, inactive.id, &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, ActivityServiceError::NotFound));

        // Two of three first-guardian fragments is 66%, enough to open the second.
        let first = f.repo.fragment_for_guardian(GuardianId::new(1)).await.unwrap().unwrap();
        f.repo.add_fragments(user, &first, 2, fixed_now()).await.unwrap();
        let sub = f.service.submit(user, locked.id, &answers).await.unwrap();
        assert!(sub.fragment_awarded);
    }

    #[tokio::test]
    async fn unknown_lesson_and_bad_json() {
        let f = fixture(true).await;
        let err = f
            .service
            .submit(UserId::random(), LessonId::new(42), &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityServiceError::NotFound));
        assert!(matches!(
            parse_answers("[1, 2]").unwrap_err(),
            ActivityServiceError::InvalidAnswers(_)
        ));
    }
}
