use std::sync::Arc;

use chronicles_core::model::{
    ActivityDraft, Area, Broadcast, CorrectAnswer, Fragment, FragmentId, GradeGroup, Guardian,
    GuardianId, LessonDraft, NotificationDraft, SignUpForm, UserId,
};
use chronicles_core::sequencer::NextLesson;
use chronicles_core::time::{fixed_now, utc_offset};
use chrono::NaiveDate;
use services::{
    ActivityServiceError, AppServices, Clock, InMemoryAvatarStore, LessonServiceError,
    NotificationServiceError, parse_answers,
};
use storage::repository::{CatalogRepository, ProfileRepository, Storage};

struct World {
    services: AppServices,
    admin: UserId,
    student: UserId,
}

async fn world() -> World {
    let storage = Storage::in_memory();
    for (id, name, area, order, threshold) in [
        (1, "Machado", Area::Portuguese, 1, 0.0),
        (2, "Pythagoras", Area::Math, 2, 20.0),
    ] {
        let guardian = Guardian::new(GuardianId::new(id), name, area, order, threshold).unwrap();
        storage.catalog.upsert_guardian(&guardian).await.unwrap();
        let fragment = Fragment::new(FragmentId::new(id), guardian.id(), "Fragment", 5).unwrap();
        storage.catalog.upsert_fragment(&fragment).await.unwrap();
    }

    let admin = UserId::random();
    storage.profiles.grant_admin(admin).await.unwrap();

    let services = AppServices::new(
        &storage,
        Clock::fixed(fixed_now()),
        utc_offset(),
        Some(Arc::new(InMemoryAvatarStore::new())),
    );

    let student = UserId::random();
    services
        .profiles()
        .sign_up(
            student,
            SignUpForm {
                email: "ana@example.org".into(),
                password: "secret1".into(),
                password_confirmation: "secret1".into(),
                display_name: "Ana Souza".into(),
                school: Some("Escola".into()),
                grade: Some(6),
                birth_date: NaiveDate::from_ymd_opt(2013, 2, 1),
            },
        )
        .await
        .unwrap();

    World {
        services,
        admin,
        student,
    }
}

fn lesson(guardian: u64, position: u32) -> LessonDraft {
    LessonDraft {
        guardian_id: GuardianId::new(guardian),
        title: format!("Guardian {guardian} lesson {position}"),
        content: "Read carefully.".into(),
        unit: 1,
        position,
        active: true,
        grade_group: GradeGroup::All,
        video_urls: vec!["https://videos.example.org/intro".into()],
        image_url: None,
    }
}

#[tokio::test]
async fn completing_lessons_unlocks_the_next_guardian() {
    let w = world().await;
    let lessons = w.services.lessons();
    let activities = w.services.activities();

    let first = lessons.create(w.admin, lesson(1, 1)).await.unwrap();
    let other = lessons.create(w.admin, lesson(2, 1)).await.unwrap();
    activities
        .create(
            w.admin,
            ActivityDraft {
                lesson_id: first.id,
                prompt: "Pick the noun".into(),
                options: vec!["run".into(), "house".into()],
                answer: CorrectAnswer::Index(1),
                position: 1,
            },
        )
        .await
        .unwrap();

    assert_eq!(
        lessons.next_lesson(w.student).await.unwrap(),
        NextLesson::Lesson(first.clone())
    );

    let answers = parse_answers(r#"{"0": 1}"#).unwrap();
    let sub = activities.submit(w.student, first.id, &answers).await.unwrap();
    assert!(sub.fragment_awarded);

    // Second pass is review mode and earns nothing.
    let again = activities.submit(w.student, first.id, &answers).await.unwrap();
    assert!(again.is_review());
    assert!(!again.fragment_awarded);

    let progress = w.services.fragments().progress(w.student).await.unwrap();
    assert_eq!(progress[0].quantity, 1);
    assert!(progress[1].unlocked);

    assert_eq!(
        lessons.next_lesson(w.student).await.unwrap().lesson().map(|l| l.id),
        Some(other.id)
    );

    let stats = w.services.stats().stats(w.student).await.unwrap();
    assert_eq!(stats.total_lessons, 1);
    assert_eq!(stats.total_fragments, 1);
    assert_eq!(stats.streak, 1);
    assert_eq!(stats.progress_percent, 10);
    assert_eq!(stats.active_guardian.map(|g| g.id()), Some(GuardianId::new(1)));
}

#[tokio::test]
async fn locked_guardian_is_neither_listed_nor_rewarded() {
    let w = world().await;
    let lessons = w.services.lessons();
    let activities = w.services.activities();

    let locked = lessons.create(w.admin, lesson(2, 1)).await.unwrap();
    activities
        .create(
            w.admin,
            ActivityDraft {
                lesson_id: locked.id,
                prompt: "2 + 2".into(),
                options: vec!["3".into(), "4".into()],
                answer: CorrectAnswer::Index(1),
                position: 1,
            },
        )
        .await
        .unwrap();

    assert!(lessons.list_for_user(w.student, None).await.unwrap().is_empty());

    let answers = parse_answers(r#"{"0": 1}"#).unwrap();
    let err = activities.submit(w.student, locked.id, &answers).await.unwrap_err();
    assert!(matches!(err, ActivityServiceError::Locked));

    let progress = w.services.fragments().progress(w.student).await.unwrap();
    assert!(progress.iter().all(|p| p.quantity == 0));
    assert!(!progress[1].unlocked);
}

#[tokio::test]
async fn admin_operations_are_forbidden_for_students() {
    let w = world().await;
    let err = w
        .services
        .lessons()
        .create(w.student, lesson(1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, LessonServiceError::Forbidden));

    let err = w
        .services
        .notifications()
        .broadcast(
            w.student,
            Broadcast {
                draft: NotificationDraft::new("Hi", "all"),
                grade_filter: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NotificationServiceError::Forbidden));

    let user = w.services.profiles().resolve(w.admin).await.unwrap();
    assert!(user.is_admin());
    assert!(user.profile.is_none());
}

#[tokio::test]
async fn broadcast_reaches_only_matching_subscribers() {
    let w = world().await;
    let notifications = w.services.notifications();
    let mut student_feed = notifications.subscribe(w.student);
    let mut admin_feed = notifications.subscribe(w.admin);

    let sent = notifications
        .broadcast(
            w.admin,
            Broadcast {
                draft: NotificationDraft::new("New lesson", "Fractions are live"),
                grade_filter: Some(GradeGroup::SixthSeventh),
            },
        )
        .await
        .unwrap();
    assert_eq!(sent.len(), 1);

    let pushed = student_feed.recv().await.unwrap();
    assert_eq!(pushed.id, sent[0].id);
    assert!(admin_feed.try_recv().is_none());

    let mut inbox = services::Inbox::new(Vec::new());
    assert!(inbox.push(pushed));
    assert_eq!(inbox.unread_count(), 1);
    assert_eq!(notifications.unread_count(w.student).await.unwrap(), 1);
}
