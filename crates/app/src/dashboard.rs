//! Home screen: profile, guardians, next lesson, stats and unread count.
//!
//! Each section loads on its own. A failed backend call is logged and the
//! section renders as unavailable instead of aborting the whole screen.

use std::fmt::{self, Write as _};

use chronicles_core::model::UserId;
use chronicles_core::progress::FragmentProgress;
use chronicles_core::sequencer::NextLesson;
use chronicles_core::stats::UserStats;
use services::{AppServices, CurrentUser};
use tracing::error;

pub type Section<T> = Result<T, String>;

#[derive(Debug)]
pub struct Dashboard {
    pub user: Section<CurrentUser>,
    pub guardians: Section<Vec<FragmentProgress>>,
    pub next_lesson: Section<NextLesson>,
    pub stats: Section<UserStats>,
    pub unread: Section<usize>,
}

fn section<T, E: fmt::Display>(name: &'static str, result: Result<T, E>) -> Section<T> {
    result.map_err(|e| {
        error!(section = name, error = %e, "dashboard section failed");
        e.to_string()
    })
}

/// Load every section concurrently.
pub async fn load(services: &AppServices, user_id: UserId) -> Dashboard {
    let profiles = services.profiles();
    let fragments = services.fragments();
    let lessons = services.lessons();
    let stats = services.stats();
    let notifications = services.notifications();

    let (user, guardians, next_lesson, stats, unread) = tokio::join!(
        profiles.resolve(user_id),
        fragments.progress(user_id),
        lessons.next_lesson(user_id),
        stats.stats(user_id),
        notifications.unread_count(user_id),
    );

    Dashboard {
        user: section("profile", user),
        guardians: section("guardians", guardians),
        next_lesson: section("next_lesson", next_lesson),
        stats: section("stats", stats),
        unread: section("notifications", unread),
    }
}

impl Dashboard {
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) -> fmt::Result {
        match &self.user {
            Ok(user) => {
                match &user.profile {
                    Some(profile) => writeln!(
                        out,
                        "Hello, {}! (grade {}, group {})",
                        profile.first_name(),
                        profile.grade,
                        profile.grade_group()
                    )?,
                    None => writeln!(out, "Hello! Your profile is not set up yet.")?,
                }
                if user.is_admin() {
                    writeln!(out, "Role: admin")?;
                }
            }
            Err(e) => writeln!(out, "Profile: unavailable ({e})")?,
        }

        writeln!(out)?;
        match &self.guardians {
            Ok(progress) if progress.is_empty() => writeln!(out, "Guardians: none yet")?,
            Ok(progress) => {
                writeln!(out, "Guardians:")?;
                for p in progress {
                    let (name, area) = p
                        .guardian
                        .as_ref()
                        .map_or(("?", "?"), |g| (g.name(), g.area().as_str()));
                    writeln!(
                        out,
                        "  [{}] {name} ({area}) {} {}/{} {:.0}%",
                        if p.unlocked { "open" } else { "lock" },
                        p.fragment.name(),
                        p.quantity,
                        p.fragment.capacity(),
                        p.percentage
                    )?;
                }
            }
            Err(e) => writeln!(out, "Guardians: unavailable ({e})")?,
        }

        writeln!(out)?;
        match &self.next_lesson {
            Ok(NextLesson::Lesson(lesson)) => writeln!(
                out,
                "Next lesson: {} (unit {}, lesson {}) [id {}]",
                lesson.title, lesson.unit, lesson.position, lesson.id
            )?,
            Ok(NextLesson::Completed) => writeln!(out, "Next lesson: every open lesson is done")?,
            Ok(NextLesson::Unavailable) => writeln!(out, "Next lesson: nothing available yet")?,
            Err(e) => writeln!(out, "Next lesson: unavailable ({e})")?,
        }

        match &self.stats {
            Ok(stats) => {
                writeln!(
                    out,
                    "Streak: {} day(s) | Lessons: {} | Fragments: {} | Overall: {}%",
                    stats.streak, stats.total_lessons, stats.total_fragments, stats.progress_percent
                )?;
                if let Some(guardian) = &stats.active_guardian {
                    writeln!(out, "Active guardian: {}", guardian.name())?;
                }
                if let Some(lesson) = &stats.last_lesson {
                    writeln!(out, "Last lesson: {}", lesson.title)?;
                }
            }
            Err(e) => writeln!(out, "Stats: unavailable ({e})")?,
        }

        match &self.unread {
            Ok(count) => writeln!(out, "Unread notifications: {count}")?,
            Err(e) => writeln!(out, "Notifications: unavailable ({e})")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chronicles_core::model::{
        Area, Fragment, FragmentId, Guardian, GuardianId, SignUpForm,
    };
    use chronicles_core::progress::CatalogEntry;
    use chronicles_core::time::{fixed_clock, fixed_now, utc_offset};
    use chrono::NaiveDate;
    use storage::repository::{CatalogRepository, ProfileRepository, Storage, StorageError};

    struct OfflineCatalog;

    fn offline() -> StorageError {
        StorageError::Connection("catalog offline".into())
    }

    #[async_trait]
    impl CatalogRepository for OfflineCatalog {
        async fn upsert_guardian(&self, _: &Guardian) -> Result<(), StorageError> {
            Err(offline())
        }
        async fn list_guardians(&self) -> Result<Vec<Guardian>, StorageError> {
            Err(offline())
        }
        async fn get_guardian(&self, _: GuardianId) -> Result<Option<Guardian>, StorageError> {
            Err(offline())
        }
        async fn upsert_fragment(&self, _: &Fragment) -> Result<(), StorageError> {
            Err(offline())
        }
        async fn list_catalog(&self) -> Result<Vec<CatalogEntry>, StorageError> {
            Err(offline())
        }
        async fn fragment_for_guardian(
            &self,
            _: GuardianId,
        ) -> Result<Option<Fragment>, StorageError> {
            Err(offline())
        }
    }

    async fn student(storage: &Storage) -> UserId {
        let user = UserId::random();
        let profile = SignUpForm {
            email: "ana@example.org".into(),
            password: "secret1".into(),
            password_confirmation: "secret1".into(),
            display_name: "Ana Souza".into(),
            school: None,
            grade: Some(8),
            birth_date: NaiveDate::from_ymd_opt(2011, 6, 1),
        }
        .validate(user, fixed_now())
        .unwrap();
        storage.profiles.insert_profile(&profile).await.unwrap();
        user
    }

    #[tokio::test]
    async fn renders_every_section() {
        let storage = Storage::in_memory();
        let guardian = Guardian::new(GuardianId::new(1), "Machado", Area::Portuguese, 1, 0.0).unwrap();
        storage.catalog.upsert_guardian(&guardian).await.unwrap();
        let fragment = Fragment::new(FragmentId::new(1), guardian.id(), "Quill", 15).unwrap();
        storage.catalog.upsert_fragment(&fragment).await.unwrap();
        let user = student(&storage).await;

        let services = AppServices::new(&storage, fixed_clock(), utc_offset(), None);
        let text = load(&services, user).await.render();
        assert!(text.contains("Hello, Ana!"), "{text}");
        assert!(text.contains("[open] Machado (portuguese) Quill 0/15 0%"), "{text}");
        assert!(text.contains("Next lesson: nothing available yet"), "{text}");
        assert!(text.contains("Unread notifications: 0"), "{text}");
    }

    #[tokio::test]
    async fn failing_backend_degrades_sections() {
        let mut storage = Storage::in_memory();
        let user = student(&storage).await;
        storage.catalog = Arc::new(OfflineCatalog);

        let services = AppServices::new(&storage, fixed_clock(), utc_offset(), None);
        let dashboard = load(&services, user).await;
        assert!(dashboard.user.is_ok());
        assert!(dashboard.guardians.is_err());
        assert!(dashboard.stats.is_err());
        assert!(dashboard.unread.is_ok());

        let text = dashboard.render();
        assert!(text.contains("Guardians: unavailable (connection error: catalog offline)"), "{text}");
    }
}
