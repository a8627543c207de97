use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use crate::model::grade::GradeGroup;
use crate::model::ids::{GuardianId, LessonId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("lesson content cannot be empty")]
    EmptyContent,

    #[error("unit must be >= 1")]
    InvalidUnit,

    #[error("position must be >= 1")]
    InvalidPosition,

    #[error("invalid media url: {0}")]
    InvalidUrl(String),
}

//
// ─── LESSON TYPES ──────────────────────────────────────────────────────────────
//

/// Unvalidated lesson fields as submitted by an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDraft {
    pub guardian_id: GuardianId,
    pub title: String,
    pub content: String,
    pub unit: u32,
    pub position: u32,
    pub active: bool,
    pub grade_group: GradeGroup,
    pub video_urls: Vec<String>,
    pub image_url: Option<String>,
}

impl LessonDraft {
    /// # Errors
    ///
    /// Returns `LessonError` for blank text, zero ordering fields or bad URLs.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedLesson, LessonError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        if self.content.trim().is_empty() {
            return Err(LessonError::EmptyContent);
        }
        if self.unit == 0 {
            return Err(LessonError::InvalidUnit);
        }
        if self.position == 0 {
            return Err(LessonError::InvalidPosition);
        }

        let video_urls = self
            .video_urls
            .iter()
            .map(|raw| raw.trim())
            .filter(|raw| !raw.is_empty())
            .map(parse_url)
            .collect::<Result<Vec<_>, _>>()?;
        let image_url = self
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(parse_url)
            .transpose()?;

        Ok(ValidatedLesson {
            guardian_id: self.guardian_id,
            title,
            content: self.content,
            unit: self.unit,
            position: self.position,
            active: self.active,
            grade_group: self.grade_group,
            video_urls,
            image_url,
            created_at: now,
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, LessonError> {
    Url::parse(raw).map_err(|_| LessonError::InvalidUrl(raw.to_owned()))
}

/// Lesson that passed validation but has no storage id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLesson {
    pub guardian_id: GuardianId,
    pub title: String,
    pub content: String,
    pub unit: u32,
    pub position: u32,
    pub active: bool,
    pub grade_group: GradeGroup,
    pub video_urls: Vec<Url>,
    pub image_url: Option<Url>,
    pub created_at: DateTime<Utc>,
}

impl ValidatedLesson {
    #[must_use]
    pub fn assign_id(self, id: LessonId) -> Lesson {
        Lesson {
            id,
            guardian_id: self.guardian_id,
            title: self.title,
            content: self.content,
            unit: self.unit,
            position: self.position,
            active: self.active,
            grade_group: self.grade_group,
            video_urls: self.video_urls,
            image_url: self.image_url,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// A micro-lesson under one guardian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: LessonId,
    pub guardian_id: GuardianId,
    pub title: String,
    pub content: String,
    pub unit: u32,
    pub position: u32,
    pub active: bool,
    pub grade_group: GradeGroup,
    pub video_urls: Vec<Url>,
    pub image_url: Option<Url>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lesson {
    /// Replace editable fields with a validated revision, keeping id and creation time.
    #[must_use]
    pub fn revise(self, revision: ValidatedLesson, now: DateTime<Utc>) -> Self {
        let created_at = self.created_at;
        Self {
            created_at,
            updated_at: now,
            ..revision.assign_id(self.id)
        }
    }

    /// True when an active lesson is visible to a viewer of `group`.
    #[must_use]
    pub fn is_visible_to(&self, group: GradeGroup) -> bool {
        self.active && self.grade_group.admits(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn draft() -> LessonDraft {
        LessonDraft {
            guardian_id: GuardianId::new(1),
            title: " Fractions ".into(),
            content: "Halves and quarters".into(),
            unit: 1,
            position: 1,
            active: true,
            grade_group: GradeGroup::All,
            video_urls: vec!["https://videos.example.org/fractions".into(), "  ".into()],
            image_url: None,
        }
    }

    #[test]
    fn validate_trims_and_parses_urls() {
        let lesson = draft().validate(fixed_now()).unwrap();
        assert_eq!(lesson.title, "Fractions");
        assert_eq!(lesson.video_urls.len(), 1);
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut d = draft();
        d.position = 0;
        assert_eq!(d.validate(fixed_now()).unwrap_err(), LessonError::InvalidPosition);

        let mut d = draft();
        d.image_url = Some("not a url".into());
        assert!(matches!(
            d.validate(fixed_now()).unwrap_err(),
            LessonError::InvalidUrl(_)
        ));

        let mut d = draft();
        d.content = "  ".into();
        assert_eq!(d.validate(fixed_now()).unwrap_err(), LessonError::EmptyContent);
    }

    #[test]
    fn revise_keeps_identity() {
        let created = fixed_now();
        let lesson = draft().validate(created).unwrap().assign_id(LessonId::new(9));
        let mut next = draft();
        next.title = "Decimals".into();
        let later = created + Duration::hours(2);
        let revised = lesson.revise(next.validate(later).unwrap(), later);
        assert_eq!(revised.id, LessonId::new(9));
        assert_eq!(revised.created_at, created);
        assert_eq!(revised.updated_at, later);
        assert_eq!(revised.title, "Decimals");
    }

    #[test]
    fn inactive_lessons_are_hidden() {
        let mut lesson = draft().validate(fixed_now()).unwrap().assign_id(LessonId::new(1));
        assert!(lesson.is_visible_to(GradeGroup::EighthNinth));
        lesson.active = false;
        assert!(!lesson.is_visible_to(GradeGroup::EighthNinth));
    }
}
