use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use url::Url;

use crate::model::grade::{Grade, GradeError, GradeGroup};
use crate::model::ids::UserId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("display name cannot be empty")]
    EmptyName,

    #[error("email address is invalid")]
    InvalidEmail,

    #[error("password must have at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("birth date is required")]
    MissingBirthDate,

    #[error(transparent)]
    Grade(#[from] GradeError),
}

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

//
// ─── ROLE ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

//
// ─── PROFILE ───────────────────────────────────────────────────────────────────
//

/// Mutable attributes of a user. One-to-one with the auth identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: UserId,
    pub display_name: String,
    pub school: Option<String>,
    pub grade: Grade,
    pub birth_date: Option<NaiveDate>,
    pub avatar_url: Option<Url>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Cohort used to filter lessons.
    #[must_use]
    pub fn grade_group(&self) -> GradeGroup {
        self.grade.group()
    }

    /// First word of the display name, used for greetings.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.display_name
            .split_whitespace()
            .next()
            .unwrap_or(self.display_name.as_str())
    }

    /// Apply an edit, keeping identity and creation time.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` when the edited fields are invalid.
    pub fn apply(&mut self, update: ProfileUpdate, now: DateTime<Utc>) -> Result<(), ProfileError> {
        let name = normalize_name(&update.display_name)?;
        let grade = Grade::new(update.grade)?;
        self.display_name = name;
        self.school = normalize_optional(update.school);
        self.grade = grade;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_avatar(&mut self, url: Url, now: DateTime<Utc>) {
        self.avatar_url = Some(url);
        self.updated_at = now;
    }
}

/// Fields a user may edit on their own profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: String,
    pub school: Option<String>,
    pub grade: u8,
}

//
// ─── SIGN-UP ───────────────────────────────────────────────────────────────────
//

/// Raw sign-up form. Credentials are handed to the auth service; only the
/// profile part is persisted here.
#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub display_name: String,
    pub school: Option<String>,
    pub grade: Option<u8>,
    pub birth_date: Option<NaiveDate>,
}

impl SignUpForm {
    /// Validate the form and build the profile for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns the first `ProfileError` found, checked in form order.
    pub fn validate(self, user_id: UserId, now: DateTime<Utc>) -> Result<Profile, ProfileError> {
        if self.password != self.password_confirmation {
            return Err(ProfileError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ProfileError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ProfileError::InvalidEmail);
        }
        let birth_date = self.birth_date.ok_or(ProfileError::MissingBirthDate)?;
        let grade = self
            .grade
            .ok_or(GradeError::OutOfRange(0))
            .and_then(Grade::new)?;
        let display_name = normalize_name(&self.display_name)?;

        Ok(Profile {
            user_id,
            display_name,
            school: normalize_optional(self.school),
            grade,
            birth_date: Some(birth_date),
            avatar_url: None,
            created_at: now,
            updated_at: now,
        })
    }
}

fn normalize_name(raw: &str) -> Result<String, ProfileError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ProfileError::EmptyName);
    }
    Ok(name.to_owned())
}

fn normalize_optional(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
