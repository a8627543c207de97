//! Shared error types for the services crate.

use thiserror::Error;

use chronicles_core::model::{ActivityError, LessonError, NotificationError, ProfileError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by avatar stores.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AvatarError {
    #[error("avatar uploads are not configured")]
    Disabled,
    #[error("avatar upload is empty")]
    EmptyUpload,
    #[error("unsupported avatar file type: {0}")]
    UnsupportedType(String),
    #[error("avatar upload failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("invalid avatar url: {0}")]
    InvalidUrl(String),
    #[error("avatar store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `ProfileService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProfileServiceError {
    #[error("profile not found")]
    NotFound,
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Avatar(#[from] AvatarError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `FragmentService` and `StatsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("guardian has no fragment in the catalog")]
    NoFragment,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `LessonService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LessonServiceError {
    #[error("only admins can manage lessons")]
    Forbidden,
    #[error("lesson not found")]
    NotFound,
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ActivityService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ActivityServiceError {
    #[error("only admins can manage activities")]
    Forbidden,
    #[error("lesson or activity not found")]
    NotFound,
    #[error("lesson belongs to a guardian the user has not unlocked")]
    Locked,
    #[error("invalid answer sheet: {0}")]
    InvalidAnswers(String),
    #[error(transparent)]
    Activity(#[from] ActivityError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `NotificationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotificationServiceError {
    #[error("only admins can send notifications")]
    Forbidden,
    #[error("notification not found")]
    NotFound,
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
