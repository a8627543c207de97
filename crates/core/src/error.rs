use thiserror::Error;

use crate::model::{
    ActivityError, FragmentError, GradeError, GuardianError, LessonError, NotificationError,
    ProfileError,
};

/// Umbrella error for every domain validation failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Grade(#[from] GradeError),
    #[error(transparent)]
    Guardian(#[from] GuardianError),
    #[error(transparent)]
    Fragment(#[from] FragmentError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Activity(#[from] ActivityError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}
