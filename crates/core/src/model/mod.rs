mod activity;
mod completion;
mod fragment;
mod grade;
mod guardian;
mod ids;
mod lesson;
mod notification;
mod profile;

pub use ids::{ActivityId, FragmentId, GuardianId, LessonId, NotificationId, ParseIdError, UserId};

pub use activity::{
    Activity, ActivityDraft, ActivityError, ActivityKind, Answer, CorrectAnswer, ValidatedActivity,
};
pub use completion::{CompletedLesson, CompletionOutcome};
pub use fragment::{DEFAULT_FRAGMENT_CAPACITY, Fragment, FragmentError, UserFragment, clamp_quantity};
pub use grade::{Grade, GradeError, GradeGroup};
pub use guardian::{Area, Guardian, GuardianError};
pub use lesson::{Lesson, LessonDraft, LessonError, ValidatedLesson};
pub use notification::{
    Broadcast, DEFAULT_COLOR, DEFAULT_ICON, NewNotification, Notification, NotificationDraft,
    NotificationError, ValidatedNotification,
};
pub use profile::{MIN_PASSWORD_LEN, Profile, ProfileError, ProfileUpdate, Role, SignUpForm};
