#![forbid(unsafe_code)]

mod access;
pub mod activity_service;
pub mod app_services;
pub mod avatar;
pub mod error;
pub mod fragment_service;
pub mod lesson_service;
pub mod notifications;
pub mod profile_service;
pub mod stats_service;

pub use chronicles_core::Clock;

pub use activity_service::{ActivityService, Submission, parse_answers};
pub use app_services::AppServices;
pub use avatar::{AvatarConfig, AvatarStore, HttpAvatarStore, InMemoryAvatarStore};
pub use error::{
    ActivityServiceError, AppServicesError, AvatarError, LessonServiceError,
    NotificationServiceError, ProfileServiceError, ProgressServiceError,
};
pub use fragment_service::FragmentService;
pub use lesson_service::LessonService;
pub use notifications::{Inbox, NotificationFeed, NotificationService};
pub use profile_service::{CurrentUser, ProfileService};
pub use stats_service::StatsService;
