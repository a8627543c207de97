use chrono::{DateTime, Utc};

use crate::model::ids::{LessonId, UserId};

/// Marks a lesson as done for a user. At most one per (user, lesson).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedLesson {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub completed_at: DateTime<Utc>,
}

/// Result of recording a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// First completion; rewards were applied.
    Recorded,
    /// The lesson was already done. Nothing changed.
    AlreadyCompleted,
}

impl CompletionOutcome {
    #[must_use]
    pub fn is_new(self) -> bool {
        matches!(self, CompletionOutcome::Recorded)
    }
}
