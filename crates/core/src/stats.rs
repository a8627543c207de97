//! Dashboard statistics.

use chrono::{DateTime, FixedOffset};

use crate::model::{CompletedLesson, Guardian, Lesson};
use crate::progress::{FragmentProgress, overall_percent};
use crate::streak::study_streak_at;

#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    pub last_lesson: Option<Lesson>,
    pub active_guardian: Option<Guardian>,
    pub streak: u32,
    pub total_lessons: usize,
    pub total_fragments: u32,
    pub progress_percent: u32,
}

/// Guardian whose fragment the user holds the most of. Ties go to the
/// earlier guardian in the progression. Holding nothing means no guardian.
#[must_use]
pub fn active_guardian(progress: &[FragmentProgress]) -> Option<&Guardian> {
    progress
        .iter()
        .filter(|p| p.quantity > 0)
        .filter_map(|p| p.guardian.as_ref().map(|g| (p.quantity, g)))
        .min_by_key(|(quantity, g)| (std::cmp::Reverse(*quantity), g.progression_order()))
        .map(|(_, g)| g)
}

/// Most recent completion, if any.
#[must_use]
pub fn latest_completion(completions: &[CompletedLesson]) -> Option<&CompletedLesson> {
    completions.iter().max_by_key(|c| (c.completed_at, c.lesson_id))
}

/// Assemble the statistics. `last_lesson` is the lesson behind
/// [`latest_completion`], looked up by the caller.
#[must_use]
pub fn build_stats(
    progress: &[FragmentProgress],
    completions: &[CompletedLesson],
    last_lesson: Option<Lesson>,
    now: DateTime<FixedOffset>,
) -> UserStats {
    UserStats {
        last_lesson,
        active_guardian: active_guardian(progress).cloned(),
        streak: study_streak_at(completions.iter().map(|c| c.completed_at), now),
        total_lessons: completions.len(),
        total_fragments: progress.iter().map(|p| p.quantity).sum(),
        progress_percent: overall_percent(progress),
    }
}
