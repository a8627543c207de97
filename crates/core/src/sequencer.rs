//! Picks the single lesson a learner should open next.

use std::collections::HashSet;

use crate::model::{GradeGroup, GuardianId, Lesson};

/// Outcome of the next-lesson lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextLesson {
    Lesson(Lesson),
    /// Every reachable lesson is done.
    Completed,
    /// Nothing is open to this learner yet.
    Unavailable,
}

impl NextLesson {
    #[must_use]
    pub fn lesson(&self) -> Option<&Lesson> {
        match self {
            NextLesson::Lesson(lesson) => Some(lesson),
            NextLesson::Completed | NextLesson::Unavailable => None,
        }
    }
}

/// Lesson position that starts every guardian's track.
const FIRST_POSITION: u32 = 1;

/// Resolve the next lesson.
///
/// With a last completed lesson, the next position under the same guardian
/// wins; otherwise the first lesson of another unlocked guardian; otherwise
/// the learner has completed everything reachable. Without history, the
/// first lesson of any unlocked guardian is used. Ties go to the oldest
/// lesson.
#[must_use]
pub fn next_lesson(
    lessons: &[Lesson],
    unlocked: &HashSet<GuardianId>,
    viewer: GradeGroup,
    last_completed: Option<&Lesson>,
) -> NextLesson {
    if unlocked.is_empty() {
        return NextLesson::Unavailable;
    }

    let eligible = |lesson: &&Lesson| {
        lesson.is_visible_to(viewer) && unlocked.contains(&lesson.guardian_id)
    };

    let Some(last) = last_completed else {
        return lessons
            .iter()
            .filter(eligible)
            .filter(|l| l.position == FIRST_POSITION)
            .min_by_key(|l| (l.created_at, l.id))
            .cloned()
            .map_or(NextLesson::Unavailable, NextLesson::Lesson);
    };

    let same_guardian = lessons
        .iter()
        .filter(eligible)
        .filter(|l| l.guardian_id == last.guardian_id && l.position > last.position)
        .min_by_key(|l| (l.position, l.created_at, l.id));
    if let Some(lesson) = same_guardian {
        return NextLesson::Lesson(lesson.clone());
    }

    lessons
        .iter()
        .filter(eligible)
        .filter(|l| l.guardian_id != last.guardian_id && l.position == FIRST_POSITION)
        .min_by_key(|l| (l.created_at, l.id))
        .cloned()
        .map_or(NextLesson::Completed, NextLesson::Lesson)
}
