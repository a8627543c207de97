//! Grades a learner's answers for one lesson's activities.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Activity, ActivityId, Answer, CorrectAnswer};

/// Minimum score, in percent, for a lesson attempt to count as passed.
pub const PASS_THRESHOLD_PERCENT: f64 = 70.0;

/// Verdict for a single activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    pub activity_id: ActivityId,
    pub is_correct: bool,
    pub submitted: Option<Answer>,
    pub expected: CorrectAnswer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub correct: usize,
    pub total: usize,
    pub percentage: f64,
    pub passed: bool,
    pub results: Vec<ItemResult>,
}

/// Check one submission against an answer key.
///
/// A submission of the wrong shape is simply wrong.
#[must_use]
pub fn is_correct(expected: &CorrectAnswer, submitted: &Answer) -> bool {
    match (expected, submitted) {
        (CorrectAnswer::Index(want), Answer::Choice(got)) => want == got,
        (CorrectAnswer::Indices(want), Answer::Choices(got)) => {
            let mut want = want.clone();
            let mut got = got.clone();
            want.sort_unstable();
            got.sort_unstable();
            want == got
        }
        (CorrectAnswer::Text(want), Answer::Text(got)) => fold(want) == fold(got),
        _ => false,
    }
}

fn fold(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Grade `answers`, keyed by the activity's index within `activities`.
///
/// Missing answers count as wrong. An empty lesson scores 0% and fails.
#[must_use]
pub fn validate_answers(activities: &[Activity], answers: &HashMap<usize, Answer>) -> ValidationReport {
    let results: Vec<ItemResult> = activities
        .iter()
        .enumerate()
        .map(|(index, activity)| {
            let submitted = answers.get(&index).cloned();
            let is_correct = submitted
                .as_ref()
                .is_some_and(|answer| is_correct(&activity.answer, answer));
            ItemResult {
                activity_id: activity.id,
                is_correct,
                submitted,
                expected: activity.answer.clone(),
            }
        })
        .collect();

    let total = results.len();
    let correct = results.iter().filter(|r| r.is_correct).count();
    let percentage = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64 * 100.0
    };

    ValidationReport {
        correct,
        total,
        percentage,
        passed: total > 0 && percentage >= PASS_THRESHOLD_PERCENT,
        results,
    }
}
