use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{ActivityId, LessonId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActivityError {
    #[error("activity prompt cannot be empty")]
    EmptyPrompt,

    #[error("choice activities need at least 2 options, got {0}")]
    TooFewOptions(usize),

    #[error("correct option {index} is out of range for {options} options")]
    AnswerOutOfRange { index: usize, options: usize },

    #[error("multi-choice activities need at least one correct option")]
    NoCorrectOptions,

    #[error("fill-in-the-blank answer cannot be empty")]
    EmptyAnswer,

    #[error("position must be >= 1")]
    InvalidPosition,
}

//
// ─── KINDS & ANSWERS ───────────────────────────────────────────────────────────
//

/// The three question kinds an activity can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    SingleChoice,
    MultiChoice,
    FillBlank,
}

impl ActivityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::SingleChoice => "single_choice",
            ActivityKind::MultiChoice => "multi_choice",
            ActivityKind::FillBlank => "fill_blank",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored answer key. The variant decides the activity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectAnswer {
    Index(usize),
    Indices(Vec<usize>),
    Text(String),
}

impl CorrectAnswer {
    #[must_use]
    pub fn kind(&self) -> ActivityKind {
        match self {
            CorrectAnswer::Index(_) => ActivityKind::SingleChoice,
            CorrectAnswer::Indices(_) => ActivityKind::MultiChoice,
            CorrectAnswer::Text(_) => ActivityKind::FillBlank,
        }
    }
}

/// A learner's submission for one activity.
///
/// Untagged so that a JSON answer sheet reads naturally: `1`, `[0, 2]` or `"rio"`.
/// Any other JSON value lands in `Other` and never matches a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(usize),
    Choices(Vec<usize>),
    Text(String),
    Other(serde_json::Value),
}

//
// ─── ACTIVITY TYPES ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityDraft {
    pub lesson_id: LessonId,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: CorrectAnswer,
    pub position: u32,
}

impl ActivityDraft {
    /// Validate the draft. Blank options are dropped before index checks.
    ///
    /// # Errors
    ///
    /// Returns `ActivityError` when the prompt, options or answer key are unusable.
    pub fn validate(self) -> Result<ValidatedActivity, ActivityError> {
        let prompt = self.prompt.trim().to_owned();
        if prompt.is_empty() {
            return Err(ActivityError::EmptyPrompt);
        }
        if self.position == 0 {
            return Err(ActivityError::InvalidPosition);
        }

        let options: Vec<String> = self
            .options
            .into_iter()
            .map(|o| o.trim().to_owned())
            .filter(|o| !o.is_empty())
            .collect();

        let answer = match self.answer {
            CorrectAnswer::Index(index) => {
                check_choice_options(&options)?;
                check_index(index, options.len())?;
                CorrectAnswer::Index(index)
            }
            CorrectAnswer::Indices(mut indices) => {
                check_choice_options(&options)?;
                if indices.is_empty() {
                    return Err(ActivityError::NoCorrectOptions);
                }
                for index in &indices {
                    check_index(*index, options.len())?;
                }
                indices.sort_unstable();
                indices.dedup();
                CorrectAnswer::Indices(indices)
            }
            CorrectAnswer::Text(text) => {
                let text = text.trim().to_owned();
                if text.is_empty() {
                    return Err(ActivityError::EmptyAnswer);
                }
                CorrectAnswer::Text(text)
            }
        };

        Ok(ValidatedActivity {
            lesson_id: self.lesson_id,
            prompt,
            options,
            answer,
            position: self.position,
        })
    }
}

fn check_choice_options(options: &[String]) -> Result<(), ActivityError> {
    if options.len() < 2 {
        return Err(ActivityError::TooFewOptions(options.len()));
    }
    Ok(())
}

fn check_index(index: usize, options: usize) -> Result<(), ActivityError> {
    if index >= options {
        return Err(ActivityError::AnswerOutOfRange { index, options });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedActivity {
    pub lesson_id: LessonId,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: CorrectAnswer,
    pub position: u32,
}

impl ValidatedActivity {
    #[must_use]
    pub fn assign_id(self, id: ActivityId) -> Activity {
        Activity {
            id,
            lesson_id: self.lesson_id,
            prompt: self.prompt,
            options: self.options,
            answer: self.answer,
            position: self.position,
        }
    }
}

/// A graded question attached to a lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub id: ActivityId,
    pub lesson_id: LessonId,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: CorrectAnswer,
    pub position: u32,
}

impl Activity {
    #[must_use]
    pub fn kind(&self) -> ActivityKind {
        self.answer.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(answer: CorrectAnswer) -> ActivityDraft {
        ActivityDraft {
            lesson_id: LessonId::new(1),
            prompt: "Which are prime?".into(),
            options: vec!["2".into(), "".into(), "4".into(), "5".into()],
            answer,
            position: 1,
        }
    }

    #[test]
    fn blank_options_are_dropped_before_range_check() {
        let ok = draft(CorrectAnswer::Indices(vec![2, 0, 2])).validate().unwrap();
        assert_eq!(ok.options, vec!["2", "4", "5"]);
        assert_eq!(ok.answer, CorrectAnswer::Indices(vec![0, 2]));

        let err = draft(CorrectAnswer::Index(3)).validate().unwrap_err();
        assert_eq!(err, ActivityError::AnswerOutOfRange { index: 3, options: 3 });
    }

    #[test]
    fn fill_blank_needs_text_but_not_options() {
        let mut d = draft(CorrectAnswer::Text("  ".into()));
        d.options.clear();
        assert_eq!(d.clone().validate().unwrap_err(), ActivityError::EmptyAnswer);

        d.answer = CorrectAnswer::Text(" Rio ".into());
        let ok = d.validate().unwrap();
        assert_eq!(ok.answer, CorrectAnswer::Text("Rio".into()));
        assert_eq!(ok.answer.kind(), ActivityKind::FillBlank);
    }

    #[test]
    fn choice_needs_two_options() {
        let mut d = draft(CorrectAnswer::Index(0));
        d.options = vec!["only".into()];
        assert_eq!(d.validate().unwrap_err(), ActivityError::TooFewOptions(1));
    }
}
