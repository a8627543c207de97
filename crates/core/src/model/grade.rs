use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradeError {
    #[error("grade must be between 6 and 9, got {0}")]
    OutOfRange(u8),

    #[error("unknown grade group: {0}")]
    UnknownGroup(String),
}

//
// ─── GRADE ─────────────────────────────────────────────────────────────────────
//

/// School year of a student (6th through 9th grade).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Grade(u8);

impl Grade {
    pub const MIN: u8 = 6;
    pub const MAX: u8 = 9;

    /// # Errors
    ///
    /// Returns `GradeError::OutOfRange` outside 6..=9.
    pub fn new(value: u8) -> Result<Self, GradeError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(GradeError::OutOfRange(value))
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Cohort this grade belongs to.
    #[must_use]
    pub fn group(self) -> GradeGroup {
        if self.0 <= 7 {
            GradeGroup::SixthSeventh
        } else {
            GradeGroup::EighthNinth
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── GRADE GROUP ───────────────────────────────────────────────────────────────
//

/// Visibility filter for lessons and broadcast notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradeGroup {
    SixthSeventh,
    EighthNinth,
    All,
}

impl GradeGroup {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GradeGroup::SixthSeventh => "6-7",
            GradeGroup::EighthNinth => "8-9",
            GradeGroup::All => "all",
        }
    }

    /// Returns true when content tagged with `self` is visible to a viewer in `viewer`.
    ///
    /// `All` on either side matches everything.
    #[must_use]
    pub fn admits(self, viewer: GradeGroup) -> bool {
        self == GradeGroup::All || viewer == GradeGroup::All || self == viewer
    }
}

impl fmt::Display for GradeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GradeGroup {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "6-7" => Ok(GradeGroup::SixthSeventh),
            "8-9" => Ok(GradeGroup::EighthNinth),
            "all" => Ok(GradeGroup::All),
            other => Err(GradeError::UnknownGroup(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_bounds_are_enforced() {
        assert!(Grade::new(6).is_ok());
        assert!(Grade::new(9).is_ok());
        assert_eq!(Grade::new(5).unwrap_err(), GradeError::OutOfRange(5));
        assert_eq!(Grade::new(10).unwrap_err(), GradeError::OutOfRange(10));
    }

    #[test]
    fn grade_maps_to_group() {
        assert_eq!(Grade::new(6).unwrap().group(), GradeGroup::SixthSeventh);
        assert_eq!(Grade::new(7).unwrap().group(), GradeGroup::SixthSeventh);
        assert_eq!(Grade::new(8).unwrap().group(), GradeGroup::EighthNinth);
        assert_eq!(Grade::new(9).unwrap().group(), GradeGroup::EighthNinth);
    }

    #[test]
    fn all_matches_any_viewer() {
        assert!(GradeGroup::All.admits(GradeGroup::SixthSeventh));
        assert!(GradeGroup::EighthNinth.admits(GradeGroup::All));
        assert!(GradeGroup::EighthNinth.admits(GradeGroup::EighthNinth));
        assert!(!GradeGroup::EighthNinth.admits(GradeGroup::SixthSeventh));
    }

    #[test]
    fn group_parses_labels() {
        assert_eq!(" all ".parse::<GradeGroup>().unwrap(), GradeGroup::All);
        assert_eq!("8-9".parse::<GradeGroup>().unwrap(), GradeGroup::EighthNinth);
        assert!("10-11".parse::<GradeGroup>().is_err());
    }
}
