use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::GuardianId;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum GuardianError {
    #[error("guardian name cannot be empty")]
    EmptyName,

    #[error("progression order must be >= 1")]
    InvalidOrder,

    #[error("unlock threshold must be within 0..=100, got {0}")]
    InvalidThreshold(f64),

    #[error("unknown subject area: {0}")]
    UnknownArea(String),
}

/// Subject area a guardian watches over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Area {
    Portuguese,
    Math,
    Humanities,
    Science,
}

impl Area {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Area::Portuguese => "portuguese",
            Area::Math => "math",
            Area::Humanities => "humanities",
            Area::Science => "science",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Area {
    type Err = GuardianError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "portuguese" => Ok(Area::Portuguese),
            "math" => Ok(Area::Math),
            "humanities" => Ok(Area::Humanities),
            "science" => Ok(Area::Science),
            other => Err(GuardianError::UnknownArea(other.to_owned())),
        }
    }
}

/// Catalog entry for one subject area.
///
/// Guardians form a chain by `progression_order`; each one (except the first)
/// opens once the previous guardian's fragment reaches `unlock_threshold` percent.
#[derive(Debug, Clone, PartialEq)]
pub struct Guardian {
    id: GuardianId,
    name: String,
    area: Area,
    progression_order: u32,
    unlock_threshold: f64,
}

impl Guardian {
    /// # Errors
    ///
    /// Returns `GuardianError` if the name is blank, the order is zero or the
    /// threshold is not a percentage.
    pub fn new(
        id: GuardianId,
        name: impl Into<String>,
        area: Area,
        progression_order: u32,
        unlock_threshold: f64,
    ) -> Result<Self, GuardianError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(GuardianError::EmptyName);
        }
        if progression_order == 0 {
            return Err(GuardianError::InvalidOrder);
        }
        if !unlock_threshold.is_finite() || !(0.0..=100.0).contains(&unlock_threshold) {
            return Err(GuardianError::InvalidThreshold(unlock_threshold));
        }
        Ok(Self {
            id,
            name,
            area,
            progression_order,
            unlock_threshold,
        })
    }

    #[must_use]
    pub fn id(&self) -> GuardianId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn area(&self) -> Area {
        self.area
    }

    #[must_use]
    pub fn progression_order(&self) -> u32 {
        self.progression_order
    }

    /// Percentage of the previous guardian's fragment required to unlock this one.
    #[must_use]
    pub fn unlock_threshold(&self) -> f64 {
        self.unlock_threshold
    }
}
