use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{FragmentId, GuardianId, UserId};

/// Capacity used by the seeded catalog.
pub const DEFAULT_FRAGMENT_CAPACITY: u32 = 15;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FragmentError {
    #[error("fragment capacity must be > 0")]
    ZeroCapacity,

    #[error("fragment name cannot be empty")]
    EmptyName,
}

/// Collectible counter tied to one guardian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    id: FragmentId,
    guardian_id: GuardianId,
    name: String,
    capacity: u32,
}

impl Fragment {
    /// # Errors
    ///
    /// Returns `FragmentError` if the name is blank or the capacity is zero.
    pub fn new(
        id: FragmentId,
        guardian_id: GuardianId,
        name: impl Into<String>,
        capacity: u32,
    ) -> Result<Self, FragmentError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(FragmentError::EmptyName);
        }
        if capacity == 0 {
            return Err(FragmentError::ZeroCapacity);
        }
        Ok(Self {
            id,
            guardian_id,
            name,
            capacity,
        })
    }

    #[must_use]
    pub fn id(&self) -> FragmentId {
        self.id
    }

    #[must_use]
    pub fn guardian_id(&self) -> GuardianId {
        self.guardian_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// A user's holdings of one fragment kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFragment {
    pub user_id: UserId,
    pub fragment_id: FragmentId,
    pub quantity: u32,
    pub updated_at: DateTime<Utc>,
}

impl UserFragment {
    /// Add `amount`, never exceeding `capacity`. Returns the new quantity.
    pub fn add(&mut self, amount: u32, capacity: u32, now: DateTime<Utc>) -> u32 {
        self.quantity = clamp_quantity(self.quantity, amount, capacity);
        self.updated_at = now;
        self.quantity
    }
}

/// `min(current + amount, capacity)` without overflow.
#[must_use]
pub fn clamp_quantity(current: u32, amount: u32, capacity: u32) -> u32 {
    current.saturating_add(amount).min(capacity)
}
