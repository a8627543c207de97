use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::grade::GradeGroup;
use crate::model::ids::{NotificationId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotificationError {
    #[error("notification title cannot be empty")]
    EmptyTitle,

    #[error("notification message cannot be empty")]
    EmptyMessage,

    #[error("color must be a #RRGGBB hex value, got {0}")]
    InvalidColor(String),

    #[error("deep link must be an app path starting with '/', got {0}")]
    InvalidLink(String),
}

pub const DEFAULT_ICON: &str = "bell";
pub const DEFAULT_COLOR: &str = "#6366F1";

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub link: Option<String>,
}

impl NotificationDraft {
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            icon: None,
            color: None,
            link: None,
        }
    }

    /// # Errors
    ///
    /// Returns `NotificationError` for blank text, a malformed colour or link.
    pub fn validate(self) -> Result<ValidatedNotification, NotificationError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(NotificationError::EmptyTitle);
        }
        let message = self.message.trim().to_owned();
        if message.is_empty() {
            return Err(NotificationError::EmptyMessage);
        }

        let color = match self.color.map(|c| c.trim().to_owned()) {
            Some(c) if !c.is_empty() => {
                if !is_hex_color(&c) {
                    return Err(NotificationError::InvalidColor(c));
                }
                c
            }
            _ => DEFAULT_COLOR.to_owned(),
        };

        let icon = self
            .icon
            .map(|i| i.trim().to_owned())
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| DEFAULT_ICON.to_owned());

        let link = match self.link.map(|l| l.trim().to_owned()) {
            Some(l) if l.is_empty() => None,
            Some(l) if l.starts_with('/') => Some(l),
            Some(l) => return Err(NotificationError::InvalidLink(l)),
            None => None,
        };

        Ok(ValidatedNotification {
            title,
            message,
            icon,
            color,
            link,
        })
    }
}

fn is_hex_color(raw: &str) -> bool {
    raw.len() == 7
        && raw.starts_with('#')
        && raw[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedNotification {
    pub title: String,
    pub message: String,
    pub icon: String,
    pub color: String,
    pub link: Option<String>,
}

impl ValidatedNotification {
    #[must_use]
    pub fn addressed_to(&self, user_id: UserId, now: DateTime<Utc>) -> NewNotification {
        NewNotification {
            user_id,
            title: self.title.clone(),
            message: self.message.clone(),
            icon: self.icon.clone(),
            color: self.color.clone(),
            link: self.link.clone(),
            created_at: now,
        }
    }
}

/// Admin message to every student, optionally limited to one grade group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub draft: NotificationDraft,
    pub grade_filter: Option<GradeGroup>,
}

//
// ─── PERSISTED ─────────────────────────────────────────────────────────────────
//

/// Row ready for insertion; storage assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub icon: String,
    pub color: String,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    #[must_use]
    pub fn with_id(self, id: NotificationId) -> Notification {
        Notification {
            id,
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            icon: self.icon,
            color: self.color,
            link: self.link,
            read: false,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub icon: String,
    pub color: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_icon_and_color() {
        let ok = NotificationDraft::new(" New lesson ", "Fractions are live").validate().unwrap();
        assert_eq!(ok.title, "New lesson");
        assert_eq!(ok.icon, DEFAULT_ICON);
        assert_eq!(ok.color, DEFAULT_COLOR);
        assert_eq!(ok.link, None);
    }

    #[test]
    fn rejects_bad_color_and_link() {
        let mut d = NotificationDraft::new("t", "m");
        d.color = Some("blue".into());
        assert_eq!(
            d.validate().unwrap_err(),
            NotificationError::InvalidColor("blue".into())
        );

        let mut d = NotificationDraft::new("t", "m");
        d.link = Some("https://elsewhere.example".into());
        assert!(matches!(d.validate().unwrap_err(), NotificationError::InvalidLink(_)));
    }

    #[test]
    fn accepts_app_link() {
        let mut d = NotificationDraft::new("t", "m");
        d.link = Some("/lessons/4".into());
        d.color = Some("#22C55E".into());
        let ok = d.validate().unwrap();
        assert_eq!(ok.link.as_deref(), Some("/lessons/4"));
        assert_eq!(ok.color, "#22C55E");
    }

    #[test]
    fn blank_message_is_rejected() {
        let err = NotificationDraft::new("t", "  ").validate().unwrap_err();
        assert_eq!(err, NotificationError::EmptyMessage);
    }
}
