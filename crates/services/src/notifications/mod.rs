//! Per-user notifications: persistence, admin sends, the realtime feed and
//! the client-side inbox.

mod inbox;
mod service;

pub use inbox::Inbox;
pub use service::{FEED_CAPACITY, NotificationFeed, NotificationService};
