use chronicles_core::model::{Notification, NotificationId};

/// Client-side notification state. Pushes from the feed and local
/// "mark all read" are applied independently of storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inbox {
    items: Vec<Notification>,
}

impl Inbox {
    /// Start from a stored list, newest first.
    #[must_use]
    pub fn new(items: Vec<Notification>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    /// Prepend a pushed notification. Returns false for one already held.
    pub fn push(&mut self, item: Notification) -> bool {
        if self.items.iter().any(|n| n.id == item.id) {
            return false;
        }
        self.items.insert(0, item);
        true
    }

    /// Returns how many items changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for item in self.items.iter_mut().filter(|n| !n.read) {
            item.read = true;
            changed += 1;
        }
        changed
    }

    pub fn remove(&mut self, id: NotificationId) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicles_core::model::{NotificationDraft, UserId};
    use chronicles_core::time::fixed_now;

    fn note(id: u64) -> Notification {
        NotificationDraft::new(format!("n{id}"), "m")
            .validate()
            .unwrap()
            .addressed_to(UserId::random(), fixed_now())
            .with_id(NotificationId::new(id))
    }

    #[test]
    fn push_prepends_and_dedupes() {
        let mut inbox = Inbox::new(vec![note(1)]);
        assert!(inbox.push(note(2)));
        assert!(!inbox.push(note(2)));
        assert_eq!(inbox.items()[0].id, NotificationId::new(2));
        assert_eq!(inbox.unread_count(), 2);
    }

    #[test]
    fn local_mark_read_then_new_push_is_unread() {
        let mut inbox = Inbox::new(vec![note(1), note(2)]);
        assert_eq!(inbox.mark_all_read(), 2);
        inbox.push(note(3));
        assert_eq!(inbox.unread_count(), 1);
        assert!(inbox.remove(NotificationId::new(1)));
        assert!(!inbox.remove(NotificationId::new(1)));
        assert_eq!(inbox.items().len(), 2);
    }
}
