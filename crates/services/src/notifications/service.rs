use std::sync::Arc;

use chronicles_core::model::{
    Broadcast, Notification, NotificationDraft, NotificationId, UserId,
};
use storage::StorageError;
use storage::repository::{NotificationRepository, ProfileRepository};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::access::role_of;
use crate::error::NotificationServiceError;

/// Buffered pushes per subscriber before it starts lagging.
pub const FEED_CAPACITY: usize = 256;

/// Notification inbox operations plus an in-process push channel.
#[derive(Clone)]
pub struct NotificationService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    notifications: Arc<dyn NotificationRepository>,
    feed: broadcast::Sender<Notification>,
}

impl NotificationService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            clock,
            profiles,
            notifications,
            feed,
        }
    }

    async fn require_admin(&self, actor: UserId) -> Result<(), NotificationServiceError> {
        if role_of(self.profiles.as_ref(), actor).await?.is_admin() {
            Ok(())
        } else {
            Err(NotificationServiceError::Forbidden)
        }
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `NotificationServiceError::Storage` if repository access fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Notification>, NotificationServiceError> {
        let items = self.notifications.notifications_for_user(user_id).await?;
        debug!(%user_id, count = items.len(), "listed notifications");
        Ok(items)
    }

    /// # Errors
    ///
    /// Returns `NotificationServiceError::Storage` if repository access fails.
    pub async fn unread_count(&self, user_id: UserId) -> Result<usize, NotificationServiceError> {
        let items = self.notifications.notifications_for_user(user_id).await?;
        Ok(items.iter().filter(|n| !n.read).count())
    }

    /// Returns how many notifications changed.
    ///
    /// # Errors
    ///
    /// Returns `NotificationServiceError::Storage` if repository access fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, NotificationServiceError> {
        let changed = self.notifications.mark_all_read(user_id).await?;
        info!(%user_id, changed, "notifications marked read");
        Ok(changed)
    }

    /// # Errors
    ///
    /// Returns `NotificationServiceError::NotFound` unless the notification
    /// exists and belongs to `user_id`.
    pub async fn delete(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<(), NotificationServiceError> {
        self.notifications
            .delete_notification(user_id, id)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => NotificationServiceError::NotFound,
                other => NotificationServiceError::Storage(other),
            })?;
        debug!(%user_id, notification_id = %id, "notification deleted");
        Ok(())
    }

    /// Admin message to a single user.
    ///
    /// # Errors
    ///
    /// Returns `NotificationServiceError::Forbidden` for non-admins and
    /// `NotificationServiceError::Notification` for an invalid draft.
    pub async fn send(
        &self,
        actor: UserId,
        recipient: UserId,
        draft: NotificationDraft,
    ) -> Result<Notification, NotificationServiceError> {
        self.require_admin(actor).await?;
        let validated = draft.validate()?;
        let mut stored = self
            .notifications
            .insert_notifications(&[validated.addressed_to(recipient, self.clock.now())])
            .await?;
        self.publish(&stored);
        info!(%actor, %recipient, "notification sent");
        stored.pop().ok_or(NotificationServiceError::NotFound)
    }

    /// Admin message to every profile, optionally one grade group only.
    /// Returns the stored notifications, one per recipient.
    ///
    /// # Errors
    ///
    /// Returns `NotificationServiceError::Forbidden` for non-admins and
    /// `NotificationServiceError::Notification` for an invalid draft.
    pub async fn broadcast(
        &self,
        actor: UserId,
        broadcast: Broadcast,
    ) -> Result<Vec<Notification>, NotificationServiceError> {
        self.require_admin(actor).await?;
        let validated = broadcast.draft.validate()?;
        let recipients = self.profiles.list_profiles(broadcast.grade_filter).await?;
        let now = self.clock.now();
        let batch: Vec<_> = recipients
            .iter()
            .map(|p| validated.addressed_to(p.user_id, now))
            .collect();
        let stored = self.notifications.insert_notifications(&batch).await?;
        self.publish(&stored);
        info!(
            %actor,
            group = ?broadcast.grade_filter,
            recipients = stored.len(),
            "broadcast sent"
        );
        Ok(stored)
    }

    /// Live feed of notifications stored for `user_id` from now on.
    #[must_use]
    pub fn subscribe(&self, user_id: UserId) -> NotificationFeed {
        NotificationFeed {
            user_id,
            rx: self.feed.subscribe(),
        }
    }

    fn publish(&self, items: &[Notification]) {
        for item in items {
            // No subscribers is fine; the rows are already stored.
            let _ = self.feed.send(item.clone());
        }
    }
}

/// One user's view of the push channel.
pub struct NotificationFeed {
    user_id: UserId,
    rx: broadcast::Receiver<Notification>,
}

impl NotificationFeed {
    /// Wait for the next notification for this user. `None` once the
    /// service is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(item) if item.user_id == self.user_id => return Some(item),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %self.user_id, skipped, "notification feed lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Self::recv`].
    pub fn try_recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.try_recv() {
                Ok(item) if item.user_id == self.user_id => return Some(item),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(user_id = %self.user_id, skipped, "notification feed lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicles_core::model::{GradeGroup, SignUpForm};
    use chronicles_core::time::{fixed_clock, fixed_now};
    use chrono::NaiveDate;
    use storage::repository::InMemoryRepository;

    async fn profile(repo: &InMemoryRepository, grade: u8) -> UserId {
        let user = UserId::random();
        let p = SignUpForm {
            email: "s@example.org".into(),
            password: "secret1".into(),
            password_confirmation: "secret1".into(),
            display_name: "Student".into(),
            school: None,
            grade: Some(grade),
            birth_date: NaiveDate::from_ymd_opt(2011, 3, 3),
        }
        .validate(user, fixed_now())
        .unwrap();
        repo.insert_profile(&p).await.unwrap();
        user
    }

    async fn setup() -> (InMemoryRepository, NotificationService, UserId) {
        let repo = InMemoryRepository::new();
        let admin = UserId::random();
        repo.grant_admin(admin).await.unwrap();
        let service =
            NotificationService::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo.clone()));
        (repo, service, admin)
    }

    #[tokio::test]
    async fn broadcast_filters_by_grade_group() {
        let (repo, service, admin) = setup().await;
        let younger = profile(&repo, 6).await;
        let older = profile(&repo, 9).await;

        let sent = service
            .broadcast(
                admin,
                Broadcast {
                    draft: NotificationDraft::new("Quiz", "Friday"),
                    grade_filter: Some(GradeGroup::EighthNinth),
                },
            )
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, older);
        assert!(service.list(younger).await.unwrap().is_empty());
        assert_eq!(service.unread_count(older).await.unwrap(), 1);

        let everyone = service
            .broadcast(
                admin,
                Broadcast {
                    draft: NotificationDraft::new("Holiday", "No class"),
                    grade_filter: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(everyone.len(), 2);
    }

    #[tokio::test]
    async fn students_cannot_send() {
        let (repo, service, _) = setup().await;
        let kid = profile(&repo, 7).await;
        let err = service
            .send(kid, kid, NotificationDraft::new("hi", "there"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationServiceError::Forbidden));
    }

    #[tokio::test]
    async fn mark_read_and_delete_are_per_user() {
        let (repo, service, admin) = setup().await;
        let a = profile(&repo, 7).await;
        let b = profile(&repo, 7).await;
        let for_a = service.send(admin, a, NotificationDraft::new("t", "m")).await.unwrap();
        service.send(admin, a, NotificationDraft::new("t2", "m2")).await.unwrap();

        assert_eq!(service.mark_all_read(a).await.unwrap(), 2);
        assert_eq!(service.mark_all_read(a).await.unwrap(), 0);
        assert_eq!(service.unread_count(a).await.unwrap(), 0);

        assert!(matches!(
            service.delete(b, for_a.id).await.unwrap_err(),
            NotificationServiceError::NotFound
        ));
        service.delete(a, for_a.id).await.unwrap();
        assert_eq!(service.list(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subscribers_only_see_their_own_items() {
        let (repo, service, admin) = setup().await;
        let a = profile(&repo, 7).await;
        let b = profile(&repo, 8).await;
        let mut feed_a = service.subscribe(a);
        let mut feed_b = service.subscribe(b);

        service.send(admin, b, NotificationDraft::new("for b", "m")).await.unwrap();
        service.send(admin, a, NotificationDraft::new("for a", "m")).await.unwrap();

        let got = feed_a.recv().await.unwrap();
        assert_eq!(got.title, "for a");
        assert!(feed_a.try_recv().is_none());

        assert_eq!(feed_b.try_recv().map(|n| n.title), Some("for b".to_owned()));
        assert!(feed_b.try_recv().is_none());
    }
}
