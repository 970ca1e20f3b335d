//! User directory and self-service profile updates

use std::sync::Arc;

use tracing::info;

use crate::domain::{ProfileUpdate, User};
use crate::error::{PlatformError, Result};
use crate::repository::UserRepository;
use crate::service::auth::ensure_user_id;
use crate::service::{Clock, ProfileChangeNotifier};

pub struct UserService {
    users: Arc<dyn UserRepository>,
    notifier: Arc<ProfileChangeNotifier>,
    clock: Arc<dyn Clock>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        notifier: Arc<ProfileChangeNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            notifier,
            clock,
        }
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.users.find_all().await
    }

    pub async fn get(&self, id: &str) -> Result<User> {
        if id.trim().is_empty() {
            return Err(PlatformError::validation("missing userId"));
        }
        ensure_user_id(id, "invalid userId")?;
        self.users.find_by_id(id).await?.ok_or_else(PlatformError::not_found)
    }

    /// Same checks as `get`, for the caller's own id
    pub async fn me(&self, user_id: &str) -> Result<User> {
        self.get(user_id).await
    }

    /// Replace the caller's profile fields, then publish the new snapshot.
    ///
    /// Fields absent from `update` are cleared.
    pub async fn update_me(&self, user_id: &str, update: ProfileUpdate) -> Result<User> {
        if user_id.trim().is_empty() {
            return Err(PlatformError::validation("missing userId"));
        }
        ensure_user_id(user_id, "invalid userId")?;

        let user = self.users
            .update_profile(user_id, &update, self.clock.now())
            .await?
            .ok_or_else(PlatformError::not_found)?;
        info!(user_id = %user.id, "Profile updated");

        self.notifier.publish(&user).await;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::error::ErrorKind;
    use crate::repository::InMemoryUserRepository;
    use crate::service::FixedClock;
    use chrono::{Duration, TimeZone, Utc};
    use wt_common::ProfileChangeEvent;
    use wt_queue::{InMemoryQueue, QueueConsumer};

    struct Fixture {
        users: UserService,
        repo: Arc<InMemoryUserRepository>,
        queue: Arc<InMemoryQueue>,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
        ));
        let repo = Arc::new(InMemoryUserRepository::new());
        let queue = Arc::new(InMemoryQueue::new("user.profile.updated"));
        let notifier = Arc::new(ProfileChangeNotifier::new(queue.clone(), clock.clone()));
        let users = UserService::new(repo.clone(), notifier, clock.clone());
        Fixture {
            users,
            repo,
            queue,
            clock,
        }
    }

    async fn seed(f: &Fixture) -> User {
        let user = User::new("Ada", "ada@example.com", "hash", Role::Employee, f.clock.now());
        f.repo.insert(&user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_get_validates_id() {
        let f = fixture();
        let err = f.users.get("123").await.unwrap_err();
        assert_eq!(err.to_string(), "invalid userId");

        let err = f.users.get(&uuid::Uuid::new_v4().to_string()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_me_replaces_fields_and_publishes() {
        let f = fixture();
        let user = seed(&f).await;

        f.clock.advance(Duration::minutes(5));
        let first = ProfileUpdate {
            position: Some("Engineer".to_string()),
            phone_number: Some("555".to_string()),
            image_url: None,
        };
        f.users.update_me(&user.id, first).await.unwrap();

        let second = ProfileUpdate {
            position: Some("Lead".to_string()),
            ..Default::default()
        };
        let updated = f.users.update_me(&user.id, second).await.unwrap();
        assert_eq!(updated.position.as_deref(), Some("Lead"));
        assert_eq!(updated.phone_number, None);
        assert_eq!(updated.updated_at, f.clock.now());

        assert_eq!(f.queue.ready_len(), 2);
        let _ = f.queue.receive().await.unwrap().unwrap();
        let latest = f.queue.receive().await.unwrap().unwrap();
        let event: ProfileChangeEvent = serde_json::from_slice(&latest.payload).unwrap();
        assert_eq!(event.position.as_deref(), Some("Lead"));
        assert_eq!(event.updated_at, f.clock.now().timestamp());
    }

    #[tokio::test]
    async fn test_update_succeeds_when_channel_is_down() {
        let f = fixture();
        let user = seed(&f).await;
        f.queue.close();

        let updated = f.users
            .update_me(&user.id, ProfileUpdate::default())
            .await
            .unwrap();
        assert_eq!(updated.id, user.id);
    }
}
