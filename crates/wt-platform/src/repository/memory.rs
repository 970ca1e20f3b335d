//! In-memory repositories for development and tests.
//!
//! Uniqueness checks and inserts happen under one write lock, matching the
//! guarantees the MongoDB unique indexes give.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{AttendanceRecord, AttendanceStatus, CheckOut, ProfileUpdate, User};
use crate::error::Result;
use crate::repository::{AttendanceRepository, UserRepository};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn ensure_indexes(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, user: &User) -> Result<bool> {
        let mut users = self.users.write();
        if users.values().any(|u| u.email == user.email) || users.contains_key(&user.id) {
            return Ok(false);
        }
        users.insert(user.id.clone(), user.clone());
        Ok(true)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.read().values().find(|u| u.email == email).cloned())
    }

    async fn find_all(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_password(
        &self,
        id: &str,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        match self.users.write().get_mut(id) {
            Some(user) => {
                user.password = password_hash.to_string();
                user.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(id) else {
            return Ok(None);
        };
        user.position = update.position.clone();
        user.phone_number = update.phone_number.clone();
        user.image_url = update.image_url.clone();
        user.updated_at = updated_at;
        Ok(Some(user.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryAttendanceRepository {
    records: RwLock<HashMap<String, AttendanceRecord>>,
}

impl InMemoryAttendanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut records: Vec<AttendanceRecord>) -> Vec<AttendanceRecord> {
        records.sort_by(|a, b| b.check_in_time.cmp(&a.check_in_time));
        records
    }
}

#[async_trait]
impl AttendanceRepository for InMemoryAttendanceRepository {
    async fn ensure_indexes(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_unique(&self, record: &AttendanceRecord) -> Result<bool> {
        let mut records = self.records.write();
        let same_day = records.values().any(|r| {
            r.user_id == record.user_id && r.check_in_date == record.check_in_date
        });
        if same_day {
            return Ok(false);
        }
        records.insert(record.id.clone(), record.clone());
        Ok(true)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<AttendanceRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<AttendanceRecord>> {
        let records = self.records
            .read()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(records))
    }

    async fn find_by_user_in_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AttendanceRecord>> {
        let records = self.records
            .read()
            .values()
            .filter(|r| r.user_id == user_id && r.check_in_date >= from && r.check_in_date <= to)
            .cloned()
            .collect();
        Ok(Self::newest_first(records))
    }

    async fn complete_check_out(
        &self,
        id: &str,
        check_out: &CheckOut,
    ) -> Result<Option<AttendanceRecord>> {
        let mut records = self.records.write();
        let Some(record) = records.get_mut(id) else {
            return Ok(None);
        };
        if record.status != AttendanceStatus::CheckedIn {
            return Ok(None);
        }
        record.check_out_time = Some(check_out.check_out_time);
        record.check_out_date = Some(check_out.check_out_date);
        record.work_minutes = Some(check_out.work_minutes);
        record.work_duration = Some(check_out.work_duration.clone());
        record.status = AttendanceStatus::CheckedOut;
        record.updated_at = check_out.updated_at;
        Ok(Some(record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    fn record(user: &str, d: u32, h: u32) -> AttendanceRecord {
        AttendanceRecord::check_in(user, at(d, h), at(d, 0), at(d, h))
    }

    #[tokio::test]
    async fn test_same_day_insert_rejected() {
        let repo = InMemoryAttendanceRepository::new();
        assert!(repo.insert_unique(&record("u1", 4, 9)).await.unwrap());
        assert!(!repo.insert_unique(&record("u1", 4, 13)).await.unwrap());
        assert!(repo.insert_unique(&record("u2", 4, 9)).await.unwrap());
        assert!(repo.insert_unique(&record("u1", 5, 9)).await.unwrap());
    }

    #[tokio::test]
    async fn test_range_is_inclusive_and_newest_first() {
        let repo = InMemoryAttendanceRepository::new();
        for d in [3, 4, 5, 6] {
            repo.insert_unique(&record("u1", d, 9)).await.unwrap();
        }

        let found = repo.find_by_user_in_range("u1", at(4, 0), at(5, 0)).await.unwrap();
        let days: Vec<_> = found.iter().map(|r| r.check_in_date).collect();
        assert_eq!(days, vec![at(5, 0), at(4, 0)]);
    }

    #[tokio::test]
    async fn test_check_out_only_once() {
        let repo = InMemoryAttendanceRepository::new();
        let open = record("u1", 4, 9);
        repo.insert_unique(&open).await.unwrap();

        let check_out = CheckOut {
            check_out_time: at(4, 17),
            check_out_date: at(4, 0),
            work_minutes: 480,
            work_duration: "8h0m".to_string(),
            updated_at: at(4, 17),
        };
        let done = repo.complete_check_out(&open.id, &check_out).await.unwrap().unwrap();
        assert_eq!(done.status, AttendanceStatus::CheckedOut);
        assert!(repo.complete_check_out(&open.id, &check_out).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = InMemoryUserRepository::new();
        let now = at(1, 8);
        let first = User::new("Ada", "ada@example.com", "h", Default::default(), now);
        let second = User::new("Ada 2", "ada@example.com", "h", Default::default(), now);

        assert!(repo.insert(&first).await.unwrap());
        assert!(!repo.insert(&second).await.unwrap());
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
    }
}
