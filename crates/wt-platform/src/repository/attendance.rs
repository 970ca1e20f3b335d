//! Attendance Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use tracing::info;

use crate::domain::{AttendanceRecord, AttendanceStatus, CheckOut};
use crate::error::Result;
use crate::repository::is_duplicate_key;

#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    async fn ensure_indexes(&self) -> Result<()>;

    /// Insert unless a record for the same user and day key exists.
    ///
    /// The check and the insert are a single atomic step. Returns `false` on
    /// a same-day duplicate.
    async fn insert_unique(&self, record: &AttendanceRecord) -> Result<bool>;

    async fn find_by_id(&self, id: &str) -> Result<Option<AttendanceRecord>>;

    /// All records of a user, newest check-in first
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<AttendanceRecord>>;

    /// Records whose day key lies in `[from, to]`, newest check-in first
    async fn find_by_user_in_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AttendanceRecord>>;

    /// Complete a record that is still checked in.
    ///
    /// Returns `None` when the record is missing or already checked out.
    async fn complete_check_out(
        &self,
        id: &str,
        check_out: &CheckOut,
    ) -> Result<Option<AttendanceRecord>>;
}

pub struct MongoAttendanceRepository {
    collection: Collection<AttendanceRecord>,
}

impl MongoAttendanceRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("attendances"),
        }
    }

    fn newest_first() -> FindOptions {
        FindOptions::builder()
            .sort(doc! { "checkInTime": -1 })
            .build()
    }
}

#[async_trait]
impl AttendanceRepository for MongoAttendanceRepository {
    async fn ensure_indexes(&self) -> Result<()> {
        let indexes = vec![
            // One record per user per day
            IndexModel::builder()
                .keys(doc! { "userId": 1, "checkInDate": 1 })
                .options(
                    IndexOptions::builder()
                        .name("uniq_user_day".to_string())
                        .unique(true)
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "userId": 1, "checkInTime": -1 })
                .options(IndexOptions::builder().name("idx_user_time".to_string()).build())
                .build(),
        ];

        self.collection.create_indexes(indexes).await?;
        info!("Created indexes on attendances collection");
        Ok(())
    }

    async fn insert_unique(&self, record: &AttendanceRecord) -> Result<bool> {
        match self.collection.insert_one(record).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<AttendanceRecord>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<AttendanceRecord>> {
        let cursor = self.collection
            .find(doc! { "userId": user_id })
            .with_options(Self::newest_first())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_user_in_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AttendanceRecord>> {
        let filter = doc! {
            "userId": user_id,
            "checkInDate": {
                "$gte": from.timestamp_millis(),
                "$lte": to.timestamp_millis(),
            },
        };

        let cursor = self.collection
            .find(filter)
            .with_options(Self::newest_first())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn complete_check_out(
        &self,
        id: &str,
        check_out: &CheckOut,
    ) -> Result<Option<AttendanceRecord>> {
        let filter = doc! {
            "_id": id,
            "status": AttendanceStatus::CheckedIn.as_str(),
        };
        let update = doc! {
            "$set": {
                "checkOutTime": check_out.check_out_time.timestamp_millis(),
                "checkOutDate": check_out.check_out_date.timestamp_millis(),
                "status": AttendanceStatus::CheckedOut.as_str(),
                "workMinutes": check_out.work_minutes,
                "workDuration": check_out.work_duration.as_str(),
                "updatedAt": check_out.updated_at.timestamp(),
            }
        };

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self.collection
            .find_one_and_update(filter, update)
            .with_options(options)
            .await?)
    }
}
