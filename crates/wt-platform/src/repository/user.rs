//! User Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use tracing::info;

use crate::domain::{ProfileUpdate, User};
use crate::error::Result;
use crate::repository::is_duplicate_key;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn ensure_indexes(&self) -> Result<()>;

    /// Insert a new user. Returns `false` when the email is already taken.
    async fn insert(&self, user: &User) -> Result<bool>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_all(&self) -> Result<Vec<User>>;

    /// Returns `false` when no user has this id
    async fn update_password(
        &self,
        id: &str,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Replace the self-service profile fields and return the stored user
    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<User>>;
}

pub struct MongoUserRepository {
    collection: Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn ensure_indexes(&self) -> Result<()> {
        let indexes = vec![IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("uniq_email".to_string())
                    .unique(true)
                    .build(),
            )
            .build()];

        self.collection.create_indexes(indexes).await?;
        info!("Created indexes on users collection");
        Ok(())
    }

    async fn insert(&self, user: &User) -> Result<bool> {
        match self.collection.insert_one(user).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.collection.find_one(doc! { "email": email }).await?)
    }

    async fn find_all(&self) -> Result<Vec<User>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1 })
            .build();

        let cursor = self.collection
            .find(doc! {})
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_password(
        &self,
        id: &str,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = self.collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "password": password_hash, "updatedAt": updated_at.timestamp() } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let mut set = doc! { "updatedAt": updated_at.timestamp() };
        let mut unset = Document::new();
        for (field, value) in [
            ("position", &update.position),
            ("phoneNumber", &update.phone_number),
            ("imageUrl", &update.image_url),
        ] {
            match value {
                Some(v) => set.insert(field, v.as_str()),
                None => unset.insert(field, ""),
            };
        }

        let mut changes = doc! { "$set": set };
        if !unset.is_empty() {
            changes.insert("$unset", unset);
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self.collection
            .find_one_and_update(doc! { "_id": id }, changes)
            .with_options(options)
            .await?)
    }
}
