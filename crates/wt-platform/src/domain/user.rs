//! User Entity
//!
//! Identity record for employees and administrators.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use wt_common::ProfileChangeEvent;

/// Access role. Only two roles exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Employee,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "employee" => Ok(Role::Employee),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Stored user document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,

    pub fullname: String,

    /// Lowercased, unique
    pub email: String,

    /// Argon2 PHC string
    pub password: String,

    #[serde(default)]
    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        fullname: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            fullname: fullname.into(),
            email: email.into(),
            password: password_hash.into(),
            role,
            position: None,
            phone_number: None,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshot published on the profile-change topic
    pub fn to_profile_event(&self, issued_at: DateTime<Utc>) -> ProfileChangeEvent {
        ProfileChangeEvent {
            id: self.id.clone(),
            fullname: self.fullname.clone(),
            email: self.email.clone(),
            position: self.position.clone(),
            phone_number: self.phone_number.clone(),
            image_url: self.image_url.clone(),
            role: self.role.to_string(),
            created_at: self.created_at.timestamp(),
            updated_at: self.updated_at.timestamp(),
            mq_issued_at: issued_at,
        }
    }
}

/// Replacement values for the self-service profile fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub position: Option<String>,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
}
