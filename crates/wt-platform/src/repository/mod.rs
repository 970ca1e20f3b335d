//! Repository Layer
//!
//! Storage traits with MongoDB and in-memory implementations.

pub mod attendance;
pub mod memory;
pub mod user;

pub use attendance::{AttendanceRepository, MongoAttendanceRepository};
pub use memory::{InMemoryAttendanceRepository, InMemoryUserRepository};
pub use user::{MongoUserRepository, UserRepository};

use mongodb::error::{ErrorKind, WriteFailure};

const DUPLICATE_KEY: i32 = 11000;

/// True when a write was rejected by a unique index
pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}
