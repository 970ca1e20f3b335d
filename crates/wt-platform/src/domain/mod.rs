//! Domain Models
//!
//! Users and their attendance records as stored in MongoDB.

pub mod attendance;
pub mod user;

pub use attendance::*;
pub use user::*;
