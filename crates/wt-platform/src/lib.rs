//! Worktime Platform
//!
//! Core platform providing:
//! - Account registration, password login and JWT access/refresh tokens
//! - A daily attendance ledger with check-in/check-out and work-time reports
//! - A user directory with profile-change propagation over the message channel
//! - File uploads backed by a blob store

pub mod api;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

pub use domain::*;
pub use error::{PlatformError, Result};
