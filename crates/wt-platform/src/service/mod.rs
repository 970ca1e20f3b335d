//! Service Layer
//!
//! Business logic over the repositories: tokens, authentication, the
//! attendance ledger, reports, the user directory, profile-change
//! propagation and blob storage.

pub mod attendance;
pub mod auth;
pub mod blob;
pub mod checks;
pub mod clock;
pub mod notifier;
pub mod password;
pub mod profile_consumer;
pub mod report;
pub mod token;
pub mod users;

pub use attendance::AttendanceService;
pub use auth::{is_email_valid, AuthService, AuthSession, RegisterInput};
pub use blob::{validate_filename, BlobStore, LocalDiskBlobStore, StoredBlob};
pub use checks::AuthContext;
pub use clock::{Clock, FixedClock, SystemClock};
pub use notifier::ProfileChangeNotifier;
pub use password::{Argon2Config, PasswordService};
pub use profile_consumer::ProfileChangeHandler;
pub use report::{ReportService, WorkReport};
pub use token::{
    extract_bearer_token, TokenClaims, TokenConfig, TokenError, TokenKind, TokenPair,
    TokenPayload, TokenService,
};
pub use users::UserService;
