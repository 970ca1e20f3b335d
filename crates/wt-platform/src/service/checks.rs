//! Authorization checks applied by API handlers

use crate::domain::Role;
use crate::error::{PlatformError, Result};
use crate::service::TokenClaims;

/// Identity of the caller, resolved from a verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub role: Role,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<TokenClaims> for AuthContext {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.id,
            role: claims.role,
        }
    }
}

pub fn require_admin(ctx: &AuthContext) -> Result<()> {
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(PlatformError::forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_admin() {
        let admin = AuthContext { user_id: "a".to_string(), role: Role::Admin };
        let employee = AuthContext { user_id: "e".to_string(), role: Role::Employee };

        assert!(require_admin(&admin).is_ok());
        let err = require_admin(&employee).unwrap_err();
        assert_eq!(err.to_string(), "Forbidden");
    }
}
