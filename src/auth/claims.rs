use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::model::Role;

/// JWT payload. Access and refresh tokens carry the same claims and
/// differ only by signing secret and lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,              // user ID
    pub email: String,
    pub role: Role,
    pub is_authenticated: bool, // email ownership proven
    pub iat: usize,             // issued at (unix timestamp)
    pub exp: usize,             // expires at (unix timestamp)
}

/// Access and refresh token issued together after register, login or a
/// successful OTP verification.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Identity attached to a request once its bearer token checks out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[serde(rename = "userId")]
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_authenticated: bool,
}

impl From<TokenClaims> for CurrentUser {
    fn from(claims: TokenClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
            is_authenticated: claims.is_authenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_user_serializes_with_camel_case_keys() {
        let user = CurrentUser {
            id: Uuid::new_v4(),
            email: "user@example.com".into(),
            role: Role::Moderator,
            is_authenticated: true,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"userId\""));
        assert!(json.contains("\"isAuthenticated\":true"));
        assert!(json.contains("\"moderator\""));
    }
}
