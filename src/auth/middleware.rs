use axum::extract::{FromRef, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::auth::claims::CurrentUser;
use crate::auth::jwt::JwtKeys;
use crate::error::AuthError;
use crate::state::AppState;
use crate::users::model::Role;

/// Roles allowed through `require_admin`.
const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Verify the bearer token and attach the caller's identity to the
/// request extensions for downstream layers and handlers.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let keys = JwtKeys::from_ref(&state);
    let user = bearer_identity(request.headers(), &keys)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Reject callers whose role is not `admin`. Runs after `authenticate`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AuthError> {
    permit_roles(&request, ADMIN_ONLY)?;
    Ok(next.run(request).await)
}

/// Resolve the caller from the `Authorization` header.
pub fn bearer_identity(headers: &HeaderMap, keys: &JwtKeys) -> Result<CurrentUser, AuthError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    let token = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .ok_or(AuthError::Unauthorized)?;

    let claims = match keys.verify_access(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!("invalid or expired access token");
            return Err(e);
        }
    };
    Ok(CurrentUser::from(claims))
}

/// Check the identity on the request against a set of permitted roles.
/// An empty set admits any authenticated caller.
pub fn permit_roles(request: &Request, allowed: &[Role]) -> Result<(), AuthError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AuthError::Unauthorized)?;
    if allowed.is_empty() || allowed.contains(&user.role) {
        Ok(())
    } else {
        warn!(email = %user.email, role = ?user.role, "role not permitted");
        Err(AuthError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::users::model::User;
    use axum::body::Body;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            access_secret: "access-test-secret".into(),
            refresh_secret: "refresh-test-secret".into(),
            access_ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    fn sample_user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: "user@example.com".into(),
            password_hash: "irrelevant".into(),
            role,
            otp: None,
            is_authenticated: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn bearer_identity_accepts_valid_token() {
        let keys = make_keys();
        let user = sample_user(Role::User);
        let token = keys.sign_access(&user).expect("sign");

        let identity =
            bearer_identity(&headers_with(&format!("Bearer {}", token)), &keys).expect("identity");
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.email, user.email);
    }

    #[test]
    fn bearer_identity_accepts_lowercase_scheme() {
        let keys = make_keys();
        let token = keys.sign_access(&sample_user(Role::User)).expect("sign");
        bearer_identity(&headers_with(&format!("bearer {}", token)), &keys).expect("identity");
    }

    #[test]
    fn bearer_identity_rejects_missing_header() {
        let err = bearer_identity(&HeaderMap::new(), &make_keys()).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[test]
    fn bearer_identity_rejects_wrong_scheme() {
        let err = bearer_identity(&headers_with("Token abc"), &make_keys()).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[test]
    fn bearer_identity_rejects_refresh_token() {
        let keys = make_keys();
        let token = keys.sign_refresh(&sample_user(Role::User)).expect("sign");
        let err = bearer_identity(&headers_with(&format!("Bearer {}", token)), &keys).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    fn request_with_identity(role: Role) -> Request {
        let identity = CurrentUser {
            id: Uuid::new_v4(),
            email: "user@example.com".into(),
            role,
            is_authenticated: true,
        };
        axum::http::Request::builder()
            .uri("/auth/users")
            .extension(identity)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn permit_roles_allows_listed_role() {
        let request = request_with_identity(Role::Admin);
        permit_roles(&request, &[Role::Admin]).expect("admin allowed");
    }

    #[test]
    fn permit_roles_forbids_unlisted_role() {
        let request = request_with_identity(Role::User);
        let err = permit_roles(&request, &[Role::Admin, Role::Moderator]).unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));
    }

    #[test]
    fn permit_roles_with_empty_set_allows_any_identity() {
        let request = request_with_identity(Role::User);
        permit_roles(&request, &[]).expect("any authenticated caller");
    }

    #[test]
    fn permit_roles_without_identity_is_unauthorized() {
        let request = axum::http::Request::builder()
            .uri("/auth/users")
            .body(Body::empty())
            .unwrap();
        let err = permit_roles(&request, &[Role::Admin]).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }
}
