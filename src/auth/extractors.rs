use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::auth::claims::CurrentUser;
use crate::error::AuthError;

/// Lets handlers take `CurrentUser` as an argument. The identity is the
/// one the `authenticate` middleware attached; on routes without that
/// layer the extractor rejects with `Unauthorized`.
#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::model::Role;
    use uuid::Uuid;

    fn identity() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "user@example.com".into(),
            role: Role::User,
            is_authenticated: false,
        }
    }

    #[tokio::test]
    async fn extracts_identity_from_extensions() {
        let user = identity();
        let request = axum::http::Request::builder()
            .uri("/auth/me")
            .extension(user.clone())
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let extracted = CurrentUser::from_request_parts(&mut parts, &())
            .await
            .expect("identity present");
        assert_eq!(extracted.id, user.id);
        assert_eq!(extracted.email, user.email);
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let request = axum::http::Request::builder()
            .uri("/auth/me")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let err = CurrentUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }
}
