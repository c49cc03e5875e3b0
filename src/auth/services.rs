use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::auth::claims::TokenPair;
use crate::auth::jwt::JwtKeys;
use crate::auth::otp::{self, OtpAction};
use crate::auth::password::PasswordHasher;
use crate::error::AuthError;
use crate::mailer::Mailer;
use crate::users::model::{NewUser, Role, User};
use crate::users::store::UserStore;

/// Orchestrates registration, login, OTP challenges and token refresh
/// on top of the user store and the mail relay.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    keys: JwtKeys,
    hasher: PasswordHasher,
    otp_ttl: Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        keys: JwtKeys,
        hasher: PasswordHasher,
        otp_ttl: Duration,
    ) -> Self {
        Self {
            store,
            mailer,
            keys,
            hasher,
            otp_ttl,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    /// Create an account and sign its first token pair. Duplicate emails
    /// surface as `Conflict` from the store's unique constraint.
    pub async fn register(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let password_hash = self.hasher.hash(password)?;
        let user = self
            .store
            .insert(NewUser {
                email: email.to_string(),
                password_hash,
                role: Role::User,
            })
            .await?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        self.keys.sign_pair(&user)
    }

    /// Check credentials and sign a token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::NotFound)?;
        if !self.hasher.verify(password, &user.password_hash)? {
            warn!(email = %email, "login with wrong password");
            return Err(AuthError::Unauthorized);
        }
        info!(user_id = %user.id, "user logged in");
        self.keys.sign_pair(&user)
    }

    /// Issue a six digit code, store its hash on the account and email
    /// the plaintext to the user. A previous pending code is overwritten.
    pub async fn generate_otp(&self, email: &str, action: OtpAction) -> Result<(), AuthError> {
        let code = otp::generate_code();
        let otp_hash = self.hasher.hash(&code)?;
        let expires_at = OffsetDateTime::now_utc() + self.otp_ttl;

        if !self.store.set_otp(email, &otp_hash, expires_at).await? {
            warn!(email = %email, "otp requested for unknown email");
            return Err(AuthError::NotFound);
        }

        // The code is persisted before delivery; a failed send leaves
        // the challenge in place and the error goes to the caller.
        let body = action.email_body(&code, self.otp_ttl.whole_minutes());
        self.mailer
            .send(email, action.subject(), &body)
            .await
            .map_err(AuthError::Internal)?;

        info!(email = %email, action = ?action, "otp issued");
        Ok(())
    }

    /// Check a submitted code. On success the account becomes verified,
    /// the code is consumed and a fresh token pair is signed. A wrong
    /// code and an expired one fail identically.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<TokenPair, AuthError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::NotFound)?;
        let pending = user.otp.as_ref().ok_or(AuthError::Unauthorized)?;

        let expired = pending.is_expired(OffsetDateTime::now_utc());
        let code_matches = self.hasher.verify(code, &pending.hash)?;
        if expired || !code_matches {
            warn!(email = %email, "invalid or expired otp");
            return Err(AuthError::Unauthorized);
        }

        let user = self.store.mark_authenticated(user.id).await?;
        info!(user_id = %user.id, "email ownership verified");
        self.keys.sign_pair(&user)
    }

    /// Replace the password of a verified account. The caller must have
    /// completed an OTP verification at some point before.
    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<(), AuthError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::NotFound)?;
        if !user.is_authenticated {
            warn!(user_id = %user.id, "password reset before email verification");
            return Err(AuthError::Unauthorized);
        }
        let password_hash = self.hasher.hash(new_password)?;
        self.store.replace_password(user.id, &password_hash).await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    /// Mint a fresh access token from a refresh token. Claims are rebuilt
    /// from the current account state, not copied from the old token, and
    /// the refresh token itself is not rotated.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.keys.verify_refresh(refresh_token)?;
        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::NotFound)?;
        self.keys.sign_access(&user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        self.store.list().await
    }
}
