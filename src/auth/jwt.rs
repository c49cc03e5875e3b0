use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::auth::claims::{TokenClaims, TokenPair};
use crate::config::JwtConfig;
use crate::error::AuthError;
use crate::users::model::User;

/// Signing and verification material for one token family.
#[derive(Clone)]
struct KeySet {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeySet {
    fn from_secret(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }
}

/// Two independent key sets: access and refresh tokens are signed with
/// different secrets, so one family never validates the other.
#[derive(Clone)]
pub struct JwtKeys {
    access: KeySet,
    refresh: KeySet,
}

impl JwtKeys {
    pub fn from_config(config: &JwtConfig) -> Self {
        Self {
            access: KeySet::from_secret(&config.access_secret, config.access_ttl_minutes),
            refresh: KeySet::from_secret(&config.refresh_secret, config.refresh_ttl_minutes),
        }
    }

    fn sign_with(&self, user: &User, keys: &KeySet) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + keys.ttl;
        let claims = TokenClaims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            is_authenticated: user.is_authenticated,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding)
            .map_err(anyhow::Error::from)?;
        Ok(token)
    }

    pub fn sign_access(&self, user: &User) -> Result<String, AuthError> {
        let token = self.sign_with(user, &self.access)?;
        debug!(user_id = %user.id, "access token signed");
        Ok(token)
    }

    pub fn sign_refresh(&self, user: &User) -> Result<String, AuthError> {
        let token = self.sign_with(user, &self.refresh)?;
        debug!(user_id = %user.id, "refresh token signed");
        Ok(token)
    }

    pub fn sign_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.sign_access(user)?,
            refresh_token: self.sign_refresh(user)?,
        })
    }

    fn verify_with(token: &str, keys: &KeySet) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::default();
        // A token must fail the moment its expiry passes.
        validation.leeway = 0;
        decode::<TokenClaims>(token, &keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::Unauthorized)
    }

    pub fn verify_access(&self, token: &str) -> Result<TokenClaims, AuthError> {
        Self::verify_with(token, &self.access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<TokenClaims, AuthError> {
        Self::verify_with(token, &self.refresh)
    }
}
