use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthError;
use crate::users::model::{NewUser, PendingOtp, User};
use crate::users::store::UserStore;

/// In-memory `UserStore` for unit tests and local experiments. A single
/// lock serializes writers, so duplicate checks and OTP overwrites stay
/// atomic here as well.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop an account entirely. Test helper, not part of `UserStore`.
    pub fn remove(&self, id: Uuid) -> Option<User> {
        self.users.write().ok()?.remove(&id)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, User>>, AuthError> {
        self.users
            .read()
            .map_err(|_| AuthError::Internal(anyhow!("user store lock poisoned")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, User>>, AuthError> {
        self.users
            .write()
            .map_err(|_| AuthError::Internal(anyhow!("user store lock poisoned")))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.read()?.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, AuthError> {
        let mut users = self.write()?;
        if users.values().any(|u| u.email == new_user.email) {
            return Err(AuthError::Conflict);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            otp: None,
            is_authenticated: false,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_otp(
        &self,
        email: &str,
        otp_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<bool, AuthError> {
        let mut users = self.write()?;
        match users.values_mut().find(|u| u.email == email) {
            Some(user) => {
                user.otp = Some(PendingOtp {
                    hash: otp_hash.to_string(),
                    expires_at,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_authenticated(&self, id: Uuid) -> Result<User, AuthError> {
        let mut users = self.write()?;
        let user = users.get_mut(&id).ok_or(AuthError::NotFound)?;
        user.is_authenticated = true;
        user.otp = None;
        Ok(user.clone())
    }

    async fn replace_password(&self, id: Uuid, password_hash: &str) -> Result<(), AuthError> {
        let mut users = self.write()?;
        let user = users.get_mut(&id).ok_or(AuthError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.otp = None;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, AuthError> {
        let mut users: Vec<User> = self.read()?.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }
}
