use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthError;
use crate::users::model::{NewUser, PendingOtp, Role, User};

/// Persistence surface for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Insert a new account. Fails with `Conflict` when the email is taken.
    async fn insert(&self, new_user: NewUser) -> Result<User, AuthError>;

    /// Attach a hashed one-time code to the account with the given email,
    /// overwriting any pending one. Returns `false` when no account matches.
    async fn set_otp(
        &self,
        email: &str,
        otp_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<bool, AuthError>;

    /// Mark the account as verified and clear any pending code.
    async fn mark_authenticated(&self, id: Uuid) -> Result<User, AuthError>;

    /// Swap the password hash and clear any pending code.
    async fn replace_password(&self, id: Uuid, password_hash: &str) -> Result<(), AuthError>;

    async fn list(&self) -> Result<Vec<User>, AuthError>;
}

/// Postgres-backed store. Uniqueness and atomic OTP overwrite are
/// enforced by the schema and single-statement updates.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Raw row shape; `role` stays TEXT in the database.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    otp_hash: Option<String>,
    otp_expires_at: Option<OffsetDateTime>,
    is_authenticated: bool,
    created_at: OffsetDateTime,
}

impl UserRow {
    fn into_user(self) -> Result<User, AuthError> {
        let role: Role = self.role.parse()?;
        let otp = match (self.otp_hash, self.otp_expires_at) {
            (Some(hash), Some(expires_at)) => Some(PendingOtp { hash, expires_at }),
            _ => None,
        };
        Ok(User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            role,
            otp,
            is_authenticated: self.is_authenticated,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, otp_hash, otp_expires_at, is_authenticated, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, otp_hash, otp_expires_at, is_authenticated, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, role, otp_hash, otp_expires_at, is_authenticated, created_at
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                AuthError::Conflict
            } else {
                AuthError::Database(e)
            }
        })?;
        row.into_user()
    }

    async fn set_otp(
        &self,
        email: &str,
        otp_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET otp_hash = $2, otp_expires_at = $3
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(otp_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_authenticated(&self, id: Uuid) -> Result<User, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET is_authenticated = TRUE, otp_hash = NULL, otp_expires_at = NULL
            WHERE id = $1
            RETURNING id, email, password_hash, role, otp_hash, otp_expires_at, is_authenticated, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AuthError::NotFound)?;
        row.into_user()
    }

    async fn replace_password(&self, id: Uuid, password_hash: &str) -> Result<(), AuthError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, otp_hash = NULL, otp_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, AuthError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, otp_hash, otp_expires_at, is_authenticated, created_at
            FROM users
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(UserRow::into_user).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            email: "user@example.com".into(),
            password_hash: "hash".into(),
            role: "admin".into(),
            otp_hash: None,
            otp_expires_at: None,
            is_authenticated: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn row_maps_role_and_missing_otp() {
        let user = sample_row().into_user().expect("valid row");
        assert_eq!(user.role, Role::Admin);
        assert!(user.otp.is_none());
    }

    #[test]
    fn row_maps_pending_otp_when_both_columns_set() {
        let mut row = sample_row();
        let deadline = OffsetDateTime::now_utc();
        row.otp_hash = Some("otp-hash".into());
        row.otp_expires_at = Some(deadline);
        let user = row.into_user().expect("valid row");
        let otp = user.otp.expect("pending otp");
        assert_eq!(otp.hash, "otp-hash");
        assert_eq!(otp.expires_at, deadline);
    }

    #[test]
    fn row_with_unknown_role_fails() {
        let mut row = sample_row();
        row.role = "root".into();
        assert!(row.into_user().is_err());
    }
}
