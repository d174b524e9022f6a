use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

use super::{check_ctx, CredentialStore};
use crate::context::RequestContext;
use crate::domain::{Email, User};
use crate::error::StoreError;

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    surname: String,
    is_recruiter: bool,
    password_hash: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            error!(user_id = %row.id, error = %e, "stored email failed validation");
            StoreError::Infra(anyhow::anyhow!("stored email for {} is invalid", row.id))
        })?;
        Ok(User::from_parts(
            row.id,
            email,
            row.name,
            row.surname,
            row.is_recruiter,
            row.password_hash,
        ))
    }
}

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn save(&self, ctx: &RequestContext, user: &User) -> Result<Uuid, StoreError> {
        check_ctx(ctx)?;
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (id, email, name, surname, is_recruiter, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(user.id)
        .bind(user.email.as_str())
        .bind(&user.name)
        .bind(&user.surname)
        .bind(user.is_recruiter)
        .bind(user.password_hash())
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<User, StoreError> {
        check_ctx(ctx)?;
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, name, surname, is_recruiter, password_hash
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)?;
        row.try_into()
    }

    async fn get_by_email(&self, ctx: &RequestContext, email: &str) -> Result<User, StoreError> {
        check_ctx(ctx)?;
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, name, surname, is_recruiter, password_hash
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)?;
        row.try_into()
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), StoreError> {
        check_ctx(ctx)?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
