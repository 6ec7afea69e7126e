//! Postgres-backed user directory

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::UserDirectory;
use crate::error::{ApiError, Result};
use crate::models::{
    NewUser, NotificationRecord, OrderRecord, PaymentRecord, ProductRecord, UserChanges,
    UserRecord,
};

pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn create(&self, user: NewUser) -> Result<UserRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let created = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&user.name)
        .bind(user.email.to_lowercase())
        .bind(&user.password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Validation("email already registered".to_string())
            }
            _ => ApiError::Database(e),
        })?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_all(&self) -> Result<Vec<UserRecord>> {
        Ok(sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<u64> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                email = COALESCE($2, email),
                updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(changes.name)
        .bind(changes.email.map(|e| e.to_lowercase()))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Validation("email already registered".to_string())
            }
            _ => ApiError::Database(e),
        })?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn products_of(&self, user_id: Uuid) -> Result<Vec<ProductRecord>> {
        Ok(sqlx::query_as::<_, ProductRecord>(
            "SELECT id, user_id, name, price FROM products WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn orders_of(&self, user_id: Uuid) -> Result<Vec<OrderRecord>> {
        Ok(sqlx::query_as::<_, OrderRecord>(
            "SELECT id, user_id, total, created_at FROM orders WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn notifications_of(&self, user_id: Uuid) -> Result<Vec<NotificationRecord>> {
        Ok(sqlx::query_as::<_, NotificationRecord>(
            "SELECT id, user_id, message, created_at FROM notifications WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn payments_of(&self, user_id: Uuid) -> Result<Vec<PaymentRecord>> {
        Ok(sqlx::query_as::<_, PaymentRecord>(
            "SELECT id, user_id, amount, created_at FROM payments WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
