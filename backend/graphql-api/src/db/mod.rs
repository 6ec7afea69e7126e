//! User directory - persistence abstraction consumed by the resolvers
//!
//! The directory is an external collaborator: resolvers only see the
//! [`UserDirectory`] trait. [`postgres::PgDirectory`] backs it with sqlx in
//! production; [`memory::MemoryDirectory`] backs it when no `DATABASE_URL`
//! is configured and in tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    NewUser, NotificationRecord, OrderRecord, PaymentRecord, ProductRecord, UserChanges,
    UserRecord,
};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a new user. Fails with a validation error when the email is
    /// already registered.
    async fn create(&self, user: NewUser) -> Result<UserRecord>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    async fn find_all(&self) -> Result<Vec<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Apply `changes` to the user row, returning the number of affected
    /// rows (0 when the id does not exist).
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<u64>;

    /// Delete the user row, returning the number of affected rows (0 when
    /// the id does not exist).
    async fn delete(&self, id: Uuid) -> Result<u64>;

    // Per-user relation loads backing the User object's list fields.

    async fn products_of(&self, user_id: Uuid) -> Result<Vec<ProductRecord>>;

    async fn orders_of(&self, user_id: Uuid) -> Result<Vec<OrderRecord>>;

    async fn notifications_of(&self, user_id: Uuid) -> Result<Vec<NotificationRecord>>;

    async fn payments_of(&self, user_id: Uuid) -> Result<Vec<PaymentRecord>>;
}
