//! User schema and CRUD resolvers
//!
//! Mutations publish a matching event on the notification bus so live
//! subscribers hear about every change.

use std::sync::Arc;

use async_graphql::{
    ComplexObject, Context, ErrorExtensions, InputObject, Object, Result as GraphQLResult,
    ResultExt, SimpleObject,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bus::{NotificationBus, Topic, UserEvent};
use crate::db::UserDirectory;
use crate::error::ApiError;
use crate::models::{
    NewUser, NotificationRecord, OrderRecord, PaymentRecord, ProductRecord, UserChanges,
    UserRecord,
};
use crate::security::hash_password;

/// Public user shape. This is what crosses the wire and what session tokens
/// embed; it never carries the password hash.
#[derive(SimpleObject, Debug, Clone, Serialize, Deserialize)]
#[graphql(complex)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            email: record.email,
        }
    }
}

#[ComplexObject]
impl User {
    async fn products(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<Product>> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        let records = directory.products_of(self.id).await.extend()?;
        Ok(records.into_iter().map(Product::from).collect())
    }

    async fn orders(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<Order>> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        let records = directory.orders_of(self.id).await.extend()?;
        Ok(records.into_iter().map(Order::from).collect())
    }

    async fn notifications(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<Notification>> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        let records = directory.notifications_of(self.id).await.extend()?;
        Ok(records.into_iter().map(Notification::from).collect())
    }

    async fn payments(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<Payment>> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        let records = directory.payments_of(self.id).await.extend()?;
        Ok(records.into_iter().map(Payment::from).collect())
    }
}

#[derive(SimpleObject, Debug, Clone, Serialize, Deserialize)]
#[graphql(complex)]
pub struct Product {
    pub id: Uuid,
    #[graphql(skip)]
    pub user_id: Uuid,
    pub name: String,
    pub price: f64,
}

impl From<ProductRecord> for Product {
    fn from(record: ProductRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            name: record.name,
            price: record.price,
        }
    }
}

#[ComplexObject]
impl Product {
    /// Back-reference to the owning user.
    async fn user(&self, ctx: &Context<'_>) -> GraphQLResult<Option<User>> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        Ok(directory
            .find_by_id(self.user_id)
            .await
            .extend()?
            .map(User::from))
    }
}

#[derive(SimpleObject, Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub total: f64,
    pub created_at: DateTime<Utc>,
}

impl From<OrderRecord> for Order {
    fn from(record: OrderRecord) -> Self {
        Self {
            id: record.id,
            total: record.total,
            created_at: record.created_at,
        }
    }
}

#[derive(SimpleObject, Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRecord> for Notification {
    fn from(record: NotificationRecord) -> Self {
        Self {
            id: record.id,
            message: record.message,
            created_at: record.created_at,
        }
    }
}

#[derive(SimpleObject, Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentRecord> for Payment {
    fn from(record: PaymentRecord) -> Self {
        Self {
            id: record.id,
            amount: record.amount,
            created_at: record.created_at,
        }
    }
}

#[derive(InputObject, Debug)]
pub struct CreateUserInput {
    pub name: String,
    #[graphql(validator(email))]
    pub email: String,
    #[graphql(secret, validator(min_length = 8))]
    pub password: String,
}

#[derive(InputObject, Debug)]
pub struct UpdateUserInput {
    pub id: Uuid,
    pub name: Option<String>,
    #[graphql(validator(email))]
    pub email: Option<String>,
}

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// Read misses resolve to null rather than an error.
    async fn get_user(&self, ctx: &Context<'_>, id: Uuid) -> GraphQLResult<Option<User>> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        Ok(directory.find_by_id(id).await.extend()?.map(User::from))
    }

    async fn get_users(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<User>> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        let records = directory.find_all().await.extend()?;
        Ok(records.into_iter().map(User::from).collect())
    }
}

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        input: CreateUserInput,
    ) -> GraphQLResult<User> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        let bus = ctx.data::<Arc<NotificationBus>>()?;

        let record = directory
            .create(NewUser {
                name: input.name,
                email: input.email,
                password_hash: hash_password(&input.password).extend()?,
            })
            .await
            .extend()?;

        let user = User::from(record);
        bus.publish(Topic::UserCreated, UserEvent::Created(user.clone()))
            .await;

        Ok(user)
    }

    /// Returns the updated entity, re-fetched after the write.
    async fn update_user(
        &self,
        ctx: &Context<'_>,
        input: UpdateUserInput,
    ) -> GraphQLResult<User> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        let bus = ctx.data::<Arc<NotificationBus>>()?;

        let affected = directory
            .update(
                input.id,
                UserChanges {
                    name: input.name,
                    email: input.email,
                },
            )
            .await
            .extend()?;
        if affected == 0 {
            return Err(
                ApiError::NotFound(format!("user {} does not exist", input.id)).extend(),
            );
        }

        let record = directory
            .find_by_id(input.id)
            .await
            .extend()?
            .ok_or_else(|| {
                ApiError::NotFound(format!("user {} does not exist", input.id)).extend()
            })?;

        let user = User::from(record);
        bus.publish(Topic::UserUpdated, UserEvent::Updated(user.clone()))
            .await;

        Ok(user)
    }

    /// Idempotent: deleting a missing user succeeds and returns false.
    async fn delete_user(&self, ctx: &Context<'_>, id: Uuid) -> GraphQLResult<bool> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        let bus = ctx.data::<Arc<NotificationBus>>()?;

        let affected = directory.delete(id).await.extend()?;
        if affected > 0 {
            bus.publish(Topic::UserDeleted, UserEvent::Deleted(id)).await;
        }

        Ok(affected > 0)
    }
}
