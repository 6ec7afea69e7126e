//! In-memory user directory
//!
//! Used when no `DATABASE_URL` is configured, and by the test suite. Same
//! observable contract as the Postgres backend: lowercased unique emails,
//! affected-row counts from update/delete.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::UserDirectory;
use crate::error::{ApiError, Result};
use crate::models::{
    NewUser, NotificationRecord, OrderRecord, PaymentRecord, ProductRecord, UserChanges,
    UserRecord,
};

#[derive(Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<Uuid, UserRecord>>,
    products: RwLock<HashMap<Uuid, Vec<ProductRecord>>>,
    orders: RwLock<HashMap<Uuid, Vec<OrderRecord>>>,
    notifications: RwLock<HashMap<Uuid, Vec<NotificationRecord>>>,
    payments: RwLock<HashMap<Uuid, Vec<PaymentRecord>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_product(&self, product: ProductRecord) {
        let mut products = self.products.write().await;
        products.entry(product.user_id).or_default().push(product);
    }

    pub async fn add_order(&self, order: OrderRecord) {
        let mut orders = self.orders.write().await;
        orders.entry(order.user_id).or_default().push(order);
    }

    pub async fn add_notification(&self, notification: NotificationRecord) {
        let mut notifications = self.notifications.write().await;
        notifications
            .entry(notification.user_id)
            .or_default()
            .push(notification);
    }

    pub async fn add_payment(&self, payment: PaymentRecord) {
        let mut payments = self.payments.write().await;
        payments.entry(payment.user_id).or_default().push(payment);
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn create(&self, user: NewUser) -> Result<UserRecord> {
        let email = user.email.to_lowercase();
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == email) {
            return Err(ApiError::Validation("email already registered".to_string()));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: user.name,
            email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());

        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<UserRecord>> {
        let users = self.users.read().await;
        let mut all: Vec<UserRecord> = users.values().cloned().collect();
        all.sort_by_key(|u| u.created_at);
        Ok(all)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = email.to_lowercase();
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<u64> {
        let mut users = self.users.write().await;

        if !users.contains_key(&id) {
            return Ok(0);
        }

        // Emails stay unique across updates, same as on create
        if let Some(email) = &changes.email {
            let email = email.to_lowercase();
            if users.values().any(|u| u.id != id && u.email == email) {
                return Err(ApiError::Validation("email already registered".to_string()));
            }
        }

        match users.get_mut(&id) {
            Some(user) => {
                if let Some(name) = changes.name {
                    user.name = name;
                }
                if let Some(email) = changes.email {
                    user.email = email.to_lowercase();
                }
                user.updated_at = Utc::now();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        let mut users = self.users.write().await;
        Ok(users.remove(&id).map(|_| 1).unwrap_or(0))
    }

    async fn products_of(&self, user_id: Uuid) -> Result<Vec<ProductRecord>> {
        let products = self.products.read().await;
        Ok(products.get(&user_id).cloned().unwrap_or_default())
    }

    async fn orders_of(&self, user_id: Uuid) -> Result<Vec<OrderRecord>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&user_id).cloned().unwrap_or_default())
    }

    async fn notifications_of(&self, user_id: Uuid) -> Result<Vec<NotificationRecord>> {
        let notifications = self.notifications.read().await;
        Ok(notifications.get(&user_id).cloned().unwrap_or_default())
    }

    async fn payments_of(&self, user_id: Uuid) -> Result<Vec<PaymentRecord>> {
        let payments = self.payments.read().await;
        Ok(payments.get(&user_id).cloned().unwrap_or_default())
    }
}
