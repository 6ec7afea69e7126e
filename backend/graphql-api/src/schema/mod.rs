//! GraphQL schema: merged query/mutation roots plus WebSocket subscriptions

pub mod auth;
pub mod subscription;
pub mod user;

use std::sync::Arc;

use async_graphql::{MergedObject, Schema};

use crate::bus::NotificationBus;
use crate::db::UserDirectory;
use crate::security::TokenService;

/// Root query object
#[derive(MergedObject, Default)]
pub struct QueryRoot(auth::AuthQuery, user::UserQuery);

/// Root mutation object
#[derive(MergedObject, Default)]
pub struct MutationRoot(auth::AuthMutation, user::UserMutation);

pub type AppSchema = Schema<QueryRoot, MutationRoot, subscription::SubscriptionRoot>;

/// Build the schema with its collaborators injected as context data. The
/// bus and directory are constructed by the caller; nothing here is
/// process-global.
pub fn build_schema(
    directory: Arc<dyn UserDirectory>,
    bus: Arc<NotificationBus>,
    tokens: TokenService,
) -> AppSchema {
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        subscription::SubscriptionRoot::default(),
    )
    .data(directory)
    .data(bus)
    .data(tokens)
    .finish()
}
