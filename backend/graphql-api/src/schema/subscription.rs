//! GraphQL subscriptions
//!
//! Thin adapters from notification bus topics to the transport's long-lived
//! WebSocket streams. Each stream stays open until the client disconnects;
//! dropping it deregisters the broadcast receiver, so nothing leaks.

use std::sync::Arc;

use async_graphql::{Context, Subscription};
use futures_util::{Stream, StreamExt};
use uuid::Uuid;

use crate::bus::{NotificationBus, Topic, UserEvent};
use crate::schema::user::User;

#[derive(Default)]
pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    async fn user_created(&self, ctx: &Context<'_>) -> impl Stream<Item = User> {
        let bus = ctx.data_unchecked::<Arc<NotificationBus>>().clone();
        let stream = bus.subscribe(Topic::UserCreated).await;

        stream.filter_map(|event| async move {
            match event {
                Ok(UserEvent::Created(user)) => Some(user),
                // lagged receivers skip what they missed
                _ => None,
            }
        })
    }

    async fn user_updated(&self, ctx: &Context<'_>) -> impl Stream<Item = User> {
        let bus = ctx.data_unchecked::<Arc<NotificationBus>>().clone();
        let stream = bus.subscribe(Topic::UserUpdated).await;

        stream.filter_map(|event| async move {
            match event {
                Ok(UserEvent::Updated(user)) => Some(user),
                _ => None,
            }
        })
    }

    async fn user_deleted(&self, ctx: &Context<'_>) -> impl Stream<Item = Uuid> {
        let bus = ctx.data_unchecked::<Arc<NotificationBus>>().clone();
        let stream = bus.subscribe(Topic::UserDeleted).await;

        stream.filter_map(|event| async move {
            match event {
                Ok(UserEvent::Deleted(id)) => Some(id),
                _ => None,
            }
        })
    }
}
