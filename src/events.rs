//! Domain events published over NATS when a client is configured.
//! Publishing is fire-and-forget: a failed publish is logged, never
//! surfaced to the request.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::Order;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPlaced {
        order_id: Uuid,
        user_id: Uuid,
        grand_total: Decimal,
        item_count: usize,
    },
}

impl DomainEvent {
    pub fn order_placed(order: &Order) -> Self {
        Self::OrderPlaced {
            order_id: order.id,
            user_id: order.user_id,
            grand_total: order.grand_total,
            item_count: order.items.len(),
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "orders.placed",
        }
    }
}

pub async fn publish(client: &async_nats::Client, event: &DomainEvent) {
    let payload = match serde_json::to_vec(event) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(%err, "failed to serialize domain event");
            return;
        }
    };
    if let Err(err) = client.publish(event.subject().to_string(), payload.into()).await {
        tracing::warn!(%err, subject = event.subject(), "failed to publish domain event");
    }
}
