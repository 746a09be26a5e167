//! Order document. Immutable once created; status transitions belong to a
//! fulfillment subsystem, not to this crate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::address::AddressSnapshot;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub grand_total: Decimal,
    pub delivery: DeliveryMethod,
    pub payment: PaymentMethod,
    /// Copied by value at order time; later address-book edits never alter it.
    pub shipping_address: AddressSnapshot,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    /// Live unit price at order time, not the cart snapshot.
    pub unit_price: Decimal,
    pub line_subtotal: Decimal,
}

impl Order {
    /// Freezes validated order lines into a pending order. The subtotal is
    /// accumulated in line order with a single accumulator so totals are
    /// reproducible.
    pub fn place(
        user_id: Uuid,
        items: Vec<OrderItem>,
        delivery: DeliveryMethod,
        payment: PaymentMethod,
        shipping_cost: Decimal,
        shipping_address: AddressSnapshot,
    ) -> Self {
        let mut subtotal = Decimal::ZERO;
        for item in &items {
            subtotal += item.line_subtotal;
        }
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: OrderStatus::Pending,
            items,
            subtotal,
            grand_total: subtotal + shipping_cost,
            shipping_cost,
            delivery,
            payment,
            shipping_address,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    #[default]
    HomeDelivery,
    StorePickup,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HomeDelivery => "home_delivery",
            Self::StorePickup => "store_pickup",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "home_delivery" => Some(Self::HomeDelivery),
            "store_pickup" => Some(Self::StorePickup),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Transfer => "transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(Self::Cash),
            "card" => Some(Self::Card),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }
}
