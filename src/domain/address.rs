//! Shipping address book entries and the frozen snapshot orders carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub contact_name: String,
    pub contact_phone: String,
    pub city: String,
    pub neighborhood: String,
    pub complement: String,
    /// The designated default shipping address; at most one per user.
    pub principal: bool,
    pub created_at: DateTime<Utc>,
}

impl ShippingAddress {
    pub fn snapshot(&self) -> AddressSnapshot {
        AddressSnapshot {
            contact_name: self.contact_name.clone(),
            contact_phone: self.contact_phone.clone(),
            city: self.city.clone(),
            neighborhood: self.neighborhood.clone(),
            complement: self.complement.clone(),
        }
    }
}

/// Display fields of an address, copied by value into an order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub contact_name: String,
    pub contact_phone: String,
    pub city: String,
    pub neighborhood: String,
    pub complement: String,
}
