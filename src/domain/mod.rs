//! Typed documents for the four persisted collections.

pub mod address;
pub mod cart;
pub mod order;
pub mod product;

pub use address::{AddressSnapshot, ShippingAddress};
pub use cart::{Cart, CartItem, CartState};
pub use order::{DeliveryMethod, Order, OrderItem, OrderStatus, PaymentMethod};
pub use product::{Inventory, Product, ProductStatus, Unit};

use uuid::Uuid;

/// Parses an opaque id received from the outside (form fields, JSON bodies).
pub fn parse_id(raw: &str) -> crate::Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| crate::Error::InvalidIdentifier)
}
