//! Shared fixtures for the test suite.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Inventory, Product, ProductStatus, ShippingAddress, Unit};

/// An active product with the given price and stock.
pub(crate) fn product(price: i64, stock: u32) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        name: format!("product-{price}"),
        description: "test product".into(),
        brand: "Acme".into(),
        unit: Unit::Each,
        sku: String::new(),
        barcode: String::new(),
        image_url: String::new(),
        status: ProductStatus::Active,
        inventory: Inventory {
            stock,
            min_stock: 0,
            price: Some(Decimal::from(price)),
        },
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn address(user_id: Uuid, principal: bool) -> ShippingAddress {
    ShippingAddress {
        id: Uuid::new_v4(),
        user_id,
        contact_name: "Ana María".into(),
        contact_phone: "3001234567".into(),
        city: "Bogotá".into(),
        neighborhood: "Chapinero".into(),
        complement: "Apto 301".into(),
        principal,
        created_at: Utc::now(),
    }
}
