//! Storage abstraction.
//!
//! The store is an explicitly constructed dependency injected into the
//! engines, never a hidden process-wide global. [`PgStore`] is the
//! production backend; [`MemoryStore`] backs the tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Cart, Order, Product, ShippingAddress};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt document: {0}")]
    Corrupt(String),
}

/// Persistence contract over the four collections.
///
/// Every method is a single-document read or write; the backend must make
/// each individual write atomic (one row / one document). The only
/// conditional operation is [`Store::decrement_stock`], which must apply
/// the decrement atomically and only while enough stock remains.
#[async_trait]
pub trait Store: Send + Sync {
    // Products
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    async fn list_products(&self, only_active: bool) -> Result<Vec<Product>, StoreError>;
    /// Replaces the product document. Returns false when the id is unknown.
    async fn update_product(&self, product: &Product) -> Result<bool, StoreError>;
    async fn delete_product(&self, id: Uuid) -> Result<bool, StoreError>;
    /// Atomically subtracts `quantity` from stock, but only while
    /// `stock >= quantity`. Returns false when the condition failed.
    async fn decrement_stock(&self, id: Uuid, quantity: u32) -> Result<bool, StoreError>;

    // Carts
    async fn open_cart(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError>;
    async fn insert_cart(&self, cart: &Cart) -> Result<(), StoreError>;
    /// Whole-document replace of an existing cart. Errors with
    /// [`StoreError::Corrupt`] when the cart row no longer exists.
    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError>;

    // Orders
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;
    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError>;

    // Addresses
    async fn insert_address(&self, address: &ShippingAddress) -> Result<(), StoreError>;
    /// Single address lookup, scoped to its owner.
    async fn address(&self, user_id: Uuid, id: Uuid) -> Result<Option<ShippingAddress>, StoreError>;
    async fn addresses_for_user(&self, user_id: Uuid) -> Result<Vec<ShippingAddress>, StoreError>;
    /// Updates the mutable fields of an address (`created_at` is preserved).
    async fn update_address(&self, address: &ShippingAddress) -> Result<bool, StoreError>;
    async fn delete_address(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError>;
    /// Marks one address principal and demotes every other address of the
    /// same user. Returns false when the address is unknown.
    async fn set_principal_address(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError>;
    async fn principal_address(&self, user_id: Uuid) -> Result<Option<ShippingAddress>, StoreError>;
}
