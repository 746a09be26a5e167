//! Error taxonomy for the storefront core.
//!
//! Business-rule failures are expected, caller-recoverable conditions and
//! carry a human-readable message. [`Error::Storage`] is kept distinct so
//! the HTTP layer can return a generic response without leaking storage
//! internals.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("quantity must be a positive whole number")]
    InvalidQuantity,

    #[error("product not found")]
    ProductNotFound,

    #[error("product is not available for sale")]
    ProductInactive,

    #[error("a product in the cart no longer exists")]
    ProductVanished,

    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: u32, requested: u32 },

    #[error("product has no sale price")]
    PriceMissing,

    #[error("no open cart for this user")]
    CartNotOpen,

    #[error("product is not in the cart")]
    ItemNotInCart,

    #[error("no items selected for checkout")]
    NoItemsSelected,

    #[error("no principal shipping address on file")]
    NoPrincipalAddress,

    #[error("malformed identifier")]
    InvalidIdentifier,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;
