//! Storefront backend.
//!
//! The core of the crate is the cart-to-order consistency engine:
//! - [`cart::CartEngine`] owns a user's single open cart, recomputes its
//!   snapshot totals on every mutation and validates against the catalog;
//! - [`checkout::CheckoutEngine`] re-validates the selected lines against
//!   the **live** catalog, freezes them into an immutable order, decrements
//!   stock and closes the cart.
//!
//! Everything persisted goes through the injected [`store::Store`]
//! abstraction; [`api`] is a thin axum layer on top.

pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod domain;
pub mod error;
pub mod events;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use cart::{CartEngine, CartView};
pub use catalog::{Catalog, ProductDraft};
pub use checkout::CheckoutEngine;
pub use error::{Error, Result};
pub use store::{MemoryStore, PgStore, Store, StoreError};
