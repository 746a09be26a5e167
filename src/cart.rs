//! Cart engine: owns a user's single open cart and keeps its derived
//! totals consistent with every mutation.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{parse_id, Cart, CartItem, Product};
use crate::error::{Error, Result};
use crate::store::Store;

#[derive(Clone)]
pub struct CartEngine {
    store: Arc<dyn Store>,
}

/// The open cart enriched with live catalog data, for display.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub cart: Cart,
    pub lines: Vec<LineView>,
    /// True when a selected line's price snapshot no longer matches the
    /// live price.
    pub any_selected_price_changed: bool,
    /// True when a selected line's product is at or below its minimum stock.
    pub any_selected_low_stock: bool,
}

#[derive(Debug, Serialize)]
pub struct LineView {
    #[serde(flatten)]
    pub item: CartItem,
    pub live_price: Option<Decimal>,
    pub price_changed: bool,
    pub live_stock: Option<u32>,
    pub low_stock: bool,
}

impl CartEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Returns the user's open cart, creating an empty one if none exists.
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<Cart> {
        if let Some(cart) = self.store.open_cart(user_id).await? {
            return Ok(cart);
        }
        let cart = Cart::new(user_id);
        self.store.insert_cart(&cart).await?;
        tracing::debug!(user_id = %user_id, cart_id = %cart.id, "created open cart");
        Ok(cart)
    }

    /// Adds `quantity` units of a product to the cart, summing with any
    /// existing line. Creates the cart if the user has none.
    pub async fn add_or_update_item(
        &self,
        user_id: Uuid,
        product_id: &str,
        quantity: i64,
    ) -> Result<Cart> {
        let requested = positive_quantity(quantity)?;
        let product_id = parse_id(product_id)?;

        let product = self
            .store
            .product(product_id)
            .await?
            .ok_or(Error::ProductNotFound)?;
        if !product.is_active() {
            return Err(Error::ProductInactive);
        }

        let mut cart = self.get_or_create(user_id).await?;
        let existing = cart.line(product_id).map(|l| l.quantity).unwrap_or(0);
        let target = existing.saturating_add(requested);
        let price = validate_line(&product, target)?;

        cart.upsert_line(&product, target, price);
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Replaces a line's quantity. Quantity zero removes the line entirely;
    /// any other value is revalidated against live stock and price exactly
    /// like an add. Never creates a cart.
    pub async fn set_item_quantity(
        &self,
        user_id: Uuid,
        product_id: &str,
        quantity: i64,
    ) -> Result<Cart> {
        if quantity < 0 {
            return Err(Error::InvalidQuantity);
        }
        let product_id = parse_id(product_id)?;
        let mut cart = self
            .store
            .open_cart(user_id)
            .await?
            .ok_or(Error::CartNotOpen)?;
        if cart.line(product_id).is_none() {
            return Err(Error::ItemNotInCart);
        }

        if quantity == 0 {
            cart.remove_line(product_id);
        } else {
            let new_quantity = positive_quantity(quantity)?;
            let product = self
                .store
                .product(product_id)
                .await?
                .ok_or(Error::ProductNotFound)?;
            if !product.is_active() {
                return Err(Error::ProductInactive);
            }
            let price = validate_line(&product, new_quantity)?;
            cart.set_line_quantity(product_id, new_quantity, price);
        }

        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Toggles a line's selection flag. No stock or price revalidation.
    pub async fn set_item_selection(
        &self,
        user_id: Uuid,
        product_id: &str,
        selected: bool,
    ) -> Result<Cart> {
        let product_id = parse_id(product_id)?;
        let mut cart = self
            .store
            .open_cart(user_id)
            .await?
            .ok_or(Error::CartNotOpen)?;
        if !cart.set_line_selected(product_id, selected) {
            return Err(Error::ItemNotInCart);
        }
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    /// The open cart with each line annotated with the live price and stock,
    /// surfacing snapshot divergence to the caller instead of resolving it.
    pub async fn overview(&self, user_id: Uuid) -> Result<CartView> {
        let cart = self.get_or_create(user_id).await?;
        let mut lines = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let live = self.store.product(item.product_id).await?;
            let live_price = live.as_ref().and_then(Product::sale_price);
            let price_changed = live_price.is_some_and(|p| p != item.unit_price);
            let live_stock = live.as_ref().map(|p| p.inventory.stock);
            let low_stock = live.as_ref().is_some_and(|p| p.inventory.low_stock());
            lines.push(LineView {
                item: item.clone(),
                live_price,
                price_changed,
                live_stock,
                low_stock,
            });
        }
        let any_selected_price_changed = lines.iter().any(|l| l.item.selected && l.price_changed);
        let any_selected_low_stock = lines.iter().any(|l| l.item.selected && l.low_stock);
        Ok(CartView {
            cart,
            lines,
            any_selected_price_changed,
            any_selected_low_stock,
        })
    }
}

fn positive_quantity(quantity: i64) -> Result<u32> {
    if quantity <= 0 {
        return Err(Error::InvalidQuantity);
    }
    u32::try_from(quantity).map_err(|_| Error::InvalidQuantity)
}

/// Stock and price checks shared by add and set-quantity.
fn validate_line(product: &Product, target: u32) -> Result<Decimal> {
    if target > product.inventory.stock {
        return Err(Error::InsufficientStock {
            available: product.inventory.stock,
            requested: target,
        });
    }
    product.sale_price().ok_or(Error::PriceMissing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProductStatus;
    use crate::store::MemoryStore;
    use crate::testutil;

    fn engine() -> (Arc<MemoryStore>, CartEngine) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), CartEngine::new(store))
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let (_, engine) = engine();
        let user = Uuid::new_v4();
        let first = engine.get_or_create(user).await.unwrap();
        let second = engine.get_or_create(user).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.items.is_empty());
        assert_eq!(second.subtotal_all, Decimal::ZERO);
    }

    #[tokio::test]
    async fn adding_an_item_sets_all_totals() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();
        let p = testutil::product(100, 10);
        store.insert_product(&p).await.unwrap();

        let cart = engine
            .add_or_update_item(user, &p.id.to_string(), 3)
            .await
            .unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.subtotal_all, Decimal::from(300));
        assert_eq!(cart.subtotal_selected, Decimal::from(300));
        assert_eq!(cart.grand_total, Decimal::from(300));
    }

    #[tokio::test]
    async fn adding_again_sums_quantities() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();
        let p = testutil::product(100, 10);
        store.insert_product(&p).await.unwrap();

        engine
            .add_or_update_item(user, &p.id.to_string(), 3)
            .await
            .unwrap();
        let cart = engine
            .add_or_update_item(user, &p.id.to_string(), 2)
            .await
            .unwrap();
        assert_eq!(cart.items[0].quantity, 5);
        assert_eq!(cart.subtotal_all, Decimal::from(500));
    }

    #[tokio::test]
    async fn stock_boundary_is_exact() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();
        let p = testutil::product(100, 10);
        store.insert_product(&p).await.unwrap();
        let id = p.id.to_string();

        assert!(engine.add_or_update_item(user, &id, 10).await.is_ok());
        let err = engine.add_or_update_item(user, &id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientStock {
                available: 10,
                requested: 11
            }
        ));
    }

    #[tokio::test]
    async fn add_rejects_bad_input() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();
        let p = testutil::product(100, 10);
        store.insert_product(&p).await.unwrap();
        let id = p.id.to_string();

        assert!(matches!(
            engine.add_or_update_item(user, &id, 0).await.unwrap_err(),
            Error::InvalidQuantity
        ));
        assert!(matches!(
            engine.add_or_update_item(user, &id, -2).await.unwrap_err(),
            Error::InvalidQuantity
        ));
        assert!(matches!(
            engine.add_or_update_item(user, "bogus", 1).await.unwrap_err(),
            Error::InvalidIdentifier
        ));
        assert!(matches!(
            engine
                .add_or_update_item(user, &Uuid::new_v4().to_string(), 1)
                .await
                .unwrap_err(),
            Error::ProductNotFound
        ));
    }

    #[tokio::test]
    async fn inactive_and_priceless_products_are_rejected() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();

        let mut inactive = testutil::product(100, 10);
        inactive.status = ProductStatus::Inactive;
        store.insert_product(&inactive).await.unwrap();
        assert!(matches!(
            engine
                .add_or_update_item(user, &inactive.id.to_string(), 1)
                .await
                .unwrap_err(),
            Error::ProductInactive
        ));

        let mut priceless = testutil::product(100, 10);
        priceless.inventory.price = None;
        store.insert_product(&priceless).await.unwrap();
        assert!(matches!(
            engine
                .add_or_update_item(user, &priceless.id.to_string(), 1)
                .await
                .unwrap_err(),
            Error::PriceMissing
        ));
    }

    #[tokio::test]
    async fn set_quantity_replaces_instead_of_summing() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();
        let p = testutil::product(100, 10);
        store.insert_product(&p).await.unwrap();
        let id = p.id.to_string();

        engine.add_or_update_item(user, &id, 3).await.unwrap();
        let cart = engine.set_item_quantity(user, &id, 2).await.unwrap();
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(cart.subtotal_all, Decimal::from(200));
    }

    #[tokio::test]
    async fn set_quantity_zero_removes_only_that_line() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();
        let p = testutil::product(100, 10);
        let q = testutil::product(50, 10);
        store.insert_product(&p).await.unwrap();
        store.insert_product(&q).await.unwrap();

        engine
            .add_or_update_item(user, &p.id.to_string(), 2)
            .await
            .unwrap();
        engine
            .add_or_update_item(user, &q.id.to_string(), 1)
            .await
            .unwrap();
        let cart = engine
            .set_item_quantity(user, &p.id.to_string(), 0)
            .await
            .unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_id, q.id);
        assert_eq!(cart.subtotal_all, Decimal::from(50));
    }

    #[tokio::test]
    async fn set_quantity_never_creates_a_cart() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();
        let p = testutil::product(100, 10);
        store.insert_product(&p).await.unwrap();

        let err = engine
            .set_item_quantity(user, &p.id.to_string(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CartNotOpen));
        assert!(store.open_cart(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_quantity_requires_an_existing_line() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();
        let p = testutil::product(100, 10);
        let other = testutil::product(50, 10);
        store.insert_product(&p).await.unwrap();
        store.insert_product(&other).await.unwrap();

        engine
            .add_or_update_item(user, &p.id.to_string(), 1)
            .await
            .unwrap();
        let err = engine
            .set_item_quantity(user, &other.id.to_string(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ItemNotInCart));
    }

    #[tokio::test]
    async fn deselecting_drops_line_from_selected_totals() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();
        let p = testutil::product(100, 10);
        let q = testutil::product(50, 10);
        store.insert_product(&p).await.unwrap();
        store.insert_product(&q).await.unwrap();

        engine
            .add_or_update_item(user, &p.id.to_string(), 5)
            .await
            .unwrap();
        engine
            .add_or_update_item(user, &q.id.to_string(), 1)
            .await
            .unwrap();
        let cart = engine
            .set_item_selection(user, &p.id.to_string(), false)
            .await
            .unwrap();
        assert_eq!(cart.subtotal_all, Decimal::from(550));
        assert_eq!(cart.subtotal_selected, Decimal::from(50));
        assert_eq!(cart.grand_total, Decimal::from(50));
    }

    #[tokio::test]
    async fn adding_reselects_a_deselected_line() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();
        let p = testutil::product(100, 10);
        store.insert_product(&p).await.unwrap();
        let id = p.id.to_string();

        engine.add_or_update_item(user, &id, 2).await.unwrap();
        engine.set_item_selection(user, &id, false).await.unwrap();
        let cart = engine.add_or_update_item(user, &id, 1).await.unwrap();
        assert!(cart.items[0].selected);
        assert_eq!(cart.subtotal_selected, Decimal::from(300));
    }

    #[tokio::test]
    async fn overview_flags_price_divergence_and_low_stock() {
        let (store, engine) = engine();
        let user = Uuid::new_v4();
        let mut p = testutil::product(100, 10);
        p.inventory.min_stock = 2;
        store.insert_product(&p).await.unwrap();

        engine
            .add_or_update_item(user, &p.id.to_string(), 1)
            .await
            .unwrap();

        // Price raised and stock drained after the snapshot was taken.
        p.inventory.price = Some(Decimal::from(120));
        p.inventory.stock = 2;
        store.update_product(&p).await.unwrap();

        let view = engine.overview(user).await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].live_price, Some(Decimal::from(120)));
        assert!(view.lines[0].price_changed);
        assert!(view.lines[0].low_stock);
        assert!(view.any_selected_price_changed);
        assert!(view.any_selected_low_stock);
        // The snapshot itself is untouched.
        assert_eq!(view.cart.items[0].unit_price, Decimal::from(100));
    }
}
