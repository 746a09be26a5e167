//! Checkout engine: converts the open cart's selected lines into an
//! immutable order, re-validating everything against the live catalog
//! before the first write.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{CartItem, DeliveryMethod, Order, OrderItem, PaymentMethod};
use crate::error::{Error, Result};
use crate::store::Store;

#[derive(Clone)]
pub struct CheckoutEngine {
    store: Arc<dyn Store>,
}

impl CheckoutEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Creates a pending order from the user's open cart.
    ///
    /// Order lines are priced at the **live** product price, not the cart
    /// snapshot. All validation happens before the first write, so any
    /// failure leaves carts, products and orders untouched. The write
    /// sequence afterwards (insert order, decrement stock per product,
    /// close cart) is best-effort sequential: a stock decrement that loses
    /// a race after the order is persisted is logged, not unwound.
    pub async fn create_order(
        &self,
        user_id: Uuid,
        delivery: DeliveryMethod,
        payment: PaymentMethod,
        shipping_cost: Decimal,
    ) -> Result<Order> {
        let mut cart = self
            .store
            .open_cart(user_id)
            .await?
            .ok_or(Error::CartNotOpen)?;

        let selected: Vec<CartItem> = cart
            .items
            .iter()
            .filter(|l| l.selected && l.quantity > 0)
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(Error::NoItemsSelected);
        }

        let mut items = Vec::with_capacity(selected.len());
        for line in &selected {
            let product = self
                .store
                .product(line.product_id)
                .await?
                .ok_or(Error::ProductVanished)?;
            if !product.is_active() {
                return Err(Error::ProductInactive);
            }
            let unit_price = product.sale_price().ok_or(Error::PriceMissing)?;
            if line.quantity > product.inventory.stock {
                return Err(Error::InsufficientStock {
                    available: product.inventory.stock,
                    requested: line.quantity,
                });
            }
            items.push(OrderItem {
                product_id: line.product_id,
                product_name: product.name,
                quantity: line.quantity,
                unit_price,
                line_subtotal: unit_price * Decimal::from(line.quantity),
            });
        }

        let address = self
            .store
            .principal_address(user_id)
            .await?
            .ok_or(Error::NoPrincipalAddress)?;

        // Shipping cost is caller-validated; anything negative becomes zero.
        let shipping_cost = shipping_cost.max(Decimal::ZERO);
        let order = Order::place(
            user_id,
            items,
            delivery,
            payment,
            shipping_cost,
            address.snapshot(),
        );

        // Validation is complete: first write.
        self.store.insert_order(&order).await?;

        for item in &order.items {
            if !self.store.decrement_stock(item.product_id, item.quantity).await? {
                tracing::warn!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    "stock decrement lost a race after order was persisted"
                );
            }
        }

        cart.mark_converted();
        self.store.save_cart(&cart).await?;

        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            grand_total = %order.grand_total,
            "order placed"
        );
        Ok(order)
    }
}
