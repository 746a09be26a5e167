//! In-memory store used by the test suite.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::domain::{Cart, CartState, Order, Product, ShippingAddress};

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    products: HashMap<Uuid, Product>,
    carts: HashMap<Uuid, Cart>,
    orders: HashMap<Uuid, Order>,
    addresses: HashMap<Uuid, ShippingAddress>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut g = self.inner.write().await;
        g.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, only_active: bool) -> Result<Vec<Product>, StoreError> {
        let g = self.inner.read().await;
        let mut products: Vec<Product> = g
            .products
            .values()
            .filter(|p| !only_active || p.is_active())
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn update_product(&self, product: &Product) -> Result<bool, StoreError> {
        let mut g = self.inner.write().await;
        match g.products.get_mut(&product.id) {
            Some(slot) => {
                *slot = product.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.products.remove(&id).is_some())
    }

    async fn decrement_stock(&self, id: Uuid, quantity: u32) -> Result<bool, StoreError> {
        let mut g = self.inner.write().await;
        match g.products.get_mut(&id) {
            Some(p) if p.inventory.stock >= quantity => {
                p.inventory.stock -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn open_cart(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        let g = self.inner.read().await;
        Ok(g.carts
            .values()
            .find(|c| c.user_id == user_id && c.state == CartState::Open)
            .cloned())
    }

    async fn insert_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        let mut g = self.inner.write().await;
        g.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        let mut g = self.inner.write().await;
        match g.carts.get_mut(&cart.id) {
            Some(slot) => {
                *slot = cart.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!("cart {} missing on save", cart.id))),
        }
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut g = self.inner.write().await;
        g.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let g = self.inner.read().await;
        let mut orders: Vec<Order> = g
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn insert_address(&self, address: &ShippingAddress) -> Result<(), StoreError> {
        let mut g = self.inner.write().await;
        g.addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn address(&self, user_id: Uuid, id: Uuid) -> Result<Option<ShippingAddress>, StoreError> {
        let g = self.inner.read().await;
        Ok(g.addresses
            .get(&id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn addresses_for_user(&self, user_id: Uuid) -> Result<Vec<ShippingAddress>, StoreError> {
        let g = self.inner.read().await;
        let mut addresses: Vec<ShippingAddress> = g
            .addresses
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(addresses)
    }

    async fn update_address(&self, address: &ShippingAddress) -> Result<bool, StoreError> {
        let mut g = self.inner.write().await;
        match g.addresses.get_mut(&address.id) {
            Some(slot) if slot.user_id == address.user_id => {
                let created_at = slot.created_at;
                *slot = address.clone();
                slot.created_at = created_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_address(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut g = self.inner.write().await;
        match g.addresses.get(&id) {
            Some(a) if a.user_id == user_id => {
                g.addresses.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_principal_address(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut g = self.inner.write().await;
        if !g.addresses.get(&id).is_some_and(|a| a.user_id == user_id) {
            return Ok(false);
        }
        for a in g.addresses.values_mut().filter(|a| a.user_id == user_id) {
            a.principal = a.id == id;
        }
        Ok(true)
    }

    async fn principal_address(&self, user_id: Uuid) -> Result<Option<ShippingAddress>, StoreError> {
        let g = self.inner.read().await;
        Ok(g.addresses
            .values()
            .find(|a| a.user_id == user_id && a.principal)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn decrement_is_conditional() {
        let store = MemoryStore::new();
        let p = testutil::product(100, 3);
        store.insert_product(&p).await.unwrap();

        assert!(store.decrement_stock(p.id, 3).await.unwrap());
        assert!(!store.decrement_stock(p.id, 1).await.unwrap());
        let live = store.product(p.id).await.unwrap().unwrap();
        assert_eq!(live.inventory.stock, 0);
    }

    #[tokio::test]
    async fn save_cart_requires_existing_cart() {
        let store = MemoryStore::new();
        let cart = Cart::new(Uuid::new_v4());

        assert!(store.save_cart(&cart).await.is_err());
        store.insert_cart(&cart).await.unwrap();
        store.save_cart(&cart).await.unwrap();
    }

    #[tokio::test]
    async fn set_principal_demotes_previous_principal() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let a = testutil::address(user, true);
        let b = testutil::address(user, false);
        store.insert_address(&a).await.unwrap();
        store.insert_address(&b).await.unwrap();

        assert!(store.set_principal_address(user, b.id).await.unwrap());
        let principal = store.principal_address(user).await.unwrap().unwrap();
        assert_eq!(principal.id, b.id);
        let all = store.addresses_for_user(user).await.unwrap();
        assert_eq!(all.iter().filter(|a| a.principal).count(), 1);
    }
}
