//! Catalog administration: create, edit, soft-delete and list products.
//!
//! Field-level validation (name/description lengths, unit whitelist,
//! positive price) lives on the HTTP request types; this engine assumes a
//! well-formed draft.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{parse_id, Inventory, Product, ProductStatus, Unit};
use crate::error::{Error, Result};
use crate::store::Store;

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn Store>,
}

/// Admin-supplied product fields.
#[derive(Clone, Debug)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub brand: String,
    pub unit: Unit,
    pub sku: String,
    pub barcode: String,
    pub image_url: String,
    pub status: ProductStatus,
    pub stock: u32,
    pub min_stock: u32,
    pub price: Decimal,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: draft.name,
            description: draft.description,
            brand: draft.brand,
            unit: draft.unit,
            sku: draft.sku,
            barcode: draft.barcode,
            image_url: draft.image_url,
            status: draft.status,
            inventory: Inventory {
                stock: draft.stock,
                min_stock: draft.min_stock,
                price: Some(draft.price),
            },
            created_at: now,
            updated_at: now,
        };
        self.store.insert_product(&product).await?;
        tracing::info!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn update_product(&self, id: &str, draft: ProductDraft) -> Result<Product> {
        let id = parse_id(id)?;
        let mut product = self
            .store
            .product(id)
            .await?
            .ok_or(Error::ProductNotFound)?;
        product.name = draft.name;
        product.description = draft.description;
        product.brand = draft.brand;
        product.unit = draft.unit;
        product.sku = draft.sku;
        product.barcode = draft.barcode;
        product.image_url = draft.image_url;
        product.status = draft.status;
        product.inventory.stock = draft.stock;
        product.inventory.min_stock = draft.min_stock;
        product.inventory.price = Some(draft.price);
        product.updated_at = Utc::now();
        if !self.store.update_product(&product).await? {
            return Err(Error::ProductNotFound);
        }
        Ok(product)
    }

    /// Soft delete: flips the lifecycle state without touching the document.
    pub async fn set_status(&self, id: &str, status: ProductStatus) -> Result<Product> {
        let id = parse_id(id)?;
        let mut product = self
            .store
            .product(id)
            .await?
            .ok_or(Error::ProductNotFound)?;
        product.status = status;
        product.updated_at = Utc::now();
        if !self.store.update_product(&product).await? {
            return Err(Error::ProductNotFound);
        }
        Ok(product)
    }

    /// Hard delete. Prefer [`Catalog::set_status`] in production flows.
    pub async fn delete_product(&self, id: &str) -> Result<()> {
        let id = parse_id(id)?;
        if !self.store.delete_product(id).await? {
            return Err(Error::ProductNotFound);
        }
        Ok(())
    }

    pub async fn product(&self, id: &str) -> Result<Product> {
        let id = parse_id(id)?;
        self.store.product(id).await?.ok_or(Error::ProductNotFound)
    }

    /// Storefront listings pass `only_active = true`; admin listings see all.
    pub async fn list(&self, only_active: bool) -> Result<Vec<Product>> {
        Ok(self.store.list_products(only_active).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store};
    use crate::testutil;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Bocadillo veleño".into(),
            description: "Guava paste, 24 pieces per box".into(),
            brand: "La Vega".into(),
            unit: Unit::Box,
            sku: "BOC-24".into(),
            barcode: String::new(),
            image_url: String::new(),
            status: ProductStatus::Active,
            stock: 20,
            min_stock: 5,
            price: Decimal::from(12),
        }
    }

    fn catalog() -> (Arc<MemoryStore>, Catalog) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), Catalog::new(store))
    }

    #[tokio::test]
    async fn create_then_update_round_trips() {
        let (_, catalog) = catalog();
        let created = catalog.create_product(draft()).await.unwrap();
        assert_eq!(created.inventory.price, Some(Decimal::from(12)));

        let mut changed = draft();
        changed.price = Decimal::from(14);
        changed.stock = 8;
        let updated = catalog
            .update_product(&created.id.to_string(), changed)
            .await
            .unwrap();
        assert_eq!(updated.inventory.price, Some(Decimal::from(14)));
        assert_eq!(updated.inventory.stock, 8);
    }

    #[tokio::test]
    async fn set_status_soft_deletes() {
        let (store, catalog) = catalog();
        let created = catalog.create_product(draft()).await.unwrap();
        catalog
            .set_status(&created.id.to_string(), ProductStatus::Inactive)
            .await
            .unwrap();
        let live = store.product(created.id).await.unwrap().unwrap();
        assert!(!live.is_active());
    }

    #[tokio::test]
    async fn listing_can_exclude_inactive_products() {
        let (store, catalog) = catalog();
        let active = testutil::product(100, 10);
        let mut inactive = testutil::product(50, 10);
        inactive.status = ProductStatus::Inactive;
        store.insert_product(&active).await.unwrap();
        store.insert_product(&inactive).await.unwrap();

        assert_eq!(catalog.list(true).await.unwrap().len(), 1);
        assert_eq!(catalog.list(false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_ids_are_reported() {
        let (_, catalog) = catalog();
        let missing = Uuid::new_v4().to_string();
        assert!(matches!(
            catalog.product(&missing).await.unwrap_err(),
            Error::ProductNotFound
        ));
        assert!(matches!(
            catalog.delete_product(&missing).await.unwrap_err(),
            Error::ProductNotFound
        ));
        assert!(matches!(
            catalog.product("junk").await.unwrap_err(),
            Error::InvalidIdentifier
        ));
    }
}
