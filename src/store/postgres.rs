//! Postgres-backed store.
//!
//! Cart items, order items and the shipping-address snapshot are embedded
//! as JSONB on their parent row, so each cart/order write is a single-row
//! (single-document) atomic operation. The stock decrement is a conditional
//! `UPDATE ... WHERE stock >= $n`, which closes the read-then-write race
//! between concurrent checkouts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::domain::{
    AddressSnapshot, Cart, CartItem, CartState, DeliveryMethod, Inventory, Order, OrderItem,
    OrderStatus, PaymentMethod, Product, ProductStatus, ShippingAddress, Unit,
};
use async_trait::async_trait;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    brand: String,
    unit: String,
    sku: String,
    barcode: String,
    image_url: String,
    status: String,
    stock: i32,
    min_stock: i32,
    price: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, StoreError> {
        let unit = Unit::parse(&row.unit)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown unit {:?}", row.unit)))?;
        let status = ProductStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown product status {:?}", row.status)))?;
        Ok(Product {
            id: row.id,
            name: row.name,
            description: row.description,
            brand: row.brand,
            unit,
            sku: row.sku,
            barcode: row.barcode,
            image_url: row.image_url,
            status,
            inventory: Inventory {
                stock: non_negative(row.stock, "stock")?,
                min_stock: non_negative(row.min_stock, "min_stock")?,
                price: row.price,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    state: String,
    items: Json<Vec<CartItem>>,
    subtotal_all: Decimal,
    subtotal_selected: Decimal,
    grand_total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = StoreError;

    fn try_from(row: CartRow) -> Result<Self, StoreError> {
        let state = CartState::parse(&row.state)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown cart state {:?}", row.state)))?;
        Ok(Cart {
            id: row.id,
            user_id: row.user_id,
            state,
            items: row.items.0,
            subtotal_all: row.subtotal_all,
            subtotal_selected: row.subtotal_selected,
            grand_total: row.grand_total,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    status: String,
    items: Json<Vec<OrderItem>>,
    subtotal: Decimal,
    shipping_cost: Decimal,
    grand_total: Decimal,
    delivery: String,
    payment: String,
    shipping_address: Json<AddressSnapshot>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, StoreError> {
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown order status {:?}", row.status)))?;
        let delivery = DeliveryMethod::parse(&row.delivery)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown delivery method {:?}", row.delivery)))?;
        let payment = PaymentMethod::parse(&row.payment)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown payment method {:?}", row.payment)))?;
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            status,
            items: row.items.0,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            grand_total: row.grand_total,
            delivery,
            payment,
            shipping_address: row.shipping_address.0,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    user_id: Uuid,
    contact_name: String,
    contact_phone: String,
    city: String,
    neighborhood: String,
    complement: String,
    principal: bool,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for ShippingAddress {
    fn from(row: AddressRow) -> Self {
        ShippingAddress {
            id: row.id,
            user_id: row.user_id,
            contact_name: row.contact_name,
            contact_phone: row.contact_phone,
            city: row.city,
            neighborhood: row.neighborhood,
            complement: row.complement,
            principal: row.principal,
            created_at: row.created_at,
        }
    }
}

fn non_negative(value: i32, field: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {field}: {value}")))
}

#[async_trait]
impl Store for PgStore {
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO products \
             (id, name, description, brand, unit, sku, barcode, image_url, status, \
              stock, min_stock, price, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(product.unit.as_str())
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.image_url)
        .bind(product.status.as_str())
        .bind(product.inventory.stock as i32)
        .bind(product.inventory.min_stock as i32)
        .bind(product.inventory.price)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, only_active: bool) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT * FROM products WHERE ($1 = false OR status = 'active') \
             ORDER BY created_at DESC",
        )
        .bind(only_active)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn update_product(&self, product: &Product) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, description = $3, brand = $4, unit = $5, \
             sku = $6, barcode = $7, image_url = $8, status = $9, stock = $10, \
             min_stock = $11, price = $12, updated_at = $13 WHERE id = $1",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(product.unit.as_str())
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.image_url)
        .bind(product.status.as_str())
        .bind(product.inventory.stock as i32)
        .bind(product.inventory.min_stock as i32)
        .bind(product.inventory.price)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn decrement_stock(&self, id: Uuid, quantity: u32) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $2, updated_at = NOW() \
             WHERE id = $1 AND stock >= $2",
        )
        .bind(id)
        .bind(quantity as i32)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn open_cart(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT * FROM carts WHERE user_id = $1 AND state = 'open'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Cart::try_from).transpose()
    }

    async fn insert_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO carts \
             (id, user_id, state, items, subtotal_all, subtotal_selected, grand_total, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(cart.id)
        .bind(cart.user_id)
        .bind(cart.state.as_str())
        .bind(Json(&cart.items))
        .bind(cart.subtotal_all)
        .bind(cart.subtotal_selected)
        .bind(cart.grand_total)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE carts SET state = $2, items = $3, subtotal_all = $4, \
             subtotal_selected = $5, grand_total = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(cart.id)
        .bind(cart.state.as_str())
        .bind(Json(&cart.items))
        .bind(cart.subtotal_all)
        .bind(cart.subtotal_selected)
        .bind(cart.grand_total)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!("cart {} missing on save", cart.id)));
        }
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orders \
             (id, user_id, status, items, subtotal, shipping_cost, grand_total, \
              delivery, payment, shipping_address, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.status.as_str())
        .bind(Json(&order.items))
        .bind(order.subtotal)
        .bind(order.shipping_cost)
        .bind(order.grand_total)
        .bind(order.delivery.as_str())
        .bind(order.payment.as_str())
        .bind(Json(&order.shipping_address))
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn insert_address(&self, address: &ShippingAddress) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO addresses \
             (id, user_id, contact_name, contact_phone, city, neighborhood, complement, \
              principal, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(address.id)
        .bind(address.user_id)
        .bind(&address.contact_name)
        .bind(&address.contact_phone)
        .bind(&address.city)
        .bind(&address.neighborhood)
        .bind(&address.complement)
        .bind(address.principal)
        .bind(address.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn address(&self, user_id: Uuid, id: Uuid) -> Result<Option<ShippingAddress>, StoreError> {
        let row = sqlx::query_as::<_, AddressRow>(
            "SELECT * FROM addresses WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ShippingAddress::from))
    }

    async fn addresses_for_user(&self, user_id: Uuid) -> Result<Vec<ShippingAddress>, StoreError> {
        let rows = sqlx::query_as::<_, AddressRow>(
            "SELECT * FROM addresses WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ShippingAddress::from).collect())
    }

    async fn update_address(&self, address: &ShippingAddress) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE addresses SET contact_name = $3, contact_phone = $4, city = $5, \
             neighborhood = $6, complement = $7, principal = $8 \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(address.id)
        .bind(address.user_id)
        .bind(&address.contact_name)
        .bind(&address.contact_phone)
        .bind(&address.city)
        .bind(&address.neighborhood)
        .bind(&address.complement)
        .bind(address.principal)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_address(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_principal_address(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE addresses SET principal = false WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(
            "UPDATE addresses SET principal = true WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn principal_address(&self, user_id: Uuid) -> Result<Option<ShippingAddress>, StoreError> {
        let row = sqlx::query_as::<_, AddressRow>(
            "SELECT * FROM addresses WHERE user_id = $1 AND principal = true LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ShippingAddress::from))
    }
}
