//! HTTP layer: a thin axum router over the engines. The web layer owns
//! request parsing and status-code mapping; all business rules live in
//! the engines.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use validator::Validate;

use crate::cart::{CartEngine, CartView};
use crate::catalog::{Catalog, ProductDraft};
use crate::checkout::CheckoutEngine;
use crate::domain::{
    parse_id, Cart, DeliveryMethod, Order, PaymentMethod, Product, ProductStatus, ShippingAddress,
    Unit,
};
use crate::error::Error;
use crate::events::{self, DomainEvent};
use crate::store::{Store, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub carts: CartEngine,
    pub checkout: CheckoutEngine,
    pub store: Arc<dyn Store>,
    pub nats: Option<async_nats::Client>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, nats: Option<async_nats::Client>) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            carts: CartEngine::new(store.clone()),
            checkout: CheckoutEngine::new(store.clone()),
            store,
            nats,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/products", get(list_products).post(create_product))
        .route(
            "/api/v1/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/api/v1/products/:id/status", post(set_product_status))
        .route("/api/v1/users/:user_id/cart", get(get_cart))
        .route("/api/v1/users/:user_id/cart/items", post(add_cart_item))
        .route(
            "/api/v1/users/:user_id/cart/items/:product_id",
            put(set_cart_item_quantity),
        )
        .route(
            "/api/v1/users/:user_id/cart/items/:product_id/selection",
            put(set_cart_item_selection),
        )
        .route("/api/v1/users/:user_id/checkout", post(checkout))
        .route("/api/v1/users/:user_id/orders", get(list_orders))
        .route("/api/v1/users/:user_id/orders/:order_id", get(get_order))
        .route(
            "/api/v1/users/:user_id/addresses",
            get(list_addresses).post(create_address),
        )
        .route(
            "/api/v1/users/:user_id/addresses/:address_id",
            put(update_address).delete(delete_address),
        )
        .route(
            "/api/v1/users/:user_id/addresses/:address_id/principal",
            post(set_principal_address),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// ============================================================================
// Error mapping
// ============================================================================

pub enum ApiError {
    Core(Error),
    Invalid(String),
    NotFound,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Core(Error::Storage(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Invalid(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg).into_response(),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()).into_response(),
            Self::Core(err) => {
                let status = match &err {
                    Error::ProductNotFound
                    | Error::ProductVanished
                    | Error::CartNotOpen
                    | Error::ItemNotInCart => StatusCode::NOT_FOUND,
                    Error::InvalidQuantity | Error::InvalidIdentifier => StatusCode::BAD_REQUEST,
                    Error::InsufficientStock { .. } => StatusCode::CONFLICT,
                    Error::ProductInactive
                    | Error::PriceMissing
                    | Error::NoItemsSelected
                    | Error::NoPrincipalAddress => StatusCode::UNPROCESSABLE_ENTITY,
                    Error::Storage(cause) => {
                        // Never leak storage internals to the caller.
                        tracing::error!(%cause, "storage failure");
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "something went wrong, try again later".to_string(),
                        )
                            .into_response();
                    }
                };
                (status, err.to_string()).into_response()
            }
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Health
// ============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "tienda"}))
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListParams {
    /// Include inactive products (admin listing).
    all: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
struct ProductRequest {
    #[validate(length(min = 3, message = "name must be at least 3 characters"))]
    name: String,
    #[validate(length(min = 10, message = "description must be at least 10 characters"))]
    description: String,
    #[serde(default)]
    brand: String,
    #[serde(default)]
    unit: Unit,
    #[serde(default)]
    sku: String,
    #[serde(default)]
    barcode: String,
    #[serde(default)]
    image_url: String,
    #[serde(default)]
    status: ProductStatus,
    stock: u32,
    min_stock: u32,
    price: Decimal,
}

impl ProductRequest {
    fn into_draft(self) -> ApiResult<ProductDraft> {
        self.validate()
            .map_err(|e| ApiError::Invalid(e.to_string()))?;
        if self.price <= Decimal::ZERO {
            return Err(ApiError::Invalid("price must be greater than 0".into()));
        }
        Ok(ProductDraft {
            name: self.name,
            description: self.description,
            brand: self.brand,
            unit: self.unit,
            sku: self.sku,
            barcode: self.barcode,
            image_url: self.image_url,
            status: self.status,
            stock: self.stock,
            min_stock: self.min_stock,
            price: self.price,
        })
    }
}

async fn list_products(
    State(s): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Product>>> {
    let only_active = !params.all.unwrap_or(false);
    Ok(Json(s.catalog.list(only_active).await?))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    Ok(Json(s.catalog.product(&id).await?))
}

async fn create_product(
    State(s): State<AppState>,
    Json(r): Json<ProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = s.catalog.create_product(r.into_draft()?).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(s): State<AppState>,
    Path(id): Path<String>,
    Json(r): Json<ProductRequest>,
) -> ApiResult<Json<Product>> {
    Ok(Json(s.catalog.update_product(&id, r.into_draft()?).await?))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: ProductStatus,
}

async fn set_product_status(
    State(s): State<AppState>,
    Path(id): Path<String>,
    Json(r): Json<StatusRequest>,
) -> ApiResult<Json<Product>> {
    Ok(Json(s.catalog.set_status(&id, r.status).await?))
}

async fn delete_product(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    s.catalog.delete_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Cart
// ============================================================================

#[derive(Debug, Deserialize)]
struct AddToCartRequest {
    product_id: String,
    #[serde(default = "default_quantity")]
    quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
struct SetQuantityRequest {
    quantity: i64,
}

#[derive(Debug, Deserialize)]
struct SetSelectionRequest {
    selected: bool,
}

async fn get_cart(State(s): State<AppState>, Path(user_id): Path<Uuid>) -> ApiResult<Json<CartView>> {
    Ok(Json(s.carts.overview(user_id).await?))
}

async fn add_cart_item(
    State(s): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(r): Json<AddToCartRequest>,
) -> ApiResult<Json<Cart>> {
    let cart = s
        .carts
        .add_or_update_item(user_id, &r.product_id, r.quantity)
        .await?;
    Ok(Json(cart))
}

async fn set_cart_item_quantity(
    State(s): State<AppState>,
    Path((user_id, product_id)): Path<(Uuid, String)>,
    Json(r): Json<SetQuantityRequest>,
) -> ApiResult<Json<Cart>> {
    let cart = s
        .carts
        .set_item_quantity(user_id, &product_id, r.quantity)
        .await?;
    Ok(Json(cart))
}

async fn set_cart_item_selection(
    State(s): State<AppState>,
    Path((user_id, product_id)): Path<(Uuid, String)>,
    Json(r): Json<SetSelectionRequest>,
) -> ApiResult<Json<Cart>> {
    let cart = s
        .carts
        .set_item_selection(user_id, &product_id, r.selected)
        .await?;
    Ok(Json(cart))
}

// ============================================================================
// Checkout and orders
// ============================================================================

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    #[serde(default)]
    delivery: DeliveryMethod,
    #[serde(default)]
    payment: PaymentMethod,
    #[serde(default)]
    shipping_cost: Decimal,
}

async fn checkout(
    State(s): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(r): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = s
        .checkout
        .create_order(user_id, r.delivery, r.payment, r.shipping_cost)
        .await?;
    if let Some(nats) = &s.nats {
        events::publish(nats, &DomainEvent::order_placed(&order)).await;
    }
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(
    State(s): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(s.store.orders_for_user(user_id).await?))
}

async fn get_order(
    State(s): State<AppState>,
    Path((user_id, order_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<Order>> {
    let order_id = parse_id(&order_id)?;
    let order = s.store.order(order_id).await?.ok_or(ApiError::NotFound)?;
    // Another user's order looks exactly like a missing one.
    if order.user_id != user_id {
        return Err(ApiError::NotFound);
    }
    Ok(Json(order))
}

// ============================================================================
// Address book
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
struct AddressRequest {
    #[validate(length(min = 1, message = "contact name is required"))]
    contact_name: String,
    #[validate(length(min = 1, message = "contact phone is required"))]
    contact_phone: String,
    #[validate(length(min = 1, message = "city is required"))]
    city: String,
    #[validate(length(min = 1, message = "neighborhood is required"))]
    neighborhood: String,
    #[serde(default)]
    complement: String,
    #[serde(default)]
    principal: bool,
}

async fn list_addresses(
    State(s): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ShippingAddress>>> {
    Ok(Json(s.store.addresses_for_user(user_id).await?))
}

async fn create_address(
    State(s): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(r): Json<AddressRequest>,
) -> ApiResult<(StatusCode, Json<ShippingAddress>)> {
    r.validate().map_err(|e| ApiError::Invalid(e.to_string()))?;
    let address = ShippingAddress {
        id: Uuid::new_v4(),
        user_id,
        contact_name: r.contact_name,
        contact_phone: r.contact_phone,
        city: r.city,
        neighborhood: r.neighborhood,
        complement: r.complement,
        principal: r.principal,
        created_at: Utc::now(),
    };
    s.store.insert_address(&address).await?;
    if address.principal {
        s.store.set_principal_address(user_id, address.id).await?;
    }
    Ok((StatusCode::CREATED, Json(address)))
}

async fn update_address(
    State(s): State<AppState>,
    Path((user_id, address_id)): Path<(Uuid, String)>,
    Json(r): Json<AddressRequest>,
) -> ApiResult<Json<ShippingAddress>> {
    r.validate().map_err(|e| ApiError::Invalid(e.to_string()))?;
    let address_id = parse_id(&address_id)?;
    let address = ShippingAddress {
        id: address_id,
        user_id,
        contact_name: r.contact_name,
        contact_phone: r.contact_phone,
        city: r.city,
        neighborhood: r.neighborhood,
        complement: r.complement,
        principal: r.principal,
        created_at: Utc::now(), // ignored by the store; created_at is preserved
    };
    if !s.store.update_address(&address).await? {
        return Err(ApiError::NotFound);
    }
    if address.principal {
        s.store.set_principal_address(user_id, address_id).await?;
    }
    // Respond with the persisted document, not the request echo.
    let stored = s
        .store
        .address(user_id, address_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(stored))
}

async fn delete_address(
    State(s): State<AppState>,
    Path((user_id, address_id)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    let address_id = parse_id(&address_id)?;
    if !s.store.delete_address(user_id, address_id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn set_principal_address(
    State(s): State<AppState>,
    Path((user_id, address_id)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    let address_id = parse_id(&address_id)?;
    if !s.store.set_principal_address(user_id, address_id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::Duration;
    use tower::ServiceExt;

    use crate::domain::{AddressSnapshot, OrderItem};
    use crate::store::MemoryStore;
    use crate::testutil;

    fn app() -> (Arc<MemoryStore>, Router) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), None);
        (store, router(state))
    }

    fn get(uri: String) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    fn pending_order(user_id: Uuid) -> Order {
        let item = OrderItem {
            product_id: Uuid::new_v4(),
            product_name: "Bocadillo veleño".into(),
            quantity: 2,
            unit_price: Decimal::from(100),
            line_subtotal: Decimal::from(200),
        };
        Order::place(
            user_id,
            vec![item],
            DeliveryMethod::HomeDelivery,
            PaymentMethod::Cash,
            Decimal::ZERO,
            AddressSnapshot::default(),
        )
    }

    #[tokio::test]
    async fn order_reads_are_scoped_to_the_owner() {
        let (store, app) = app();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let order = pending_order(owner);
        store.insert_order(&order).await.unwrap();

        let response = app
            .clone()
            .oneshot(get(format!("/api/v1/users/{owner}/orders/{}", order.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Someone else's order must be indistinguishable from a missing one.
        let foreign = app
            .clone()
            .oneshot(get(format!("/api/v1/users/{stranger}/orders/{}", order.id)))
            .await
            .unwrap();
        let missing = app
            .oneshot(get(format!(
                "/api/v1/users/{stranger}/orders/{}",
                Uuid::new_v4()
            )))
            .await
            .unwrap();
        assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_bytes(foreign).await, body_bytes(missing).await);
    }

    #[tokio::test]
    async fn address_update_responds_with_persisted_document() {
        let (store, app) = app();
        let user = Uuid::new_v4();
        let mut existing = testutil::address(user, false);
        existing.created_at = Utc::now() - Duration::days(30);
        store.insert_address(&existing).await.unwrap();

        let payload = serde_json::json!({
            "contact_name": "Carlos Ruiz",
            "contact_phone": "3017654321",
            "city": "Cali",
            "neighborhood": "San Antonio",
            "principal": true,
        });
        let request = Request::builder()
            .method("PUT")
            .uri(format!("/api/v1/users/{user}/addresses/{}", existing.id))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let returned: ShippingAddress =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        let stored = store.address(user, existing.id).await.unwrap().unwrap();

        assert_eq!(returned.city, "Cali");
        assert!(returned.principal);
        // The original creation timestamp survives the update and the response
        // mirrors the stored document, not the request.
        assert_eq!(stored.created_at, existing.created_at);
        assert_eq!(returned.created_at, stored.created_at);
    }
}
