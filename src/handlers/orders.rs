use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::blocking;
use crate::application::order_service::{OrderService, DEFAULT_PAGE_LIMIT};
use crate::auth::AuthUser;
use crate::domain::order::{OrderItemView, OrderView};
use crate::errors::AppError;
use crate::infrastructure::order_repo::DieselOrderRepository;

pub type Orders = OrderService<DieselOrderRepository>;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Option<Uuid>,
    /// Units to add. Defaults to 1.
    #[serde(default = "default_add_quantity")]
    pub quantity: i32,
}

fn default_add_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetItemRequest {
    pub product_id: Option<Uuid>,
    /// New quantity for the line; 0 or less removes it. Defaults to 0.
    #[serde(default)]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveItemRequest {
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub shipping_address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub quantity: i32,
    /// Decimal as a string, e.g. "199.90"
    pub unit_price: String,
    pub line_total: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub status: String,
    pub total_amount: String,
    pub shipping_address: String,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RemoveItemResponse {
    pub removed: bool,
    pub cart: OrderResponse,
}

pub(crate) fn money(amount: &BigDecimal) -> String {
    amount.with_scale(2).to_string()
}

impl From<OrderItemView> for OrderItemResponse {
    fn from(item: OrderItemView) -> Self {
        Self {
            line_total: money(&item.line_total()),
            id: item.id,
            product_id: item.product_id,
            sku: item.sku,
            product_name: item.product_name,
            quantity: item.quantity,
            unit_price: money(&item.unit_price),
        }
    }
}

impl From<OrderView> for OrderResponse {
    fn from(order: OrderView) -> Self {
        Self {
            id: order.id,
            status: order.status.to_string(),
            total_amount: money(&order.total_amount),
            shipping_address: order.shipping_address,
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
            items: order.items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /api/orders/me/cart
///
/// Returns the caller's open cart, creating it on first access.
#[utoipa::path(
    get,
    path = "/api/orders/me/cart",
    responses(
        (status = 200, description = "Current cart", body = OrderResponse),
        (status = 401, description = "Missing or invalid token"),
    ),
    tag = "orders"
)]
pub async fn my_cart(user: AuthUser, orders: web::Data<Orders>) -> Result<HttpResponse, AppError> {
    let AuthUser(principal) = user;
    let cart = blocking(move || orders.my_cart(&principal)).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(cart)))
}

/// POST /api/orders/me/cart/add-item
///
/// Adds units of an active product. Re-adding a product grows the existing
/// line and keeps the price it was first added at.
#[utoipa::path(
    post,
    path = "/api/orders/me/cart/add-item",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = OrderResponse),
        (status = 400, description = "Missing product_id or non-positive quantity"),
        (status = 404, description = "Product missing or inactive"),
    ),
    tag = "orders"
)]
pub async fn add_item(
    user: AuthUser,
    orders: web::Data<Orders>,
    body: web::Json<AddItemRequest>,
) -> Result<HttpResponse, AppError> {
    let AuthUser(principal) = user;
    let body = body.into_inner();
    let cart = blocking(move || orders.add_item(&principal, body.product_id, body.quantity)).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(cart)))
}

/// POST /api/orders/me/cart/set-item
#[utoipa::path(
    post,
    path = "/api/orders/me/cart/set-item",
    request_body = SetItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = OrderResponse),
        (status = 400, description = "Missing product_id"),
        (status = 404, description = "Product missing or inactive"),
    ),
    tag = "orders"
)]
pub async fn set_item(
    user: AuthUser,
    orders: web::Data<Orders>,
    body: web::Json<SetItemRequest>,
) -> Result<HttpResponse, AppError> {
    let AuthUser(principal) = user;
    let body = body.into_inner();
    let cart = blocking(move || orders.set_item(&principal, body.product_id, body.quantity)).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(cart)))
}

/// POST /api/orders/me/cart/remove-item
#[utoipa::path(
    post,
    path = "/api/orders/me/cart/remove-item",
    request_body = RemoveItemRequest,
    responses(
        (status = 200, description = "Whether a line was removed, and the cart", body = RemoveItemResponse),
        (status = 400, description = "Missing product_id"),
    ),
    tag = "orders"
)]
pub async fn remove_item(
    user: AuthUser,
    orders: web::Data<Orders>,
    body: web::Json<RemoveItemRequest>,
) -> Result<HttpResponse, AppError> {
    let AuthUser(principal) = user;
    let product_id = body.into_inner().product_id;
    let outcome = blocking(move || orders.remove_item(&principal, product_id)).await?;
    Ok(HttpResponse::Ok().json(RemoveItemResponse {
        removed: outcome.removed,
        cart: outcome.cart.into(),
    }))
}

/// POST /api/orders/me/cart/checkout
///
/// Reserves stock for every line and turns the cart into a PENDING order, all
/// in one database transaction. Nothing changes when any line is short.
#[utoipa::path(
    post,
    path = "/api/orders/me/cart/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Confirmed order", body = OrderResponse),
        (status = 400, description = "Empty address, empty cart or insufficient stock"),
        (status = 409, description = "Lock contention; safe to retry"),
    ),
    tag = "orders"
)]
pub async fn checkout(
    user: AuthUser,
    orders: web::Data<Orders>,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
    let AuthUser(principal) = user;
    let address = body.into_inner().shipping_address;
    let order = blocking(move || orders.checkout(&principal, address.as_deref())).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// GET /api/orders/{id}
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found or not visible to the caller"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    user: AuthUser,
    orders: web::Data<Orders>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let AuthUser(principal) = user;
    let order_id = path.into_inner();
    let order = blocking(move || orders.get_order(&principal, order_id)).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// GET /api/orders
///
/// Staff see every order; other users only their own. Newest first.
#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    user: AuthUser,
    orders: web::Data<Orders>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let AuthUser(principal) = user;
    let params = query.into_inner();
    let (page, limit) =
        crate::application::order_service::normalize_page(params.page, params.limit);

    let result = blocking(move || orders.list_orders(&principal, page, limit)).await?;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: result.items.into_iter().map(OrderResponse::from).collect(),
        total: result.total,
        page,
        limit,
    }))
}
