use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::order::{OrderItemView, OrderView, PlaceOrder, ReservationLine};
use crate::errors::AppError;
use crate::AppOrderService;

use super::UserId;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub shipping_address: String,
    pub notes: Option<String>,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    /// Null once the product has been deleted from the catalog; the
    /// snapshot fields below keep the historical record.
    pub product_id: Option<Uuid>,
    pub product_name: String,
    /// Decimal amounts as strings to avoid floating-point issues, e.g. "49.99"
    pub product_price: String,
    pub quantity: i32,
    pub subtotal: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: Uuid,
    pub status: String,
    pub total_amount: String,
    pub shipping_address: String,
    pub notes: String,
    pub items: Vec<OrderItemResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<OrderItemView> for OrderItemResponse {
    fn from(item: OrderItemView) -> Self {
        let subtotal = item.subtotal();
        OrderItemResponse {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            product_price: item.product_price.to_string(),
            quantity: item.quantity,
            subtotal: subtotal.to_string(),
        }
    }
}

impl From<OrderView> for OrderResponse {
    fn from(order: OrderView) -> Self {
        OrderResponse {
            id: order.id,
            order_number: order.order_number,
            status: order.status.to_string(),
            total_amount: order.total_amount.to_string(),
            shipping_address: order.shipping_address,
            notes: order.notes,
            items: order.items.into_iter().map(Into::into).collect(),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
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
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders/place
///
/// Validates the requested items against the catalog, then reserves stock
/// under per-product row locks and persists the order with snapshot line
/// items inside a single database transaction.
#[utoipa::path(
    post,
    path = "/orders/place",
    request_body = PlaceOrderRequest,
    params(
        ("X-User-Id" = String, Header, description = "Acting user UUID"),
    ),
    responses(
        (status = 201, description = "Order placed successfully", body = OrderResponse),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Missing user identity"),
        (status = 404, description = "Unknown product"),
        (status = 409, description = "Product unavailable or insufficient stock"),
    ),
    tag = "orders"
)]
pub async fn place_order(
    service: web::Data<AppOrderService>,
    user: UserId,
    body: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let input = PlaceOrder {
        shipping_address: body.shipping_address,
        notes: body.notes.unwrap_or_default(),
        items: body
            .items
            .into_iter()
            .map(|i| ReservationLine {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect(),
    };

    let order = web::block(move || service.place_order(user.0, input))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// POST /orders/{id}/cancel
///
/// Cancels a pending order owned by the acting user and restores the
/// reserved stock.
#[utoipa::path(
    post,
    path = "/orders/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-User-Id" = String, Header, description = "Acting user UUID"),
    ),
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 401, description = "Missing user identity"),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not pending"),
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    service: web::Data<AppOrderService>,
    user: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let order = web::block(move || service.cancel_order(user.0, order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// GET /orders/{id}
///
/// Returns one of the acting user's orders with its line items. Another
/// user's order id behaves as not found.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-User-Id" = String, Header, description = "Acting user UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 401, description = "Missing user identity"),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<AppOrderService>,
    user: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let order = web::block(move || service.get_order(user.0, order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// GET /orders
///
/// Returns a paginated list of the acting user's orders, newest first.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
        ("X-User-Id" = String, Header, description = "Acting user UUID"),
    ),
    responses(
        (status = 200, description = "Paginated list of the user's orders", body = ListOrdersResponse),
        (status = 401, description = "Missing user identity"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    service: web::Data<AppOrderService>,
    user: UserId,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);

    let list = web::block(move || service.list_orders(user.0, page, limit))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: list.items.into_iter().map(Into::into).collect(),
        total: list.total,
        page,
        limit,
    }))
}
