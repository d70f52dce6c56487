//! Order creation and order read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, OrderId, OrderMedium, OrderStatus, PaymentMethod, ProductId};
use domain::{CreateOrder, LineRequest, OrderList, PlacedOrder};
use serde::Deserialize;
use store::{Database, OrderWithItems};

use super::{AppState, ListParams, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shop_id: String,
    #[serde(default, alias = "phone")]
    pub phone_number: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub order_status: Option<OrderStatus>,
    #[serde(default)]
    pub order_medium: Option<OrderMedium>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub discount: Option<Money>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    #[serde(alias = "qty")]
    pub quantity: i64,
}

impl CreateOrderRequest {
    /// Checks quantities and builds the command.
    pub fn into_command(self) -> Result<CreateOrder, ApiError> {
        let mut items = Vec::with_capacity(self.items.len());
        for item in self.items {
            let quantity = u32::try_from(item.quantity)
                .ok()
                .filter(|q| *q >= 1)
                .ok_or_else(|| {
                    ApiError::BadRequest(format!(
                        "quantity for product {} must be a positive integer",
                        item.product_id
                    ))
                })?;
            items.push(LineRequest::new(item.product_id, quantity));
        }

        let mut cmd = CreateOrder::new(
            self.shop_id,
            self.customer_name,
            self.customer_email,
            self.phone_number,
        )
        .with_items(items);

        if let Some(status) = self.order_status {
            cmd.order_status = status;
        }
        if let Some(medium) = self.order_medium {
            cmd.order_medium = medium;
        }
        if let Some(method) = self.payment_method {
            cmd = cmd.with_payment_method(method);
        }
        if let Some(discount) = self.discount {
            cmd = cmd.with_discount(discount);
        }
        Ok(cmd)
    }
}

// -- Handlers --

/// POST /v1/orders: create an order with its line items.
#[tracing::instrument(skip(state, payload))]
pub async fn create<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlacedOrder>), ApiError> {
    let Json(req) = payload?;
    let cmd = req.into_command()?;
    let placed = state.order_service.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

/// GET /v1/orders/:id: load an order with its line items.
#[tracing::instrument(skip(state))]
pub async fn get<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderWithItems>, ApiError> {
    let id: OrderId = parse_id(&id)?;
    let order = state.order_service.get_order(id).await?;
    Ok(Json(order))
}

/// GET /v1/shop/:id/orders: list a shop's orders, newest first.
#[tracing::instrument(skip(state, params))]
pub async fn list_for_shop<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(shop_id): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<OrderList>, ApiError> {
    let Query(params) = params?;
    let orders = state
        .order_service
        .list_for_shop(&shop_id, &params.into_filter())
        .await?;
    Ok(Json(orders))
}
