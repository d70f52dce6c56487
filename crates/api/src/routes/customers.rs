//! Customer endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{CustomerId, CustomerType};
use domain::CustomerList;
use serde::Deserialize;
use store::{Customer, CustomerUpdate, Database, NewCustomer};

use super::{AppState, ListParams, parse_id};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub customer_type: CustomerType,
    pub shop_id: String,
}

impl From<CreateCustomerRequest> for NewCustomer {
    fn from(req: CreateCustomerRequest) -> Self {
        NewCustomer {
            name: req.name,
            email: req.email,
            phone_number: req.phone_number,
            customer_type: req.customer_type,
            shop_id: req.shop_id,
        }
    }
}

/// POST /v1/customers
#[tracing::instrument(skip(state, payload))]
pub async fn create<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    payload: Result<Json<CreateCustomerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let Json(req) = payload?;
    let customer = state.customer_service.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// GET /v1/customers/:id
#[tracing::instrument(skip(state))]
pub async fn get<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    let id: CustomerId = parse_id(&id)?;
    Ok(Json(state.customer_service.get(id).await?))
}

/// PUT /v1/customers/:id
#[tracing::instrument(skip(state, payload))]
pub async fn update<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
    payload: Result<Json<CustomerUpdate>, JsonRejection>,
) -> Result<Json<Customer>, ApiError> {
    let id: CustomerId = parse_id(&id)?;
    let Json(update) = payload?;
    Ok(Json(state.customer_service.update(id, update).await?))
}

/// DELETE /v1/customers/:id: returns the removed customer.
#[tracing::instrument(skip(state))]
pub async fn delete<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    let id: CustomerId = parse_id(&id)?;
    Ok(Json(state.customer_service.delete(id).await?))
}

/// GET /v1/shop/:id/customers
#[tracing::instrument(skip(state, params))]
pub async fn list_for_shop<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(shop_id): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<CustomerList>, ApiError> {
    let Query(params) = params?;
    let customers = state
        .customer_service
        .list_for_shop(&shop_id, &params.into_filter())
        .await?;
    Ok(Json(customers))
}
