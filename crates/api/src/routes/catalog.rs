//! Category and product endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{CategoryId, Money, ProductId, ProductType};
use domain::{CategoryList, ProductList};
use serde::{Deserialize, Serialize};
use store::{Category, Database, NewCategory, NewProduct, Product, ProductUpdate};

use super::{AppState, ListParams, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub shop_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub wholesale_price: Money,
    pub retail_price: Money,
    pub category_id: CategoryId,
    #[serde(default)]
    pub product_image: Option<String>,
    #[serde(default)]
    pub product_type: ProductType,
    #[serde(default)]
    pub stock: i64,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct AveragePriceResponse {
    pub category_id: CategoryId,
    pub average_price: Money,
}

// -- Categories --

/// POST /v1/categories
#[tracing::instrument(skip(state, payload))]
pub async fn create_category<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let Json(req) = payload?;
    let category = state
        .catalog_service
        .create_category(NewCategory {
            name: req.name,
            parent_id: req.parent_id,
            shop_id: req.shop_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /v1/categories/:id
#[tracing::instrument(skip(state))]
pub async fn get_category<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
) -> Result<Json<Category>, ApiError> {
    let id: CategoryId = parse_id(&id)?;
    Ok(Json(state.catalog_service.get_category(id).await?))
}

/// DELETE /v1/categories/:id
#[tracing::instrument(skip(state))]
pub async fn delete_category<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
) -> Result<Json<Category>, ApiError> {
    let id: CategoryId = parse_id(&id)?;
    Ok(Json(state.catalog_service.delete_category(id).await?))
}

/// GET /v1/shop/:id/categories
#[tracing::instrument(skip(state, params))]
pub async fn list_categories<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(shop_id): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<CategoryList>, ApiError> {
    let Query(params) = params?;
    let categories = state
        .catalog_service
        .list_categories(&shop_id, &params.into_filter())
        .await?;
    Ok(Json(categories))
}

/// GET /v1/categories/:id/average-price: over the category and its descendants.
#[tracing::instrument(skip(state))]
pub async fn average_price<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
) -> Result<Json<AveragePriceResponse>, ApiError> {
    let category_id: CategoryId = parse_id(&id)?;
    let average_price = state
        .catalog_service
        .average_price_by_category(category_id)
        .await?;
    Ok(Json(AveragePriceResponse {
        category_id,
        average_price,
    }))
}

// -- Products --

/// POST /v1/products
#[tracing::instrument(skip(state, payload))]
pub async fn create_product<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let Json(req) = payload?;
    let product = state
        .catalog_service
        .create_product(NewProduct {
            name: req.name,
            description: req.description,
            wholesale_price: req.wholesale_price,
            retail_price: req.retail_price,
            category_id: req.category_id,
            product_image: req.product_image,
            product_type: req.product_type,
            stock: req.stock,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /v1/products/:id
#[tracing::instrument(skip(state))]
pub async fn get_product<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = parse_id(&id)?;
    Ok(Json(state.catalog_service.get_product(id).await?))
}

/// PUT /v1/products/:id
#[tracing::instrument(skip(state, payload))]
pub async fn update_product<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
    payload: Result<Json<ProductUpdate>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = parse_id(&id)?;
    let Json(update) = payload?;
    Ok(Json(state.catalog_service.update_product(id, update).await?))
}

/// DELETE /v1/products/:id
#[tracing::instrument(skip(state))]
pub async fn delete_product<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = parse_id(&id)?;
    Ok(Json(state.catalog_service.delete_product(id).await?))
}

/// GET /v1/shop/:id/products
#[tracing::instrument(skip(state, params))]
pub async fn list_products<D: Database>(
    State(state): State<Arc<AppState<D>>>,
    Path(shop_id): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ProductList>, ApiError> {
    let Query(params) = params?;
    let products = state
        .catalog_service
        .list_products(&shop_id, &params.into_filter())
        .await?;
    Ok(Json(products))
}
