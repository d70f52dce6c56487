//! HTTP handlers, grouped by resource.

pub mod catalog;
pub mod customers;
pub mod health;
pub mod metrics;
pub mod orders;

use std::str::FromStr;

use domain::{CatalogService, CustomerService, OrderService};
use serde::Deserialize;
use store::{Database, ListFilter};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<D: Database> {
    pub order_service: OrderService<D>,
    pub customer_service: CustomerService<D>,
    pub catalog_service: CatalogService<D>,
}

impl<D: Database> AppState<D> {
    pub fn new(db: D, order_service: OrderService<D>) -> Self {
        Self {
            order_service,
            customer_service: CustomerService::new(db.clone()),
            catalog_service: CatalogService::new(db),
        }
    }
}

/// `?page=&per=&term=&category_id=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per: Option<u32>,
    pub term: Option<String>,
    pub category_id: Option<i64>,
}

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 20;

impl ListParams {
    pub fn into_filter(self) -> ListFilter {
        let mut filter = ListFilter::paged(
            self.page.unwrap_or(DEFAULT_PAGE),
            self.per.unwrap_or(DEFAULT_PER_PAGE),
        );
        if let Some(term) = self.term {
            filter = filter.with_term(term);
        }
        if let Some(category_id) = self.category_id {
            filter = filter.with_category(category_id.into());
        }
        filter
    }
}

/// Parses a numeric path identifier.
pub(crate) fn parse_id<T: FromStr>(raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid ID format: {raw}")))
}
