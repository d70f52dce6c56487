//! HTTP API server for the point-of-sale backend.
//!
//! Provides REST endpoints for orders, customers and the catalog, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{OrderConfig, OrderNotifier, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Database;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<D: Database>(state: Arc<AppState<D>>, metrics_handle: PrometheusHandle) -> Router {
    use routes::{catalog, customers, orders};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let v1 = Router::new()
        .route("/orders", post(orders::create::<D>))
        .route("/orders/{id}", get(orders::get::<D>))
        .route("/shop/{id}/orders", get(orders::list_for_shop::<D>))
        .route("/customers", post(customers::create::<D>))
        .route(
            "/customers/{id}",
            get(customers::get::<D>)
                .put(customers::update::<D>)
                .delete(customers::delete::<D>),
        )
        .route("/shop/{id}/customers", get(customers::list_for_shop::<D>))
        .route("/categories", post(catalog::create_category::<D>))
        .route(
            "/categories/{id}",
            get(catalog::get_category::<D>).delete(catalog::delete_category::<D>),
        )
        .route(
            "/categories/{id}/average-price",
            get(catalog::average_price::<D>),
        )
        .route("/shop/{id}/categories", get(catalog::list_categories::<D>))
        .route("/products", post(catalog::create_product::<D>))
        .route(
            "/products/{id}",
            get(catalog::get_product::<D>)
                .put(catalog::update_product::<D>)
                .delete(catalog::delete_product::<D>),
        )
        .route("/shop/{id}/products", get(catalog::list_products::<D>));

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/v1", v1)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `db`, handing committed orders to
/// `notifier`.
pub fn create_state<D: Database>(
    db: D,
    notifier: Arc<dyn OrderNotifier>,
    order_config: OrderConfig,
) -> Arc<AppState<D>> {
    let order_service = OrderService::with_notifier(db.clone(), notifier, order_config);
    Arc::new(AppState::new(db, order_service))
}
