//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use domain::{OrderConfig, RecordingNotifier};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryDatabase;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    db: InMemoryDatabase,
    notifier: RecordingNotifier,
}

fn setup() -> TestApp {
    let db = InMemoryDatabase::new();
    let notifier = RecordingNotifier::new();
    let state = api::create_state(
        db.clone(),
        Arc::new(notifier.clone()),
        OrderConfig::default(),
    );
    let app = api::create_app(state, get_metrics_handle());
    TestApp { app, db, notifier }
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.send(method, uri, body).await;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    /// Creates a category for shop `s1` and one product per retail price.
    async fn seed_products(&self, prices: &[i64]) -> (i64, Vec<i64>) {
        let (status, category) = self
            .call(
                "POST",
                "/v1/categories",
                Some(json!({ "name": "General", "shop_id": "s1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let category_id = category["id"].as_i64().unwrap();

        let mut ids = Vec::new();
        for price in prices {
            let (status, product) = self
                .call(
                    "POST",
                    "/v1/products",
                    Some(json!({
                        "name": format!("Product {price}"),
                        "retail_price": price,
                        "wholesale_price": 1,
                        "category_id": category_id,
                        "stock": 10
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(product["id"].as_i64().unwrap());
        }
        (category_id, ids)
    }
}

fn order_body(items: Value) -> Value {
    json!({
        "shop_id": "s1",
        "phone": "+254712345678",
        "customer_email": "a@b.com",
        "customer_name": "A",
        "items": items
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = app.call("GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let response = app.send("GET", "/metrics", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn test_create_order_end_to_end() {
        let app = setup();
        let (_, ids) = app.seed_products(&[10, 5]).await;

        let (status, order) = app
            .call(
                "POST",
                "/v1/orders",
                Some(order_body(json!([
                    { "product_id": ids[0], "qty": 2 },
                    { "product_id": ids[1], "qty": 1 }
                ]))),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["total_amount"], 25);
        assert_eq!(order["total_items"], 2);
        assert_eq!(order["reference_number"].as_str().unwrap().len(), 13);
        assert_eq!(order["items"][0]["total_amount"], 20);
        assert_eq!(order["items"][1]["total_amount"], 5);
        assert_eq!(app.notifier.count(), 1);

        let id = order["id"].as_i64().unwrap();
        let (status, stored) = app.call("GET", &format!("/v1/orders/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stored["total_amount"], 25);
        let items = stored["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["unit_price"], 10);
        assert_eq!(items[0]["quantity"], 2);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found_and_rolls_back() {
        let app = setup();
        let (_, ids) = app.seed_products(&[10]).await;

        let (status, error) = app
            .call(
                "POST",
                "/v1/orders",
                Some(order_body(json!([
                    { "product_id": ids[0], "quantity": 1 },
                    { "product_id": 999, "quantity": 1 }
                ]))),
            )
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error_code"], "NOT_FOUND");
        assert_eq!(error["status_code"], 404);
        assert_eq!(app.db.order_count().await, 0);
        assert_eq!(app.db.customer_count().await, 0);
        assert_eq!(app.notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_zero_quantity_is_bad_request() {
        let app = setup();
        let (_, ids) = app.seed_products(&[10]).await;

        let (status, error) = app
            .call(
                "POST",
                "/v1/orders",
                Some(order_body(json!([{ "product_id": ids[0], "quantity": 0 }]))),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error_code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_overflowing_total_is_bad_request() {
        let app = setup();
        let (_, ids) = app.seed_products(&[5_000_000_000]).await;

        let (status, error) = app
            .call(
                "POST",
                "/v1/orders",
                Some(order_body(json!([{ "product_id": ids[0], "quantity": u32::MAX }]))),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error_code"], "BAD_REQUEST");
        assert!(error["error_message"].as_str().unwrap().contains("out of range"));
        assert_eq!(app.db.order_count().await, 0);
        assert_eq!(app.db.customer_count().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = setup();
        let response = app
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/orders")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"shop_id\": "))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error_code"], "BAD_REQUEST");
        assert_eq!(json["status_code"], 400);
    }

    #[tokio::test]
    async fn test_storage_failure_is_database_error_without_details() {
        let app = setup();
        let (_, ids) = app.seed_products(&[10]).await;
        app.db.set_fail_on_order_insert(true);

        let (status, error) = app
            .call(
                "POST",
                "/v1/orders",
                Some(order_body(json!([{ "product_id": ids[0], "quantity": 1 }]))),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(error["error_code"], "DATABASE_ERROR");
        assert_eq!(error["error_message"], "a database error occurred");
    }

    #[tokio::test]
    async fn test_get_order_errors() {
        let app = setup();

        let (status, _) = app.call("GET", "/v1/orders/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, error) = app.call("GET", "/v1/orders/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error_message"], "order not found: 42");
    }

    #[tokio::test]
    async fn test_shop_orders_are_paginated() {
        let app = setup();
        let (_, ids) = app.seed_products(&[10]).await;
        for _ in 0..3 {
            let (status, _) = app
                .call(
                    "POST",
                    "/v1/orders",
                    Some(order_body(json!([{ "product_id": ids[0], "quantity": 1 }]))),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, page) = app
            .call("GET", "/v1/shop/s1/orders?page=1&per=2", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["orders"].as_array().unwrap().len(), 2);
        assert_eq!(page["pagination"]["count"], 3);
        assert_eq!(page["pagination"]["num_pages"], 2);
        assert_eq!(page["pagination"]["next_page"], 2);

        let (status, _) = app.call("GET", "/v1/shop/s1/orders?page=x", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod customers {
    use super::*;

    fn customer_body() -> Value {
        json!({
            "name": "Jane",
            "email": "jane@example.com",
            "phone_number": "+254700000001",
            "shop_id": "s1"
        })
    }

    #[tokio::test]
    async fn test_customer_lifecycle() {
        let app = setup();

        let (status, created) = app.call("POST", "/v1/customers", Some(customer_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["customer_type"], "individual");
        let id = created["id"].as_i64().unwrap();

        let (status, updated) = app
            .call(
                "PUT",
                &format!("/v1/customers/{id}"),
                Some(json!({ "name": "Jane Doe", "customer_type": "business" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Jane Doe");
        assert_eq!(updated["customer_type"], "business");
        assert_eq!(updated["email"], "jane@example.com");

        let (status, list) = app
            .call("GET", "/v1/shop/s1/customers?term=doe", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["customers"].as_array().unwrap().len(), 1);

        let (status, deleted) = app
            .call("DELETE", &format!("/v1/customers/{id}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["id"], id);

        let (status, _) = app.call("GET", &format!("/v1/customers/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_customer_is_conflict() {
        let app = setup();
        app.call("POST", "/v1/customers", Some(customer_body())).await;

        let (status, error) = app.call("POST", "/v1/customers", Some(customer_body())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["error_code"], "CONFLICT");
    }
}

mod catalog {
    use super::*;

    #[tokio::test]
    async fn test_average_price_covers_subcategories() {
        let app = setup();
        let (parent, _) = app.seed_products(&[100]).await;

        let (status, child) = app
            .call(
                "POST",
                "/v1/categories",
                Some(json!({ "name": "Child", "parent_id": parent, "shop_id": "s1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = app
            .call(
                "POST",
                "/v1/products",
                Some(json!({
                    "name": "Child product",
                    "retail_price": 200,
                    "category_id": child["id"]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, avg) = app
            .call("GET", &format!("/v1/categories/{parent}/average-price"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(avg["average_price"], 150);

        let (status, _) = app
            .call("GET", "/v1/categories/999/average-price", None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_product_with_unknown_category_is_not_found() {
        let app = setup();
        let (status, _) = app
            .call(
                "POST",
                "/v1/products",
                Some(json!({ "name": "Orphan", "retail_price": 5, "category_id": 77 })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_product_update_and_listing() {
        let app = setup();
        let (category, ids) = app.seed_products(&[10, 20]).await;

        let (status, product) = app
            .call(
                "PUT",
                &format!("/v1/products/{}", ids[0]),
                Some(json!({ "retail_price": 15, "stock": 3 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(product["retail_price"], 15);
        assert_eq!(product["stock"], 3);

        let (status, list) = app
            .call(
                "GET",
                &format!("/v1/shop/s1/products?category_id={category}"),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["pagination"]["count"], 2);
    }

    #[tokio::test]
    async fn test_category_with_products_cannot_be_deleted() {
        let app = setup();
        let (category, ids) = app.seed_products(&[10]).await;

        let (status, _) = app
            .call("DELETE", &format!("/v1/categories/{category}"), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .call("DELETE", &format!("/v1/products/{}", ids[0]), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .call("DELETE", &format!("/v1/categories/{category}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, list) = app.call("GET", "/v1/shop/s1/categories", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["categories"].as_array().unwrap().len(), 0);
    }
}
