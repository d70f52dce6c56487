//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{CustomerType, Money, OrderMedium, OrderStatus, PaymentMethod, ProductType};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    CatalogRepository, CustomerRepository, Database, ListFilter, NewCategory, NewCustomer,
    NewOrder, NewOrderItem, NewProduct, OrderRepository, OrderRepositoryExt, PgDatabase, Product,
    Session, StoreError,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_pos_tables.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh database with its own pool and cleared tables
async fn get_test_db() -> PgDatabase {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE order_items, orders, customers, products, categories RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();

    PgDatabase::new(pool)
}

fn new_customer(email: &str, phone: &str) -> NewCustomer {
    NewCustomer {
        name: "Jane Doe".to_string(),
        email: email.to_string(),
        phone_number: phone.to_string(),
        customer_type: CustomerType::Individual,
        shop_id: "shop-1".to_string(),
    }
}

async fn seed_product(db: &PgDatabase, price: i64) -> Product {
    let mut session = db.session().await.unwrap();
    let category = session
        .insert_category(&NewCategory {
            name: "Drinks".to_string(),
            parent_id: None,
            shop_id: Some("shop-1".to_string()),
        })
        .await
        .unwrap();
    session
        .insert_product(&NewProduct {
            name: "Soda".to_string(),
            description: Some("330ml can".to_string()),
            wholesale_price: Money::from_minor(price / 2),
            retail_price: Money::from_minor(price),
            category_id: category.id,
            product_image: None,
            product_type: ProductType::Goods,
            stock: 100,
        })
        .await
        .unwrap()
}

fn new_order(total_items: u32, total: i64) -> NewOrder {
    NewOrder {
        reference_number: "5CB1405090123".to_string(),
        phone_number: Some("+254700000001".to_string()),
        order_status: OrderStatus::Pending,
        order_medium: OrderMedium::Offline,
        payment_method: PaymentMethod::MobileMoney,
        customer_id: None,
        shop_id: "shop-1".to_string(),
        total_items,
        total_amount: Money::from_minor(total),
        discount: Some(Money::from_minor(10)),
    }
}

#[tokio::test]
#[serial]
async fn customer_insert_and_lookup() {
    let db = get_test_db().await;
    let mut session = db.session().await.unwrap();

    let created = session
        .insert_customer(&new_customer("jane@example.com", "+254700000001"))
        .await
        .unwrap();

    let by_pair = session
        .customer_by_email_and_phone("jane@example.com", "+254700000001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_pair.id, created.id);
    assert_eq!(by_pair.customer_type, CustomerType::Individual);
}

#[tokio::test]
#[serial]
async fn duplicate_customer_pair_is_a_conflict() {
    let db = get_test_db().await;
    let mut session = db.session().await.unwrap();
    let customer = new_customer("jane@example.com", "+254700000001");

    session.insert_customer(&customer).await.unwrap();
    let err = session.insert_customer(&customer).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    let skipped = session.insert_customer_if_absent(&customer).await.unwrap();
    assert!(skipped.is_none());
}

#[tokio::test]
#[serial]
async fn uncommitted_transaction_rolls_back() {
    let db = get_test_db().await;

    {
        let mut tx = db.begin().await.unwrap();
        assert!(tx.is_transactional());
        tx.insert_customer(&new_customer("jane@example.com", "+254700000001"))
            .await
            .unwrap();
    }

    let mut session = db.session().await.unwrap();
    let count = session
        .count_customers("shop-1", &ListFilter::default())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
async fn order_with_batched_items_commits_atomically() {
    let db = get_test_db().await;
    let product = seed_product(&db, 250).await;

    let mut tx = db.begin().await.unwrap();
    let order = tx.insert_order(&new_order(3, 750)).await.unwrap();
    let items: Vec<NewOrderItem> = (0..3)
        .map(|_| NewOrderItem {
            order_id: order.id,
            product_id: product.id,
            unit_price: product.retail_price,
            quantity: 1,
            total_amount: product.retail_price,
        })
        .collect();
    assert_eq!(tx.insert_order_items(&items[..2]).await.unwrap(), 2);
    assert_eq!(tx.insert_order_items(&items[2..]).await.unwrap(), 1);
    tx.commit().await.unwrap();

    let mut session = db.session().await.unwrap();
    let loaded = session.order_with_items(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.order.payment_method, PaymentMethod::MobileMoney);
    assert_eq!(loaded.order.discount, Some(Money::from_minor(10)));
    assert_eq!(loaded.items.len(), 3);
    assert!(loaded.items.iter().all(|i| i.unit_price == Money::from_minor(250)));
}

#[tokio::test]
#[serial]
async fn item_for_unknown_product_is_rejected() {
    let db = get_test_db().await;
    let mut tx = db.begin().await.unwrap();
    let order = tx.insert_order(&new_order(1, 100)).await.unwrap();

    let err = tx
        .insert_order_items(&[NewOrderItem {
            order_id: order.id,
            product_id: common::ProductId::new(9999),
            unit_price: Money::from_minor(100),
            quantity: 1,
            total_amount: Money::from_minor(100),
        }])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
}

#[tokio::test]
#[serial]
async fn average_price_walks_the_category_tree() {
    let db = get_test_db().await;
    let mut session = db.session().await.unwrap();

    let root = session
        .insert_category(&NewCategory {
            name: "Beverages".to_string(),
            parent_id: None,
            shop_id: Some("shop-1".to_string()),
        })
        .await
        .unwrap();
    let child = session
        .insert_category(&NewCategory {
            name: "Juice".to_string(),
            parent_id: Some(root.id),
            shop_id: Some("shop-1".to_string()),
        })
        .await
        .unwrap();

    for (category_id, price) in [(root.id, 100), (child.id, 201)] {
        session
            .insert_product(&NewProduct {
                name: "Item".to_string(),
                description: None,
                wholesale_price: Money::zero(),
                retail_price: Money::from_minor(price),
                category_id,
                product_image: None,
                product_type: ProductType::Goods,
                stock: 1,
            })
            .await
            .unwrap();
    }

    assert_eq!(
        session.average_retail_price(root.id).await.unwrap(),
        Money::from_minor(151)
    );
    assert_eq!(
        session.average_retail_price(child.id).await.unwrap(),
        Money::from_minor(201)
    );
}

#[tokio::test]
#[serial]
async fn list_customers_filters_and_pages() {
    let db = get_test_db().await;
    let mut session = db.session().await.unwrap();
    for i in 0..5 {
        session
            .insert_customer(&new_customer(&format!("c{i}@example.com"), "+254700000001"))
            .await
            .unwrap();
    }

    let page = session
        .list_customers("shop-1", &ListFilter::paged(2, 2))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].email, "c2@example.com");

    let filter = ListFilter::default().with_term("C4@");
    assert_eq!(session.count_customers("shop-1", &filter).await.unwrap(), 1);
    assert_eq!(
        session
            .count_customers("other-shop", &ListFilter::default())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
#[serial]
async fn category_with_products_cannot_be_deleted() {
    let db = get_test_db().await;
    let product = seed_product(&db, 100).await;
    let mut session = db.session().await.unwrap();

    let err = session
        .delete_category(product.category_id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    assert!(session.delete_product(product.id).await.unwrap());
    assert!(session.delete_category(product.category_id).await.unwrap());
}
