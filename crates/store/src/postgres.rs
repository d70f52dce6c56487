use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use common::{CategoryId, CustomerId, Money, OrderId, ParseKindError, ProductId};
use sqlx::{
    PgConnection, PgPool, Postgres, QueryBuilder, Row, Transaction, pool::PoolConnection,
    postgres::PgRow,
};

use crate::{
    Category, CatalogRepository, Customer, CustomerRepository, Database, ListFilter, NewCategory,
    NewCustomer, NewOrder, NewOrderItem, NewProduct, Order, OrderItem, OrderRepository, Product,
    Result, Session, StoreError,
};

/// Columns written per line item in a batch insert.
pub const ORDER_ITEM_COLUMNS: usize = 7;

/// Largest batch that fits the PostgreSQL bind parameter limit.
pub const MAX_ORDER_ITEMS_PER_BATCH: usize = u16::MAX as usize / ORDER_ITEM_COLUMNS;

const CUSTOMER_COLUMNS: &str =
    "id, name, email, phone_number, customer_type, shop_id, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, name, parent_id, shop_id, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.wholesale_price, p.retail_price, \
     p.category_id, p.product_image, p.product_type, p.stock, p.created_at, p.updated_at";

const ORDER_COLUMNS: &str = "id, reference_number, phone_number, order_status, order_medium, \
     payment_method, customer_id, shop_id, total_items, total_amount, discount, created_at, updated_at";

const ORDER_ITEM_SELECT: &str = "id, order_id, product_id, unit_price, quantity, total_amount, \
     created_at, updated_at";

/// PostgreSQL-backed database.
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Session = PgSession;

    async fn session(&self) -> Result<PgSession> {
        let conn = self.pool.acquire().await?;
        Ok(PgSession {
            conn: Conn::Ambient(conn),
        })
    }

    async fn begin(&self) -> Result<PgSession> {
        let tx = self.pool.begin().await?;
        tracing::trace!("transaction started");
        Ok(PgSession {
            conn: Conn::Transaction(tx),
        })
    }
}

enum Conn {
    Ambient(PoolConnection<Postgres>),
    Transaction(Transaction<'static, Postgres>),
}

/// A pooled connection, optionally inside an open transaction.
///
/// Dropping an uncommitted transactional session rolls it back.
pub struct PgSession {
    conn: Conn,
}

impl PgSession {
    fn conn(&mut self) -> &mut PgConnection {
        match &mut self.conn {
            Conn::Ambient(conn) => &mut **conn,
            Conn::Transaction(tx) => &mut **tx,
        }
    }
}

#[async_trait]
impl Session for PgSession {
    fn is_transactional(&self) -> bool {
        matches!(self.conn, Conn::Transaction(_))
    }

    async fn commit(self) -> Result<()> {
        if let Conn::Transaction(tx) = self.conn {
            tx.commit().await?;
            tracing::trace!("transaction committed");
        }
        Ok(())
    }
}

fn kind<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: FromStr<Err = ParseKindError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: ParseKindError| StoreError::Decode(e.to_string()))
}

fn count_column(row: &PgRow, column: &str) -> Result<u32> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| StoreError::Decode(format!("{column} out of range: {raw}")))
}

fn row_to_customer(row: PgRow) -> Result<Customer> {
    Ok(Customer {
        id: CustomerId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone_number: row.try_get("phone_number")?,
        customer_type: kind(&row, "customer_type")?,
        shop_id: row.try_get("shop_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_category(row: PgRow) -> Result<Category> {
    Ok(Category {
        id: CategoryId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        parent_id: row
            .try_get::<Option<i64>, _>("parent_id")?
            .map(CategoryId::new),
        shop_id: row.try_get("shop_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        wholesale_price: Money::from_minor(row.try_get("wholesale_price")?),
        retail_price: Money::from_minor(row.try_get("retail_price")?),
        category_id: CategoryId::new(row.try_get("category_id")?),
        product_image: row.try_get("product_image")?,
        product_type: kind(&row, "product_type")?,
        stock: row.try_get("stock")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        reference_number: row.try_get("reference_number")?,
        phone_number: row.try_get("phone_number")?,
        order_status: kind(&row, "order_status")?,
        order_medium: kind(&row, "order_medium")?,
        payment_method: kind(&row, "payment_method")?,
        customer_id: row
            .try_get::<Option<i64>, _>("customer_id")?
            .map(CustomerId::new),
        shop_id: row.try_get("shop_id")?,
        total_items: count_column(&row, "total_items")?,
        total_amount: Money::from_minor(row.try_get("total_amount")?),
        discount: row
            .try_get::<Option<i64>, _>("discount")?
            .map(Money::from_minor),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: row.try_get("id")?,
        order_id: OrderId::new(row.try_get("order_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        unit_price: Money::from_minor(row.try_get("unit_price")?),
        quantity: count_column(&row, "quantity")?,
        total_amount: Money::from_minor(row.try_get("total_amount")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, filter: &ListFilter) {
    if let Some((limit, offset)) = filter.limit_offset() {
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);
    }
}

fn push_customer_filter(qb: &mut QueryBuilder<'_, Postgres>, shop_id: &str, filter: &ListFilter) {
    qb.push(" WHERE shop_id = ").push_bind(shop_id.to_string());
    if let Some(pattern) = filter.like_pattern() {
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone_number ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_category_filter(qb: &mut QueryBuilder<'_, Postgres>, shop_id: &str, filter: &ListFilter) {
    qb.push(" WHERE shop_id = ").push_bind(shop_id.to_string());
    if let Some(pattern) = filter.like_pattern() {
        qb.push(" AND name ILIKE ").push_bind(pattern);
    }
}

fn push_product_filter(qb: &mut QueryBuilder<'_, Postgres>, shop_id: &str, filter: &ListFilter) {
    qb.push(" FROM products p JOIN categories c ON c.id = p.category_id WHERE c.shop_id = ")
        .push_bind(shop_id.to_string());
    if let Some(category_id) = filter.category_id {
        qb.push(" AND p.category_id = ")
            .push_bind(category_id.as_i64());
    }
    if let Some(pattern) = filter.like_pattern() {
        qb.push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_order_filter(qb: &mut QueryBuilder<'_, Postgres>, shop_id: &str, filter: &ListFilter) {
    qb.push(" WHERE shop_id = ").push_bind(shop_id.to_string());
    if let Some(pattern) = filter.like_pattern() {
        qb.push(" AND (reference_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone_number ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn to_count(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or_default()
}

#[async_trait]
impl CustomerRepository for PgSession {
    async fn customer_by_id(&mut self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(self.conn())
        .await?;

        row.map(row_to_customer).transpose()
    }

    async fn customer_by_email_and_phone(
        &mut self,
        email: &str,
        phone_number: &str,
    ) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE email = $1 AND phone_number = $2"
        ))
        .bind(email)
        .bind(phone_number)
        .fetch_optional(self.conn())
        .await?;

        row.map(row_to_customer).transpose()
    }

    async fn insert_customer(&mut self, customer: &NewCustomer) -> Result<Customer> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO customers (name, email, phone_number, customer_type, shop_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone_number)
        .bind(customer.customer_type.as_str())
        .bind(&customer.shop_id)
        .bind(now)
        .fetch_one(self.conn())
        .await
        .map_err(|e| StoreError::from_write("customer", e))?;

        row_to_customer(row)
    }

    async fn insert_customer_if_absent(
        &mut self,
        customer: &NewCustomer,
    ) -> Result<Option<Customer>> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO customers (name, email, phone_number, customer_type, shop_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (email, phone_number) DO NOTHING
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone_number)
        .bind(customer.customer_type.as_str())
        .bind(&customer.shop_id)
        .bind(now)
        .fetch_optional(self.conn())
        .await?;

        row.map(row_to_customer).transpose()
    }

    async fn update_customer(&mut self, customer: &Customer) -> Result<Customer> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE customers
            SET name = $2, email = $3, phone_number = $4, customer_type = $5, updated_at = $6
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(customer.id.as_i64())
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone_number)
        .bind(customer.customer_type.as_str())
        .bind(Utc::now())
        .fetch_optional(self.conn())
        .await
        .map_err(|e| StoreError::from_write("customer", e))?;

        match row {
            Some(row) => row_to_customer(row),
            None => Err(StoreError::not_found("customer", customer.id)),
        }
    }

    async fn delete_customer(&mut self, id: CustomerId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id.as_i64())
            .execute(self.conn())
            .await
            .map_err(|e| StoreError::from_write("customer", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_customers(
        &mut self,
        shop_id: &str,
        filter: &ListFilter,
    ) -> Result<Vec<Customer>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {CUSTOMER_COLUMNS} FROM customers"));
        push_customer_filter(&mut qb, shop_id, filter);
        qb.push(" ORDER BY id");
        push_page(&mut qb, filter);

        let rows = qb.build().fetch_all(self.conn()).await?;
        rows.into_iter().map(row_to_customer).collect()
    }

    async fn count_customers(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customers");
        push_customer_filter(&mut qb, shop_id, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(self.conn()).await?;
        Ok(to_count(count))
    }
}

#[async_trait]
impl CatalogRepository for PgSession {
    async fn insert_category(&mut self, category: &NewCategory) -> Result<Category> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO categories (name, parent_id, shop_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(&category.name)
        .bind(category.parent_id.map(|id| id.as_i64()))
        .bind(&category.shop_id)
        .bind(now)
        .fetch_one(self.conn())
        .await
        .map_err(|e| StoreError::from_write("category", e))?;

        row_to_category(row)
    }

    async fn category_by_id(&mut self, id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(self.conn())
        .await?;

        row.map(row_to_category).transpose()
    }

    async fn delete_category(&mut self, id: CategoryId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_i64())
            .execute(self.conn())
            .await
            .map_err(|e| StoreError::from_write("category", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_categories(
        &mut self,
        shop_id: &str,
        filter: &ListFilter,
    ) -> Result<Vec<Category>> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {CATEGORY_COLUMNS} FROM categories"));
        push_category_filter(&mut qb, shop_id, filter);
        qb.push(" ORDER BY id");
        push_page(&mut qb, filter);

        let rows = qb.build().fetch_all(self.conn()).await?;
        rows.into_iter().map(row_to_category).collect()
    }

    async fn count_categories(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM categories");
        push_category_filter(&mut qb, shop_id, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(self.conn()).await?;
        Ok(to_count(count))
    }

    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products AS p (name, description, wholesale_price, retail_price, category_id,
                                       product_image, product_type, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.wholesale_price.minor())
        .bind(product.retail_price.minor())
        .bind(product.category_id.as_i64())
        .bind(&product.product_image)
        .bind(product.product_type.as_str())
        .bind(product.stock)
        .bind(now)
        .fetch_one(self.conn())
        .await
        .map_err(|e| StoreError::from_write("product", e))?;

        row_to_product(row)
    }

    async fn product_by_id(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(self.conn())
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn products_by_ids(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();

        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ANY($1)"
        ))
        .bind(&raw)
        .fetch_all(self.conn())
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn update_product(&mut self, product: &Product) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products AS p
            SET name = $2, description = $3, wholesale_price = $4, retail_price = $5,
                category_id = $6, product_image = $7, product_type = $8, stock = $9, updated_at = $10
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id.as_i64())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.wholesale_price.minor())
        .bind(product.retail_price.minor())
        .bind(product.category_id.as_i64())
        .bind(&product.product_image)
        .bind(product.product_type.as_str())
        .bind(product.stock)
        .bind(Utc::now())
        .fetch_optional(self.conn())
        .await
        .map_err(|e| StoreError::from_write("product", e))?;

        match row {
            Some(row) => row_to_product(row),
            None => Err(StoreError::not_found("product", product.id)),
        }
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(self.conn())
            .await
            .map_err(|e| StoreError::from_write("product", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_products(&mut self, shop_id: &str, filter: &ListFilter) -> Result<Vec<Product>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS}"));
        push_product_filter(&mut qb, shop_id, filter);
        qb.push(" ORDER BY p.id");
        push_page(&mut qb, filter);

        let rows = qb.build().fetch_all(self.conn()).await?;
        rows.into_iter().map(row_to_product).collect()
    }

    async fn count_products(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_product_filter(&mut qb, shop_id, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(self.conn()).await?;
        Ok(to_count(count))
    }

    async fn average_retail_price(&mut self, category_id: CategoryId) -> Result<Money> {
        let average: i64 = sqlx::query_scalar(
            r#"
            WITH RECURSIVE tree AS (
                SELECT id FROM categories WHERE id = $1
                UNION
                SELECT c.id FROM categories c JOIN tree t ON c.parent_id = t.id
            )
            SELECT COALESCE(ROUND(AVG(p.retail_price)), 0)::BIGINT
            FROM products p
            WHERE p.category_id IN (SELECT id FROM tree)
            "#,
        )
        .bind(category_id.as_i64())
        .fetch_one(self.conn())
        .await?;

        Ok(Money::from_minor(average))
    }
}

#[async_trait]
impl OrderRepository for PgSession {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (reference_number, phone_number, order_status, order_medium,
                                payment_method, customer_id, shop_id, total_items, total_amount,
                                discount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&order.reference_number)
        .bind(&order.phone_number)
        .bind(order.order_status.as_str())
        .bind(order.order_medium.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.customer_id.map(|id| id.as_i64()))
        .bind(&order.shop_id)
        .bind(i64::from(order.total_items))
        .bind(order.total_amount.minor())
        .bind(order.discount.map(|d| d.minor()))
        .bind(now)
        .fetch_one(self.conn())
        .await
        .map_err(|e| StoreError::from_write("order", e))?;

        row_to_order(row)
    }

    async fn order_by_id(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(self.conn())
            .await?;

        row.map(row_to_order).transpose()
    }

    #[tracing::instrument(skip(self, items), fields(rows = items.len()))]
    async fn insert_order_items(&mut self, items: &[NewOrderItem]) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO order_items (order_id, product_id, unit_price, quantity, total_amount, created_at, updated_at) ",
        );
        qb.push_values(items, |mut b, item| {
            b.push_bind(item.order_id.as_i64())
                .push_bind(item.product_id.as_i64())
                .push_bind(item.unit_price.minor())
                .push_bind(i64::from(item.quantity))
                .push_bind(item.total_amount.minor())
                .push_bind(now)
                .push_bind(now);
        });

        let result = qb
            .build()
            .execute(self.conn())
            .await
            .map_err(|e| StoreError::from_write("order item", e))?;

        Ok(result.rows_affected())
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_SELECT} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id.as_i64())
        .fetch_all(self.conn())
        .await?;

        rows.into_iter().map(row_to_order_item).collect()
    }

    async fn list_orders(&mut self, shop_id: &str, filter: &ListFilter) -> Result<Vec<Order>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        push_order_filter(&mut qb, shop_id, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut qb, filter);

        let rows = qb.build().fetch_all(self.conn()).await?;
        rows.into_iter().map(row_to_order).collect()
    }

    async fn count_orders(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_order_filter(&mut qb, shop_id, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(self.conn()).await?;
        Ok(to_count(count))
    }
}
