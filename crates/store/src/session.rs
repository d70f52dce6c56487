use async_trait::async_trait;
use common::{CategoryId, CustomerId, Money, OrderId, ProductId};

use crate::{
    Category, Customer, ListFilter, NewCategory, NewCustomer, NewOrder, NewOrderItem, NewProduct,
    Order, OrderItem, OrderWithItems, Product, Result,
};

/// Customer reads and writes.
#[async_trait]
pub trait CustomerRepository: Send {
    async fn customer_by_id(&mut self, id: CustomerId) -> Result<Option<Customer>>;

    /// Looks a customer up by the exact `(email, phone_number)` pair.
    async fn customer_by_email_and_phone(
        &mut self,
        email: &str,
        phone_number: &str,
    ) -> Result<Option<Customer>>;

    /// Inserts a customer, failing with `Conflict` when the
    /// `(email, phone_number)` pair is already taken.
    async fn insert_customer(&mut self, customer: &NewCustomer) -> Result<Customer>;

    /// Inserts a customer unless the `(email, phone_number)` pair is taken.
    ///
    /// Returns `None` when another writer already holds the pair. The
    /// caller re-reads the existing row in that case.
    async fn insert_customer_if_absent(&mut self, customer: &NewCustomer)
    -> Result<Option<Customer>>;

    /// Writes every mutable column of `customer` and bumps `updated_at`.
    async fn update_customer(&mut self, customer: &Customer) -> Result<Customer>;

    /// Returns false when no row matched.
    async fn delete_customer(&mut self, id: CustomerId) -> Result<bool>;

    async fn list_customers(&mut self, shop_id: &str, filter: &ListFilter)
    -> Result<Vec<Customer>>;

    async fn count_customers(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64>;
}

/// Category and product reads and writes.
#[async_trait]
pub trait CatalogRepository: Send {
    async fn insert_category(&mut self, category: &NewCategory) -> Result<Category>;

    async fn category_by_id(&mut self, id: CategoryId) -> Result<Option<Category>>;

    /// Fails with `Conflict` while products still reference the category.
    async fn delete_category(&mut self, id: CategoryId) -> Result<bool>;

    async fn list_categories(&mut self, shop_id: &str, filter: &ListFilter)
    -> Result<Vec<Category>>;

    async fn count_categories(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64>;

    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product>;

    async fn product_by_id(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Fetches every product whose id is in `ids`. Unknown ids are skipped.
    async fn products_by_ids(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    async fn update_product(&mut self, product: &Product) -> Result<Product>;

    async fn delete_product(&mut self, id: ProductId) -> Result<bool>;

    /// Lists products whose category belongs to `shop_id`.
    async fn list_products(&mut self, shop_id: &str, filter: &ListFilter) -> Result<Vec<Product>>;

    async fn count_products(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64>;

    /// Mean retail price over a category and all of its descendants,
    /// rounded to the nearest minor unit. Zero when there are no products.
    async fn average_retail_price(&mut self, category_id: CategoryId) -> Result<Money>;
}

/// Order header and line item reads and writes.
#[async_trait]
pub trait OrderRepository: Send {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order>;

    async fn order_by_id(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Inserts one batch of line items as a single multi-row statement.
    ///
    /// Returns the number of rows written.
    async fn insert_order_items(&mut self, items: &[NewOrderItem]) -> Result<u64>;

    /// Line items of an order in insertion order.
    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// Orders of a shop, newest first.
    async fn list_orders(&mut self, shop_id: &str, filter: &ListFilter) -> Result<Vec<Order>>;

    async fn count_orders(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64>;
}

/// Extension trait providing convenience reads over orders.
#[async_trait]
pub trait OrderRepositoryExt: OrderRepository {
    /// Loads an order together with its line items.
    async fn order_with_items(&mut self, id: OrderId) -> Result<Option<OrderWithItems>> {
        let Some(order) = self.order_by_id(id).await? else {
            return Ok(None);
        };
        let items = self.order_items(id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }
}

impl<T: OrderRepository + ?Sized> OrderRepositoryExt for T {}

/// A unit of work against the database.
///
/// An ambient session runs each statement on its own. A transactional
/// session, obtained from [`Database::begin`], makes every write visible
/// only after [`Session::commit`]; dropping it without committing rolls
/// everything back.
#[async_trait]
pub trait Session: CustomerRepository + CatalogRepository + OrderRepository {
    fn is_transactional(&self) -> bool;

    /// Commits a transactional session. A no-op for ambient sessions.
    async fn commit(self) -> Result<()>;
}

/// Entry point that hands out sessions.
#[async_trait]
pub trait Database: Clone + Send + Sync + 'static {
    type Session: Session + 'static;

    /// Opens an ambient, non-transactional session.
    async fn session(&self) -> Result<Self::Session>;

    /// Opens a transactional session.
    async fn begin(&self) -> Result<Self::Session>;
}
