use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{CategoryId, CustomerId, Money, OrderId, ProductId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Category, CatalogRepository, Customer, CustomerRepository, Database, ListFilter, NewCategory,
    NewCustomer, NewOrder, NewOrderItem, NewProduct, Order, OrderItem, OrderRepository, Product,
    Result, Session, StoreError,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    customers: BTreeMap<i64, Customer>,
    categories: BTreeMap<i64, Category>,
    products: BTreeMap<i64, Product>,
    orders: BTreeMap<i64, Order>,
    order_items: Vec<OrderItem>,
    last_id: i64,
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_item_batch: Option<usize>,
    fail_on_customer_insert: bool,
    fail_on_order_insert: bool,
    customer_race: Option<CustomerRace>,
    commit_delay: Option<Duration>,
}

/// How a simulated concurrent writer wins `insert_customer_if_absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerRace {
    /// The other writer's row is stored, so a re-read finds it.
    Visible,
    /// The insert is skipped but no row ever shows up.
    Vanished,
}

/// In-memory database for tests.
///
/// Transactions are serialized: a transactional session holds the table
/// lock until it is committed or dropped, and restores the state it started
/// from when dropped uncommitted. Ambient sessions lock per statement.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<RwLock<Faults>>,
    item_batches: Arc<RwLock<Vec<usize>>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `n`-th `insert_order_items` call (1-based) of every
    /// session. `None` disables the fault.
    pub fn set_fail_on_item_batch(&self, n: Option<usize>) {
        self.faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_item_batch = n;
    }

    /// Configures every customer insert to fail.
    pub fn set_fail_on_customer_insert(&self, fail: bool) {
        self.faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_customer_insert = fail;
    }

    /// Configures every order header insert to fail.
    pub fn set_fail_on_order_insert(&self, fail: bool) {
        self.faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_order_insert = fail;
    }

    /// Makes `insert_customer_if_absent` report that another writer already
    /// holds the pair. `None` disables the fault.
    pub fn set_customer_race(&self, race: Option<CustomerRace>) {
        self.faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .customer_race = race;
    }

    /// Delays every transaction commit by `delay`.
    pub fn set_commit_delay(&self, delay: Option<Duration>) {
        self.faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .commit_delay = delay;
    }

    /// Sizes of every `insert_order_items` call so far, in call order.
    pub fn item_batch_sizes(&self) -> Vec<usize> {
        self.item_batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn customer_count(&self) -> usize {
        self.tables.lock().await.customers.len()
    }

    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    pub async fn order_item_count(&self) -> usize {
        self.tables.lock().await.order_items.len()
    }

    fn session_with(&self, state: SessionState) -> InMemorySession {
        InMemorySession {
            state,
            faults: self.faults.clone(),
            item_batches: self.item_batches.clone(),
            item_batch_calls: 0,
        }
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    type Session = InMemorySession;

    async fn session(&self) -> Result<InMemorySession> {
        Ok(self.session_with(SessionState::Ambient(self.tables.clone())))
    }

    async fn begin(&self) -> Result<InMemorySession> {
        let guard = self.tables.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(self.session_with(SessionState::Transaction(Pending {
            guard,
            snapshot: Some(snapshot),
        })))
    }
}

struct Pending {
    guard: OwnedMutexGuard<Tables>,
    snapshot: Option<Tables>,
}

impl Drop for Pending {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
            tracing::trace!("in-memory transaction rolled back");
        }
    }
}

enum SessionState {
    Ambient(Arc<Mutex<Tables>>),
    Transaction(Pending),
}

pub struct InMemorySession {
    state: SessionState,
    faults: Arc<RwLock<Faults>>,
    item_batches: Arc<RwLock<Vec<usize>>>,
    item_batch_calls: usize,
}

impl InMemorySession {
    async fn with_tables<R>(&mut self, f: impl FnOnce(&mut Tables) -> R + Send) -> R {
        match &mut self.state {
            SessionState::Ambient(tables) => {
                let mut guard = tables.lock().await;
                f(&mut guard)
            }
            SessionState::Transaction(pending) => f(&mut pending.guard),
        }
    }

    fn check_fault(&self, pick: impl FnOnce(&Faults) -> bool, what: &str) -> Result<()> {
        let faults = self.faults.read().unwrap_or_else(PoisonError::into_inner);
        if pick(&faults) {
            return Err(StoreError::Injected(what.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for InMemorySession {
    fn is_transactional(&self) -> bool {
        matches!(self.state, SessionState::Transaction(_))
    }

    async fn commit(mut self) -> Result<()> {
        let delay = self
            .faults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .commit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let SessionState::Transaction(pending) = &mut self.state {
            pending.snapshot = None;
        }
        Ok(())
    }
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn pair_taken(&self, email: &str, phone_number: &str, except: Option<i64>) -> bool {
        self.customers.values().any(|c| {
            c.email == email && c.phone_number == phone_number && Some(c.id.as_i64()) != except
        })
    }

    fn insert_customer(&mut self, new: &NewCustomer) -> Customer {
        let now = Utc::now();
        let customer = Customer {
            id: CustomerId::new(self.next_id()),
            name: new.name.clone(),
            email: new.email.clone(),
            phone_number: new.phone_number.clone(),
            customer_type: new.customer_type,
            shop_id: new.shop_id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.customers.insert(customer.id.as_i64(), customer.clone());
        customer
    }

    fn customers_matching(&self, shop_id: &str, filter: &ListFilter) -> Vec<Customer> {
        self.customers
            .values()
            .filter(|c| c.shop_id == shop_id)
            .filter(|c| filter.matches_term([c.name.as_str(), c.email.as_str(), c.phone_number.as_str()]))
            .cloned()
            .collect()
    }

    fn categories_matching(&self, shop_id: &str, filter: &ListFilter) -> Vec<Category> {
        self.categories
            .values()
            .filter(|c| c.shop_id.as_deref() == Some(shop_id))
            .filter(|c| filter.matches_term([c.name.as_str()]))
            .cloned()
            .collect()
    }

    fn products_matching(&self, shop_id: &str, filter: &ListFilter) -> Vec<Product> {
        self.products
            .values()
            .filter(|p| {
                self.categories
                    .get(&p.category_id.as_i64())
                    .is_some_and(|c| c.shop_id.as_deref() == Some(shop_id))
            })
            .filter(|p| filter.category_id.is_none_or(|id| p.category_id == id))
            .filter(|p| {
                filter.matches_term([p.name.as_str(), p.description.as_deref().unwrap_or("")])
            })
            .cloned()
            .collect()
    }

    fn orders_matching(&self, shop_id: &str, filter: &ListFilter) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .values()
            .filter(|o| o.shop_id == shop_id)
            .filter(|o| {
                filter.matches_term([
                    o.reference_number.as_str(),
                    o.phone_number.as_deref().unwrap_or(""),
                ])
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        orders
    }

    /// The category and every category below it.
    fn category_tree(&self, root: CategoryId) -> HashSet<CategoryId> {
        let mut tree = HashSet::from([root]);
        let mut frontier = vec![root];
        while let Some(parent) = frontier.pop() {
            for child in self.categories.values() {
                if child.parent_id == Some(parent) && tree.insert(child.id) {
                    frontier.push(child.id);
                }
            }
        }
        tree
    }
}

#[async_trait]
impl CustomerRepository for InMemorySession {
    async fn customer_by_id(&mut self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self
            .with_tables(|t| t.customers.get(&id.as_i64()).cloned())
            .await)
    }

    async fn customer_by_email_and_phone(
        &mut self,
        email: &str,
        phone_number: &str,
    ) -> Result<Option<Customer>> {
        Ok(self
            .with_tables(|t| {
                t.customers
                    .values()
                    .find(|c| c.email == email && c.phone_number == phone_number)
                    .cloned()
            })
            .await)
    }

    async fn insert_customer(&mut self, customer: &NewCustomer) -> Result<Customer> {
        self.check_fault(|f| f.fail_on_customer_insert, "customer insert")?;
        self.with_tables(|t| {
            if t.pair_taken(&customer.email, &customer.phone_number, None) {
                return Err(StoreError::conflict(
                    "customer",
                    "email and phone number already registered",
                ));
            }
            Ok(t.insert_customer(customer))
        })
        .await
    }

    async fn insert_customer_if_absent(
        &mut self,
        customer: &NewCustomer,
    ) -> Result<Option<Customer>> {
        self.check_fault(|f| f.fail_on_customer_insert, "customer insert")?;
        let race = self
            .faults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .customer_race;
        Ok(self
            .with_tables(|t| {
                match race {
                    Some(CustomerRace::Visible) => {
                        t.insert_customer(customer);
                        return None;
                    }
                    Some(CustomerRace::Vanished) => return None,
                    None => {}
                }
                if t.pair_taken(&customer.email, &customer.phone_number, None) {
                    None
                } else {
                    Some(t.insert_customer(customer))
                }
            })
            .await)
    }

    async fn update_customer(&mut self, customer: &Customer) -> Result<Customer> {
        self.with_tables(|t| {
            let id = customer.id.as_i64();
            if !t.customers.contains_key(&id) {
                return Err(StoreError::not_found("customer", customer.id));
            }
            if t.pair_taken(&customer.email, &customer.phone_number, Some(id)) {
                return Err(StoreError::conflict(
                    "customer",
                    "email and phone number already registered",
                ));
            }
            let mut updated = customer.clone();
            updated.updated_at = Utc::now();
            t.customers.insert(id, updated.clone());
            Ok(updated)
        })
        .await
    }

    async fn delete_customer(&mut self, id: CustomerId) -> Result<bool> {
        Ok(self
            .with_tables(|t| {
                let removed = t.customers.remove(&id.as_i64()).is_some();
                for order in t.orders.values_mut() {
                    if order.customer_id == Some(id) {
                        order.customer_id = None;
                    }
                }
                removed
            })
            .await)
    }

    async fn list_customers(
        &mut self,
        shop_id: &str,
        filter: &ListFilter,
    ) -> Result<Vec<Customer>> {
        Ok(self
            .with_tables(|t| filter.paginate(t.customers_matching(shop_id, filter)))
            .await)
    }

    async fn count_customers(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64> {
        Ok(self
            .with_tables(|t| t.customers_matching(shop_id, filter).len() as u64)
            .await)
    }
}

#[async_trait]
impl CatalogRepository for InMemorySession {
    async fn insert_category(&mut self, category: &NewCategory) -> Result<Category> {
        self.with_tables(|t| {
            if let Some(parent) = category.parent_id
                && !t.categories.contains_key(&parent.as_i64())
            {
                return Err(StoreError::conflict(
                    "category",
                    format!("parent category {parent} does not exist"),
                ));
            }
            let now = Utc::now();
            let created = Category {
                id: CategoryId::new(t.next_id()),
                name: category.name.clone(),
                parent_id: category.parent_id,
                shop_id: category.shop_id.clone(),
                created_at: now,
                updated_at: now,
            };
            t.categories.insert(created.id.as_i64(), created.clone());
            Ok(created)
        })
        .await
    }

    async fn category_by_id(&mut self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self
            .with_tables(|t| t.categories.get(&id.as_i64()).cloned())
            .await)
    }

    async fn delete_category(&mut self, id: CategoryId) -> Result<bool> {
        self.with_tables(|t| {
            if t.products.values().any(|p| p.category_id == id) {
                return Err(StoreError::conflict(
                    "category",
                    format!("category {id} still has products"),
                ));
            }
            let removed = t.categories.remove(&id.as_i64()).is_some();
            for child in t.categories.values_mut() {
                if child.parent_id == Some(id) {
                    child.parent_id = None;
                }
            }
            Ok(removed)
        })
        .await
    }

    async fn list_categories(
        &mut self,
        shop_id: &str,
        filter: &ListFilter,
    ) -> Result<Vec<Category>> {
        Ok(self
            .with_tables(|t| filter.paginate(t.categories_matching(shop_id, filter)))
            .await)
    }

    async fn count_categories(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64> {
        Ok(self
            .with_tables(|t| t.categories_matching(shop_id, filter).len() as u64)
            .await)
    }

    async fn insert_product(&mut self, product: &NewProduct) -> Result<Product> {
        self.with_tables(|t| {
            if !t.categories.contains_key(&product.category_id.as_i64()) {
                return Err(StoreError::conflict(
                    "product",
                    format!("category {} does not exist", product.category_id),
                ));
            }
            let now = Utc::now();
            let created = Product {
                id: ProductId::new(t.next_id()),
                name: product.name.clone(),
                description: product.description.clone(),
                wholesale_price: product.wholesale_price,
                retail_price: product.retail_price,
                category_id: product.category_id,
                product_image: product.product_image.clone(),
                product_type: product.product_type,
                stock: product.stock,
                created_at: now,
                updated_at: now,
            };
            t.products.insert(created.id.as_i64(), created.clone());
            Ok(created)
        })
        .await
    }

    async fn product_by_id(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self
            .with_tables(|t| t.products.get(&id.as_i64()).cloned())
            .await)
    }

    async fn products_by_ids(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        Ok(self
            .with_tables(|t| {
                let wanted: HashSet<i64> = ids.iter().map(|id| id.as_i64()).collect();
                t.products
                    .values()
                    .filter(|p| wanted.contains(&p.id.as_i64()))
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn update_product(&mut self, product: &Product) -> Result<Product> {
        self.with_tables(|t| {
            let id = product.id.as_i64();
            if !t.products.contains_key(&id) {
                return Err(StoreError::not_found("product", product.id));
            }
            if !t.categories.contains_key(&product.category_id.as_i64()) {
                return Err(StoreError::conflict(
                    "product",
                    format!("category {} does not exist", product.category_id),
                ));
            }
            let mut updated = product.clone();
            updated.updated_at = Utc::now();
            t.products.insert(id, updated.clone());
            Ok(updated)
        })
        .await
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        self.with_tables(|t| {
            if t.order_items.iter().any(|i| i.product_id == id) {
                return Err(StoreError::conflict(
                    "product",
                    format!("product {id} is referenced by orders"),
                ));
            }
            Ok(t.products.remove(&id.as_i64()).is_some())
        })
        .await
    }

    async fn list_products(&mut self, shop_id: &str, filter: &ListFilter) -> Result<Vec<Product>> {
        Ok(self
            .with_tables(|t| filter.paginate(t.products_matching(shop_id, filter)))
            .await)
    }

    async fn count_products(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64> {
        Ok(self
            .with_tables(|t| t.products_matching(shop_id, filter).len() as u64)
            .await)
    }

    async fn average_retail_price(&mut self, category_id: CategoryId) -> Result<Money> {
        Ok(self
            .with_tables(|t| {
                let tree = t.category_tree(category_id);
                let prices: Vec<i64> = t
                    .products
                    .values()
                    .filter(|p| tree.contains(&p.category_id))
                    .map(|p| p.retail_price.minor())
                    .collect();
                if prices.is_empty() {
                    return Money::zero();
                }
                let n = prices.len() as i128;
                let sum: i128 = prices.iter().map(|&p| i128::from(p)).sum();
                // Half away from zero; retail prices are never negative.
                Money::from_minor(((sum * 2 + n) / (n * 2)) as i64)
            })
            .await)
    }
}

#[async_trait]
impl OrderRepository for InMemorySession {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order> {
        self.check_fault(|f| f.fail_on_order_insert, "order insert")?;
        self.with_tables(|t| {
            if let Some(customer_id) = order.customer_id
                && !t.customers.contains_key(&customer_id.as_i64())
            {
                return Err(StoreError::conflict(
                    "order",
                    format!("customer {customer_id} does not exist"),
                ));
            }
            let now = Utc::now();
            let created = Order {
                id: OrderId::new(t.next_id()),
                reference_number: order.reference_number.clone(),
                phone_number: order.phone_number.clone(),
                order_status: order.order_status,
                order_medium: order.order_medium,
                payment_method: order.payment_method,
                customer_id: order.customer_id,
                shop_id: order.shop_id.clone(),
                total_items: order.total_items,
                total_amount: order.total_amount,
                discount: order.discount,
                created_at: now,
                updated_at: now,
            };
            t.orders.insert(created.id.as_i64(), created.clone());
            Ok(created)
        })
        .await
    }

    async fn order_by_id(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .with_tables(|t| t.orders.get(&id.as_i64()).cloned())
            .await)
    }

    async fn insert_order_items(&mut self, items: &[NewOrderItem]) -> Result<u64> {
        self.item_batch_calls += 1;
        self.item_batches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(items.len());

        let call = self.item_batch_calls;
        self.check_fault(|f| f.fail_on_item_batch == Some(call), "order item batch")?;

        self.with_tables(|t| {
            for item in items {
                if !t.orders.contains_key(&item.order_id.as_i64()) {
                    return Err(StoreError::conflict(
                        "order item",
                        format!("order {} does not exist", item.order_id),
                    ));
                }
                if !t.products.contains_key(&item.product_id.as_i64()) {
                    return Err(StoreError::conflict(
                        "order item",
                        format!("product {} does not exist", item.product_id),
                    ));
                }
            }
            let now = Utc::now();
            for item in items {
                let id = t.next_id();
                t.order_items.push(OrderItem {
                    id,
                    order_id: item.order_id,
                    product_id: item.product_id,
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                    total_amount: item.total_amount,
                    created_at: now,
                    updated_at: now,
                });
            }
            Ok(items.len() as u64)
        })
        .await
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        Ok(self
            .with_tables(|t| {
                t.order_items
                    .iter()
                    .filter(|i| i.order_id == order_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn list_orders(&mut self, shop_id: &str, filter: &ListFilter) -> Result<Vec<Order>> {
        Ok(self
            .with_tables(|t| filter.paginate(t.orders_matching(shop_id, filter)))
            .await)
    }

    async fn count_orders(&mut self, shop_id: &str, filter: &ListFilter) -> Result<u64> {
        Ok(self
            .with_tables(|t| t.orders_matching(shop_id, filter).len() as u64)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use common::{CustomerType, OrderMedium, OrderStatus, PaymentMethod, ProductType};

    use super::*;

    fn new_customer(email: &str, phone: &str) -> NewCustomer {
        NewCustomer {
            name: "Jane".to_string(),
            email: email.to_string(),
            phone_number: phone.to_string(),
            customer_type: CustomerType::Individual,
            shop_id: "shop-1".to_string(),
        }
    }

    fn new_order(customer_id: Option<CustomerId>) -> NewOrder {
        NewOrder {
            reference_number: "5CB1405090123".to_string(),
            phone_number: None,
            order_status: OrderStatus::Pending,
            order_medium: OrderMedium::Offline,
            payment_method: PaymentMethod::Cash,
            customer_id,
            shop_id: "shop-1".to_string(),
            total_items: 0,
            total_amount: Money::zero(),
            discount: None,
        }
    }

    async fn seed_product(db: &InMemoryDatabase, parent: Option<CategoryId>, price: i64) -> Product {
        let mut session = db.session().await.unwrap();
        let category = session
            .insert_category(&NewCategory {
                name: "Drinks".to_string(),
                parent_id: parent,
                shop_id: Some("shop-1".to_string()),
            })
            .await
            .unwrap();
        session
            .insert_product(&NewProduct {
                name: "Soda".to_string(),
                description: None,
                wholesale_price: Money::zero(),
                retail_price: Money::from_minor(price),
                category_id: category.id,
                product_image: None,
                product_type: ProductType::Goods,
                stock: 10,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let db = InMemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();
        assert!(tx.is_transactional());
        tx.insert_customer(&new_customer("a@x.com", "+254700000001"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.customer_count().await, 1);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let db = InMemoryDatabase::new();
        {
            let mut tx = db.begin().await.unwrap();
            tx.insert_customer(&new_customer("a@x.com", "+254700000001"))
                .await
                .unwrap();
        }
        assert_eq!(db.customer_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_pair_conflicts() {
        let db = InMemoryDatabase::new();
        let mut session = db.session().await.unwrap();
        session
            .insert_customer(&new_customer("a@x.com", "+254700000001"))
            .await
            .unwrap();

        let err = session
            .insert_customer(&new_customer("a@x.com", "+254700000001"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let absent = session
            .insert_customer_if_absent(&new_customer("a@x.com", "+254700000001"))
            .await
            .unwrap();
        assert!(absent.is_none());
        assert_eq!(db.customer_count().await, 1);
    }

    #[tokio::test]
    async fn customer_race_skips_the_insert() {
        let db = InMemoryDatabase::new();
        let mut session = db.session().await.unwrap();
        let candidate = new_customer("a@x.com", "+254700000001");

        db.set_customer_race(Some(CustomerRace::Visible));
        assert!(session.insert_customer_if_absent(&candidate).await.unwrap().is_none());
        assert_eq!(db.customer_count().await, 1);

        db.set_customer_race(Some(CustomerRace::Vanished));
        let other = new_customer("b@x.com", "+254700000002");
        assert!(session.insert_customer_if_absent(&other).await.unwrap().is_none());
        assert_eq!(db.customer_count().await, 1);
    }

    #[tokio::test]
    async fn item_batch_fault_hits_only_the_chosen_call() {
        let db = InMemoryDatabase::new();
        let product = seed_product(&db, None, 100).await;
        db.set_fail_on_item_batch(Some(2));

        let mut tx = db.begin().await.unwrap();
        let order = tx.insert_order(&new_order(None)).await.unwrap();
        let item = NewOrderItem {
            order_id: order.id,
            product_id: product.id,
            unit_price: Money::from_minor(100),
            quantity: 1,
            total_amount: Money::from_minor(100),
        };

        assert_eq!(tx.insert_order_items(&[item.clone()]).await.unwrap(), 1);
        let err = tx.insert_order_items(&[item]).await.unwrap_err();
        assert!(matches!(err, StoreError::Injected(_)));
        drop(tx);

        assert_eq!(db.order_count().await, 0);
        assert_eq!(db.order_item_count().await, 0);
        assert_eq!(db.item_batch_sizes(), vec![1, 1]);
    }

    #[tokio::test]
    async fn average_includes_descendant_categories() {
        let db = InMemoryDatabase::new();
        let parent = seed_product(&db, None, 100).await;
        seed_product(&db, Some(parent.category_id), 201).await;

        let mut session = db.session().await.unwrap();
        let average = session
            .average_retail_price(parent.category_id)
            .await
            .unwrap();
        assert_eq!(average, Money::from_minor(151));
    }

    #[tokio::test]
    async fn average_of_empty_category_is_zero() {
        let db = InMemoryDatabase::new();
        let mut session = db.session().await.unwrap();
        let category = session
            .insert_category(&NewCategory {
                name: "Empty".to_string(),
                parent_id: None,
                shop_id: None,
            })
            .await
            .unwrap();

        assert_eq!(
            session.average_retail_price(category.id).await.unwrap(),
            Money::zero()
        );
    }

    #[tokio::test]
    async fn deleting_customer_detaches_orders() {
        let db = InMemoryDatabase::new();
        let mut session = db.session().await.unwrap();
        let customer = session
            .insert_customer(&new_customer("a@x.com", "+254700000001"))
            .await
            .unwrap();
        let order = session.insert_order(&new_order(Some(customer.id))).await.unwrap();

        assert!(session.delete_customer(customer.id).await.unwrap());
        let order = session.order_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(order.customer_id, None);
    }
}
