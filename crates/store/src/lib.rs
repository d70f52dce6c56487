//! Persistence for the point-of-sale backend.
//!
//! Callers obtain a [`Session`] from a [`Database`] and use the repository
//! traits on it. The same code runs against PostgreSQL in production and
//! against [`InMemoryDatabase`] in tests.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod session;

pub use error::{Result, StoreError};
pub use memory::{CustomerRace, InMemoryDatabase, InMemorySession};
pub use model::{
    Category, Customer, CustomerUpdate, NewCategory, NewCustomer, NewOrder, NewOrderItem,
    NewProduct, Order, OrderItem, OrderWithItems, Product, ProductUpdate,
};
pub use postgres::{MAX_ORDER_ITEMS_PER_BATCH, PgDatabase, PgSession};
pub use query::ListFilter;
pub use session::{
    CatalogRepository, CustomerRepository, Database, OrderRepository, OrderRepositoryExt, Session,
};
