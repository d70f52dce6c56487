//! Domain layer for the point-of-sale backend.
//!
//! This crate provides:
//! - `OrderService`, which creates orders in a single transaction
//! - pricing of requested lines against the live catalog
//! - order reference codes and line-item batching
//! - customer resolution plus the customer and catalog services
//! - the `OrderNotifier` port notification delivery plugs into

pub mod batch;
pub mod catalog;
pub mod customer;
pub mod error;
pub mod notifier;
pub mod order;
pub mod pricing;
pub mod reference;

pub use batch::{DEFAULT_ITEM_BATCH_SIZE, batch_count, batches};
pub use catalog::{CatalogService, CategoryList, ProductList};
pub use customer::{CustomerList, CustomerResolution, CustomerService, resolve_customer};
pub use error::{DomainError, OrderStage};
pub use notifier::{NoopNotifier, OrderNotifier, RecordingNotifier};
pub use order::{CreateOrder, OrderConfig, OrderList, OrderService, PlacedOrder};
pub use pricing::{LineRequest, Priced, PricedLine, price_items};
pub use reference::generate_reference;
