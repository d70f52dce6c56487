//! Order creation and reads.

mod commands;
mod service;

pub use commands::CreateOrder;
pub use service::{OrderConfig, OrderList, OrderService, PlacedOrder};
