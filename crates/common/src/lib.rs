//! Shared types for the point-of-sale backend.
//!
//! Everything here is storage- and transport-agnostic: identifiers are
//! plain sequential integers, money is kept in integer minor units, and the
//! closed enumerations know their own storage strings.

pub mod kinds;
pub mod money;
pub mod pagination;
pub mod types;

pub use kinds::{CustomerType, OrderMedium, OrderStatus, ParseKindError, PaymentMethod, ProductType};
pub use money::Money;
pub use pagination::Pagination;
pub use types::{CategoryId, CustomerId, OrderId, ParseIdError, ProductId};
