//! Domain error types.

use std::time::Duration;

use store::StoreError;
use thiserror::Error;

/// Step of order creation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStage {
    Transaction,
    Customer,
    Pricing,
    Order,
    Items,
    Commit,
}

impl OrderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStage::Transaction => "transaction",
            OrderStage::Customer => "customer",
            OrderStage::Pricing => "pricing",
            OrderStage::Order => "order",
            OrderStage::Items => "items",
            OrderStage::Commit => "commit",
        }
    }

    /// Wraps a cause into [`DomainError::OrderCreation`] at this stage.
    pub fn failed<E: Into<DomainError>>(self, cause: E) -> DomainError {
        DomainError::OrderCreation {
            stage: self,
            source: Box::new(cause.into()),
        }
    }
}

impl std::fmt::Display for OrderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request was well-formed but semantically invalid.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// The order could not be created; nothing was persisted.
    #[error("Order could not be created ({stage}): {source}")]
    OrderCreation {
        stage: OrderStage,
        #[source]
        source: Box<DomainError>,
    },

    /// The order transaction did not finish in time and was rolled back.
    #[error("Order transaction timed out after {0:?}")]
    Timeout(Duration),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the innermost cause, looking through `OrderCreation`.
    pub fn root_cause(&self) -> &DomainError {
        match self {
            DomainError::OrderCreation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the failing stage for order creation errors.
    pub fn stage(&self) -> Option<OrderStage> {
        match self {
            DomainError::OrderCreation { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            StoreError::Conflict { entity, message } => {
                DomainError::Conflict(format!("{entity}: {message}"))
            }
            other => DomainError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_becomes_domain_not_found() {
        let err: DomainError = StoreError::not_found("product", 7).into();
        assert!(matches!(err, DomainError::NotFound { entity: "product", .. }));
    }

    #[test]
    fn root_cause_looks_through_stage() {
        let err = OrderStage::Pricing.failed(DomainError::not_found("product", 3));
        assert_eq!(err.stage(), Some(OrderStage::Pricing));
        assert!(matches!(err.root_cause(), DomainError::NotFound { .. }));
        assert_eq!(
            err.to_string(),
            "Order could not be created (pricing): product not found: 3"
        );
    }
}
