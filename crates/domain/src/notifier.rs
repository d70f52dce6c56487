//! Hand-off point between order creation and notification delivery.

use std::sync::{Arc, Mutex, PoisonError};

use crate::order::PlacedOrder;

/// Receives orders after they have been committed.
///
/// Implementations must return promptly and must not fail: delivery
/// happens elsewhere and its outcome never reaches the order caller.
pub trait OrderNotifier: Send + Sync {
    fn notify(&self, order: &PlacedOrder);
}

/// Notifier that drops every order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl OrderNotifier for NoopNotifier {
    fn notify(&self, _order: &PlacedOrder) {}
}

/// Notifier that keeps every order it receives, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    orders: Arc<Mutex<Vec<PlacedOrder>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notified(&self) -> Vec<PlacedOrder> {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl OrderNotifier for RecordingNotifier {
    fn notify(&self, order: &PlacedOrder) {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(order.clone());
    }
}

impl<T: OrderNotifier + ?Sized> OrderNotifier for Arc<T> {
    fn notify(&self, order: &PlacedOrder) {
        (**self).notify(order)
    }
}
