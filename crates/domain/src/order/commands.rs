//! Order commands.

use common::{CustomerType, Money, OrderMedium, OrderStatus, PaymentMethod};
use store::NewCustomer;

use crate::error::DomainError;
use crate::pricing::LineRequest;

/// Command to create a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrder {
    pub shop_id: String,
    /// Empty when the order was placed without a phone number.
    pub phone_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub order_status: OrderStatus,
    pub order_medium: OrderMedium,
    pub payment_method: PaymentMethod,
    /// Requested lines, in the order they are priced and stored.
    pub items: Vec<LineRequest>,
    pub discount: Option<Money>,
}

impl CreateOrder {
    /// Creates a pending, offline, cash order with no lines.
    pub fn new(
        shop_id: impl Into<String>,
        customer_name: impl Into<String>,
        customer_email: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            shop_id: shop_id.into(),
            phone_number: phone_number.into(),
            customer_name: customer_name.into(),
            customer_email: customer_email.into(),
            order_status: OrderStatus::Pending,
            order_medium: OrderMedium::Offline,
            payment_method: PaymentMethod::Cash,
            items: Vec::new(),
            discount: None,
        }
    }

    /// Adds a line.
    pub fn with_item(mut self, line: LineRequest) -> Self {
        self.items.push(line);
        self
    }

    pub fn with_items(mut self, lines: impl IntoIterator<Item = LineRequest>) -> Self {
        self.items.extend(lines);
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = Some(discount);
        self
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    /// The phone number, if one was given.
    pub fn phone(&self) -> Option<&str> {
        let phone = self.phone_number.trim();
        (!phone.is_empty()).then_some(phone)
    }

    /// The customer record to create when none matches email and phone.
    pub fn customer_candidate(&self) -> NewCustomer {
        NewCustomer {
            name: self.customer_name.clone(),
            email: self.customer_email.clone(),
            phone_number: self.phone_number.trim().to_string(),
            customer_type: CustomerType::Individual,
            shop_id: self.shop_id.clone(),
        }
    }

    /// Rejects commands that cannot produce a meaningful order.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.shop_id.trim().is_empty() {
            return Err(DomainError::Validation("shop id is required".into()));
        }
        if self.customer_email.trim().is_empty() {
            return Err(DomainError::Validation("customer email is required".into()));
        }
        if let Some(line) = self.items.iter().find(|l| l.quantity < 1) {
            return Err(DomainError::Validation(format!(
                "quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        if self.discount.is_some_and(|d| d.is_negative()) {
            return Err(DomainError::Validation("discount cannot be negative".into()));
        }
        Ok(())
    }
}
