//! Row records and the payloads used to create them.
//!
//! `New*` payloads carry only caller-supplied columns. Identifiers and
//! timestamps are assigned by the store on insert.

use chrono::{DateTime, Utc};
use common::{
    CategoryId, CustomerId, CustomerType, Money, OrderId, OrderMedium, OrderStatus, PaymentMethod,
    ProductId, ProductType,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub customer_type: CustomerType,
    pub shop_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub customer_type: CustomerType,
    pub shop_id: String,
}

/// Partial update of a customer; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub customer_type: Option<CustomerType>,
}

impl Customer {
    pub fn apply(&mut self, update: CustomerUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(phone_number) = update.phone_number {
            self.phone_number = phone_number;
        }
        if let Some(customer_type) = update.customer_type {
            self.customer_type = customer_type;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub shop_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub shop_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub wholesale_price: Money,
    pub retail_price: Money,
    pub category_id: CategoryId,
    pub product_image: Option<String>,
    pub product_type: ProductType,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub wholesale_price: Money,
    pub retail_price: Money,
    pub category_id: CategoryId,
    pub product_image: Option<String>,
    pub product_type: ProductType,
    pub stock: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub wholesale_price: Option<Money>,
    pub retail_price: Option<Money>,
    pub category_id: Option<CategoryId>,
    pub product_image: Option<String>,
    pub product_type: Option<ProductType>,
    pub stock: Option<i64>,
}

impl Product {
    pub fn apply(&mut self, update: ProductUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if update.description.is_some() {
            self.description = update.description;
        }
        if let Some(price) = update.wholesale_price {
            self.wholesale_price = price;
        }
        if let Some(price) = update.retail_price {
            self.retail_price = price;
        }
        if let Some(category_id) = update.category_id {
            self.category_id = category_id;
        }
        if update.product_image.is_some() {
            self.product_image = update.product_image;
        }
        if let Some(product_type) = update.product_type {
            self.product_type = product_type;
        }
        if let Some(stock) = update.stock {
            self.stock = stock;
        }
    }
}

/// Persisted order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub reference_number: String,
    pub phone_number: Option<String>,
    pub order_status: OrderStatus,
    pub order_medium: OrderMedium,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<CustomerId>,
    pub shop_id: String,
    pub total_items: u32,
    pub total_amount: Money,
    pub discount: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub reference_number: String,
    pub phone_number: Option<String>,
    pub order_status: OrderStatus,
    pub order_medium: OrderMedium,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<CustomerId>,
    pub shop_id: String,
    pub total_items: u32,
    pub total_amount: Money,
    pub discount: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub unit_price: Money,
    pub quantity: u32,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub unit_price: Money,
    pub quantity: u32,
    pub total_amount: Money,
}

/// An order header together with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}
