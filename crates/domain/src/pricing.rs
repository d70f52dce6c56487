//! Pricing requested lines against the live catalog.

use std::collections::HashMap;

use common::{Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};
use store::{CatalogRepository, NewOrderItem};

use crate::error::DomainError;

/// One requested line: a product and how many of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl LineRequest {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A line priced at the catalog's retail price at order time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub unit_price: Money,
    pub quantity: u32,
    pub total_amount: Money,
}

impl PricedLine {
    /// Binds the line to a persisted order.
    pub fn attach(&self, order_id: OrderId) -> NewOrderItem {
        NewOrderItem {
            order_id,
            product_id: self.product_id,
            unit_price: self.unit_price,
            quantity: self.quantity,
            total_amount: self.total_amount,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Priced {
    /// Priced lines in request order.
    pub lines: Vec<PricedLine>,
    pub total: Money,
}

pub(crate) fn out_of_range() -> DomainError {
    DomainError::Validation("order total out of range".into())
}

/// Prices every line at the product's current retail price.
///
/// The first line, in request order, whose product does not exist aborts
/// pricing with `NotFound`. A line or order total that does not fit in
/// `i64` minor units is a `Validation` error. Quantities are not validated
/// here.
pub async fn price_items<S>(session: &mut S, requests: &[LineRequest]) -> Result<Priced, DomainError>
where
    S: CatalogRepository + ?Sized,
{
    let mut ids: Vec<ProductId> = requests.iter().map(|r| r.product_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let prices: HashMap<ProductId, Money> = session
        .products_by_ids(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p.retail_price))
        .collect();

    let mut priced = Priced {
        lines: Vec::with_capacity(requests.len()),
        total: Money::zero(),
    };

    for request in requests {
        let Some(&unit_price) = prices.get(&request.product_id) else {
            tracing::warn!(product_id = %request.product_id, "unknown product in order");
            return Err(DomainError::not_found("product", request.product_id));
        };

        let total_amount = unit_price
            .checked_multiply(request.quantity)
            .ok_or_else(out_of_range)?;
        priced.total = priced.total.checked_add(total_amount).ok_or_else(out_of_range)?;
        priced.lines.push(PricedLine {
            product_id: request.product_id,
            unit_price,
            quantity: request.quantity,
            total_amount,
        });
    }

    Ok(priced)
}

#[cfg(test)]
mod tests {
    use common::ProductType;
    use store::{Database, InMemoryDatabase, NewCategory, NewProduct, Product};

    use super::*;

    async fn seed(db: &InMemoryDatabase, prices: &[i64]) -> Vec<Product> {
        let mut session = db.session().await.unwrap();
        let category = session
            .insert_category(&NewCategory {
                name: "General".to_string(),
                parent_id: None,
                shop_id: Some("s1".to_string()),
            })
            .await
            .unwrap();

        let mut products = Vec::new();
        for &price in prices {
            let product = session
                .insert_product(&NewProduct {
                    name: format!("P{price}"),
                    description: None,
                    wholesale_price: Money::zero(),
                    retail_price: Money::from_minor(price),
                    category_id: category.id,
                    product_image: None,
                    product_type: ProductType::Goods,
                    stock: 0,
                })
                .await
                .unwrap();
            products.push(product);
        }
        products
    }

    #[tokio::test]
    async fn totals_follow_catalog_prices() {
        let db = InMemoryDatabase::new();
        let products = seed(&db, &[10, 5]).await;
        let mut session = db.session().await.unwrap();

        let priced = price_items(
            &mut session,
            &[
                LineRequest::new(products[0].id, 2),
                LineRequest::new(products[1].id, 1),
            ],
        )
        .await
        .unwrap();

        assert_eq!(priced.total, Money::from_minor(25));
        let totals: Vec<i64> = priced.lines.iter().map(|l| l.total_amount.minor()).collect();
        assert_eq!(totals, vec![20, 5]);
    }

    #[tokio::test]
    async fn total_is_independent_of_line_order() {
        let db = InMemoryDatabase::new();
        let products = seed(&db, &[10, 5, 333]).await;
        let mut session = db.session().await.unwrap();

        let forward: Vec<LineRequest> = products
            .iter()
            .zip([3, 1, 2])
            .map(|(p, q)| LineRequest::new(p.id, q))
            .collect();
        let mut backward = forward.clone();
        backward.reverse();

        let a = price_items(&mut session, &forward).await.unwrap();
        let b = price_items(&mut session, &backward).await.unwrap();
        assert_eq!(a.total, b.total);
        assert_eq!(a.total, Money::from_minor(30 + 5 + 666));
        assert_eq!(b.lines[0].product_id, products[2].id);
    }

    #[tokio::test]
    async fn unknown_product_aborts() {
        let db = InMemoryDatabase::new();
        let products = seed(&db, &[10]).await;
        let mut session = db.session().await.unwrap();

        let err = price_items(
            &mut session,
            &[
                LineRequest::new(products[0].id, 1),
                LineRequest::new(ProductId::new(404), 1),
            ],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn overflowing_line_is_rejected() {
        let db = InMemoryDatabase::new();
        let products = seed(&db, &[5_000_000_000]).await;
        let mut session = db.session().await.unwrap();

        let err = price_items(&mut session, &[LineRequest::new(products[0].id, u32::MAX)])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref m) if m == "order total out of range"));
    }

    #[tokio::test]
    async fn overflowing_sum_is_rejected() {
        let db = InMemoryDatabase::new();
        let products = seed(&db, &[i64::MAX / 2 + 1]).await;
        let mut session = db.session().await.unwrap();

        let line = LineRequest::new(products[0].id, 1);
        let err = price_items(&mut session, &[line, line]).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_request_prices_to_zero() {
        let db = InMemoryDatabase::new();
        let mut session = db.session().await.unwrap();
        let priced = price_items(&mut session, &[]).await.unwrap();
        assert!(priced.lines.is_empty());
        assert!(priced.total.is_zero());
    }
}
