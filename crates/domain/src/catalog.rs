//! Categories and products.

use common::{CategoryId, Money, Pagination, ProductId};
use serde::Serialize;
use store::{
    CatalogRepository, Category, Database, ListFilter, NewCategory, NewProduct, Product,
    ProductUpdate, Session,
};

use crate::error::DomainError;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryList {
    pub categories: Vec<Category>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

fn check_prices(retail: Money, wholesale: Money) -> Result<(), DomainError> {
    if retail.is_negative() || wholesale.is_negative() {
        return Err(DomainError::Validation("prices cannot be negative".into()));
    }
    Ok(())
}

/// Service for managing the product catalog.
#[derive(Clone)]
pub struct CatalogService<D: Database> {
    db: D,
}

impl<D: Database> CatalogService<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, category), fields(name = %category.name))]
    pub async fn create_category(&self, category: NewCategory) -> Result<Category, DomainError> {
        if category.name.trim().is_empty() {
            return Err(DomainError::Validation("category name is required".into()));
        }

        let mut session = self.db.session().await?;
        if let Some(parent_id) = category.parent_id
            && session.category_by_id(parent_id).await?.is_none()
        {
            return Err(DomainError::not_found("category", parent_id));
        }

        Ok(session.insert_category(&category).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_category(&self, id: CategoryId) -> Result<Category, DomainError> {
        let mut session = self.db.session().await?;
        session
            .category_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("category", id))
    }

    /// Deletes a category that no product references.
    #[tracing::instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<Category, DomainError> {
        let mut tx = self.db.begin().await?;
        let category = tx
            .category_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("category", id))?;
        tx.delete_category(id).await?;
        tx.commit().await?;
        Ok(category)
    }

    #[tracing::instrument(skip(self, filter))]
    pub async fn list_categories(
        &self,
        shop_id: &str,
        filter: &ListFilter,
    ) -> Result<CategoryList, DomainError> {
        let mut session = self.db.session().await?;
        let categories = session.list_categories(shop_id, filter).await?;
        let count = session.count_categories(shop_id, filter).await?;

        Ok(CategoryList {
            categories,
            pagination: Pagination::new(count, filter.page, filter.per),
        })
    }

    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: NewProduct) -> Result<Product, DomainError> {
        if product.name.trim().is_empty() {
            return Err(DomainError::Validation("product name is required".into()));
        }
        check_prices(product.retail_price, product.wholesale_price)?;

        let mut session = self.db.session().await?;
        if session.category_by_id(product.category_id).await?.is_none() {
            return Err(DomainError::not_found("category", product.category_id));
        }

        Ok(session.insert_product(&product).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, DomainError> {
        let mut session = self.db.session().await?;
        session
            .product_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, DomainError> {
        let mut tx = self.db.begin().await?;
        let mut product = tx
            .product_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;

        product.apply(update);
        check_prices(product.retail_price, product.wholesale_price)?;
        if tx.category_by_id(product.category_id).await?.is_none() {
            return Err(DomainError::not_found("category", product.category_id));
        }

        let updated = tx.update_product(&product).await?;
        tx.commit().await?;
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<Product, DomainError> {
        let mut tx = self.db.begin().await?;
        let product = tx
            .product_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;
        tx.delete_product(id).await?;
        tx.commit().await?;
        Ok(product)
    }

    #[tracing::instrument(skip(self, filter))]
    pub async fn list_products(
        &self,
        shop_id: &str,
        filter: &ListFilter,
    ) -> Result<ProductList, DomainError> {
        let mut session = self.db.session().await?;
        let products = session.list_products(shop_id, filter).await?;
        let count = session.count_products(shop_id, filter).await?;

        Ok(ProductList {
            products,
            pagination: Pagination::new(count, filter.page, filter.per),
        })
    }

    /// Average retail price across a category and all of its descendants.
    #[tracing::instrument(skip(self))]
    pub async fn average_price_by_category(&self, id: CategoryId) -> Result<Money, DomainError> {
        let mut session = self.db.session().await?;
        if session.category_by_id(id).await?.is_none() {
            return Err(DomainError::not_found("category", id));
        }
        Ok(session.average_retail_price(id).await?)
    }
}
