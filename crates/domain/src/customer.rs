//! Customer resolution and customer records.

use common::{CustomerId, Pagination};
use serde::Serialize;
use store::{Customer, CustomerRepository, CustomerUpdate, Database, ListFilter, NewCustomer, Session};

use crate::error::DomainError;

/// Outcome of resolving a customer by `(email, phone_number)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerResolution {
    Existing(Customer),
    Created(Customer),
}

impl CustomerResolution {
    pub fn customer(&self) -> &Customer {
        match self {
            CustomerResolution::Existing(c) | CustomerResolution::Created(c) => c,
        }
    }

    pub fn into_customer(self) -> Customer {
        match self {
            CustomerResolution::Existing(c) | CustomerResolution::Created(c) => c,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CustomerResolution::Created(_))
    }
}

/// Finds the customer with the candidate's email and phone number, creating
/// it from the candidate when there is none.
///
/// Runs entirely on `session`, so inside a transaction the new row commits
/// or rolls back with everything else. When a concurrent writer creates the
/// same pair first, the insert is skipped and that writer's row is returned.
pub async fn resolve_customer<S>(
    session: &mut S,
    candidate: &NewCustomer,
) -> Result<CustomerResolution, DomainError>
where
    S: CustomerRepository + ?Sized,
{
    if let Some(existing) = session
        .customer_by_email_and_phone(&candidate.email, &candidate.phone_number)
        .await?
    {
        return Ok(CustomerResolution::Existing(existing));
    }

    if let Some(created) = session.insert_customer_if_absent(candidate).await? {
        metrics::counter!("customers_created_total").increment(1);
        tracing::debug!(customer_id = %created.id, "customer created");
        return Ok(CustomerResolution::Created(created));
    }

    tracing::debug!("customer created concurrently, re-reading");
    session
        .customer_by_email_and_phone(&candidate.email, &candidate.phone_number)
        .await?
        .map(CustomerResolution::Existing)
        .ok_or_else(|| {
            DomainError::Conflict(format!(
                "customer with email {} and phone number {} could not be resolved",
                candidate.email, candidate.phone_number
            ))
        })
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerList {
    pub customers: Vec<Customer>,
    pub pagination: Pagination,
}

fn validate(customer: &NewCustomer) -> Result<(), DomainError> {
    if customer.name.trim().is_empty() {
        return Err(DomainError::Validation("customer name is required".into()));
    }
    if customer.email.trim().is_empty() {
        return Err(DomainError::Validation("customer email is required".into()));
    }
    if customer.shop_id.trim().is_empty() {
        return Err(DomainError::Validation("shop id is required".into()));
    }
    Ok(())
}

/// Service for managing customers.
#[derive(Clone)]
pub struct CustomerService<D: Database> {
    db: D,
}

impl<D: Database> CustomerService<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    /// Creates a customer, refusing duplicates of the `(email, phone)` pair.
    #[tracing::instrument(skip(self, customer), fields(shop_id = %customer.shop_id))]
    pub async fn create(&self, customer: NewCustomer) -> Result<Customer, DomainError> {
        validate(&customer)?;
        let mut session = self.db.session().await?;

        if session
            .customer_by_email_and_phone(&customer.email, &customer.phone_number)
            .await?
            .is_some()
        {
            return Err(DomainError::Conflict(format!(
                "customer with email {} or phone number {} already exists",
                customer.email, customer.phone_number
            )));
        }

        let created = session.insert_customer(&customer).await?;
        metrics::counter!("customers_created_total").increment(1);
        Ok(created)
    }

    /// Resolves a customer outside of any order, in its own transaction.
    #[tracing::instrument(skip(self, candidate))]
    pub async fn find_or_create(
        &self,
        candidate: NewCustomer,
    ) -> Result<CustomerResolution, DomainError> {
        validate(&candidate)?;
        let mut tx = self.db.begin().await?;
        let resolution = resolve_customer(&mut tx, &candidate).await?;
        tx.commit().await?;
        Ok(resolution)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: CustomerId) -> Result<Customer, DomainError> {
        let mut session = self.db.session().await?;
        session
            .customer_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", id))
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer, DomainError> {
        let mut tx = self.db.begin().await?;
        let mut customer = tx
            .customer_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", id))?;

        customer.apply(update);
        if customer.name.trim().is_empty() || customer.email.trim().is_empty() {
            return Err(DomainError::Validation(
                "customer name and email cannot be blank".into(),
            ));
        }

        let updated = tx.update_customer(&customer).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Deletes a customer and returns the removed record.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: CustomerId) -> Result<Customer, DomainError> {
        let mut tx = self.db.begin().await?;
        let customer = tx
            .customer_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", id))?;
        tx.delete_customer(id).await?;
        tx.commit().await?;
        Ok(customer)
    }

    #[tracing::instrument(skip(self, filter))]
    pub async fn list_for_shop(
        &self,
        shop_id: &str,
        filter: &ListFilter,
    ) -> Result<CustomerList, DomainError> {
        let mut session = self.db.session().await?;
        let customers = session.list_customers(shop_id, filter).await?;
        let count = session.count_customers(shop_id, filter).await?;

        Ok(CustomerList {
            customers,
            pagination: Pagination::new(count, filter.page, filter.per),
        })
    }
}
