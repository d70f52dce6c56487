//! Order creation and the order read side.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use common::{OrderId, Pagination};
use serde::Serialize;
use store::{
    Database, ListFilter, MAX_ORDER_ITEMS_PER_BATCH, NewOrder, NewOrderItem, Order,
    OrderRepository, OrderRepositoryExt, OrderWithItems, Session,
};

use crate::batch::{DEFAULT_ITEM_BATCH_SIZE, batch_count, batches};
use crate::customer::resolve_customer;
use crate::error::{DomainError, OrderStage};
use crate::notifier::{NoopNotifier, OrderNotifier};
use crate::pricing::{PricedLine, out_of_range, price_items};
use crate::reference::generate_reference;

use super::CreateOrder;

/// Tuning for order creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderConfig {
    /// Line items written per insert statement.
    pub item_batch_size: usize,
    /// Upper bound on the transaction up to commit. The commit itself is
    /// always awaited.
    pub transaction_timeout: Duration,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            item_batch_size: DEFAULT_ITEM_BATCH_SIZE,
            transaction_timeout: Duration::from_secs(30),
        }
    }
}

impl OrderConfig {
    /// Clamps the batch size into `1..=MAX_ORDER_ITEMS_PER_BATCH`.
    pub fn new(item_batch_size: usize, transaction_timeout: Duration) -> Self {
        Self {
            item_batch_size: item_batch_size.clamp(1, MAX_ORDER_ITEMS_PER_BATCH),
            transaction_timeout,
        }
    }
}

/// A committed order and the lines it was priced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<PricedLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

/// Service for creating and reading orders.
///
/// Creation resolves the customer, prices the lines, stores the header and
/// the line items in one transaction, and only after commit hands the
/// order to the notifier.
#[derive(Clone)]
pub struct OrderService<D: Database> {
    db: D,
    notifier: Arc<dyn OrderNotifier>,
    config: OrderConfig,
}

impl<D: Database> OrderService<D> {
    /// Creates a new order service that sends no notifications.
    pub fn new(db: D) -> Self {
        Self::with_notifier(db, Arc::new(NoopNotifier), OrderConfig::default())
    }

    pub fn with_notifier(db: D, notifier: Arc<dyn OrderNotifier>, config: OrderConfig) -> Self {
        Self {
            db,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &OrderConfig {
        &self.config
    }

    /// Creates an order atomically.
    ///
    /// On error nothing was persisted: no customer, no header, no items.
    /// Notification runs after commit and cannot fail this call.
    #[tracing::instrument(
        skip(self, cmd),
        fields(shop_id = %cmd.shop_id, lines = cmd.items.len())
    )]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<PlacedOrder, DomainError> {
        cmd.validate()?;

        let started = Instant::now();
        let timeout = self.config.transaction_timeout;
        // The deadline covers everything up to commit. Once COMMIT is sent
        // its outcome is awaited in full, so a timeout always means rollback.
        let result = match tokio::time::timeout(timeout, self.stage_order(&cmd)).await {
            Ok(Ok((tx, placed))) => tx
                .commit()
                .await
                .map(|()| placed)
                .map_err(|e| OrderStage::Commit.failed(e)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DomainError::Timeout(timeout)),
        };
        metrics::histogram!("order_creation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let placed = match result {
            Ok(placed) => placed,
            Err(e) => {
                let stage = e.stage().map_or("timeout", |s| s.as_str());
                metrics::counter!("order_creation_failures_total", "stage" => stage).increment(1);
                tracing::warn!(error = %e, stage, "order creation failed");
                return Err(e);
            }
        };

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %placed.order.id,
            reference = %placed.order.reference_number,
            total = %placed.order.total_amount,
            "order created"
        );

        if placed.order.phone_number.is_some() {
            self.notifier.notify(&placed);
        }

        Ok(placed)
    }

    /// Writes the order inside a new transaction and hands the transaction
    /// back uncommitted.
    async fn stage_order(
        &self,
        cmd: &CreateOrder,
    ) -> Result<(D::Session, PlacedOrder), DomainError> {
        let mut tx = self.db.begin().await.map_err(|e| OrderStage::Transaction.failed(e))?;

        let customer = resolve_customer(&mut tx, &cmd.customer_candidate())
            .await
            .map_err(|e| OrderStage::Customer.failed(e))?
            .into_customer();

        let priced = price_items(&mut tx, &cmd.items)
            .await
            .map_err(|e| OrderStage::Pricing.failed(e))?;

        let total_items = u32::try_from(priced.lines.len()).map_err(|_| {
            OrderStage::Pricing.failed(DomainError::Validation("too many order lines".into()))
        })?;

        // The stored discount is the total less the requested discount.
        let discount = cmd
            .discount
            .map(|requested| priced.total.checked_sub(requested))
            .map(|d| d.ok_or_else(|| OrderStage::Pricing.failed(out_of_range())))
            .transpose()?;

        let order = tx
            .insert_order(&NewOrder {
                reference_number: generate_reference(&Utc::now()),
                phone_number: cmd.phone().map(str::to_string),
                order_status: cmd.order_status,
                order_medium: cmd.order_medium,
                payment_method: cmd.payment_method,
                customer_id: Some(customer.id),
                shop_id: cmd.shop_id.clone(),
                total_items,
                total_amount: priced.total,
                discount,
            })
            .await
            .map_err(|e| OrderStage::Order.failed(e))?;

        let items: Vec<NewOrderItem> = priced.lines.iter().map(|l| l.attach(order.id)).collect();
        let size = self.config.item_batch_size;
        let expected = batch_count(items.len(), size);

        for (index, batch) in batches(&items, size).enumerate() {
            tx.insert_order_items(batch)
                .await
                .map_err(|e| OrderStage::Items.failed(e))?;
            metrics::counter!("order_items_batches_total").increment(1);
            tracing::debug!(
                batch = index + 1,
                of = expected,
                rows = batch.len(),
                "order item batch inserted"
            );
        }

        Ok((
            tx,
            PlacedOrder {
                order,
                items: priced.lines,
            },
        ))
    }

    /// Loads an order with its line items.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<OrderWithItems, DomainError> {
        let mut session = self.db.session().await?;
        session
            .order_with_items(id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", id))
    }

    /// Lists a shop's orders, newest first.
    #[tracing::instrument(skip(self, filter))]
    pub async fn list_for_shop(
        &self,
        shop_id: &str,
        filter: &ListFilter,
    ) -> Result<OrderList, DomainError> {
        let mut session = self.db.session().await?;
        let orders = session.list_orders(shop_id, filter).await?;
        let count = session.count_orders(shop_id, filter).await?;

        Ok(OrderList {
            orders,
            pagination: Pagination::new(count, filter.page, filter.per),
        })
    }
}
