//! Order placement and lifecycle.
//!
//! Placement turns the caller's basket into an order inside one checkout
//! transaction:
//!
//! 1. lock the customer and snapshot the basket
//! 2. check the basket is non-empty and an address is saved
//! 3. price the snapshot
//! 4. insert the order header under a fresh random order number
//! 5. insert one item per basket line
//! 6. drain the basket, which must still hold exactly the snapshot
//! 7. commit, then queue the confirmation email
//!
//! Any failure before the commit leaves no trace. Placements for the same
//! customer serialize on the checkout lock, so a second placement of the same
//! basket sees it empty.

use std::collections::BTreeSet;

use rand::Rng;
use thiserror::Error;
use tracing::instrument;

use marketplace_core::pricing::{self, PricingError, TotalPricing};
use marketplace_core::{OrderNumber, OrderStatus};

use crate::db::{Repository, RepositoryError};
use crate::models::{
    BasketLine, Customer, NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems,
};
use crate::services::access::{AccessError, Owned, ensure_owner};
use crate::services::email::OutgoingEmail;
use crate::services::jobs::JobQueue;

/// Order numbers tried before giving up on a placement.
const ORDER_NUMBER_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0}")]
    FailedPrecondition(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("{0}")]
    Conflict(String),

    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("could not allocate a free order number")]
    NumbersExhausted,

    #[error("basket line {0} holds a negative quantity or weight class")]
    CorruptBasket(marketplace_core::BasketLineId),

    #[error("order price calculation overflowed")]
    PricingOverflow,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<PricingError> for OrderError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::EmptyBasket => Self::FailedPrecondition(BASKET_EMPTY),
            PricingError::Overflow => Self::PricingOverflow,
        }
    }
}

const BASKET_EMPTY: &str = "Basket empty";
const NO_ADDRESS: &str = "Please provide customer address";

fn not_deletable(number: OrderNumber) -> OrderError {
    OrderError::Conflict(format!(
        "Order {number} cannot be deleted as it has already been dispatched. \
         If you don't pick it up, it will be automatically cancelled"
    ))
}

/// Draw an order number uniformly from [`OrderNumber::RANGE`].
#[must_use]
pub fn random_order_number() -> i64 {
    rand::rng().random_range(OrderNumber::RANGE)
}

pub struct OrderService<'a> {
    repo: &'a dyn Repository,
    jobs: &'a JobQueue,
    policy: TotalPricing,
    numbers: &'a (dyn Fn() -> i64 + Send + Sync),
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub fn new(repo: &'a dyn Repository, jobs: &'a JobQueue, policy: TotalPricing) -> Self {
        Self {
            repo,
            jobs,
            policy,
            numbers: &random_order_number,
        }
    }

    /// Replace the order number generator.
    #[must_use]
    pub fn with_number_source(mut self, numbers: &'a (dyn Fn() -> i64 + Send + Sync)) -> Self {
        self.numbers = numbers;
        self
    }

    // =========================================================================
    // Placement
    // =========================================================================

    /// Place an order from the caller's basket.
    ///
    /// # Errors
    ///
    /// - `FailedPrecondition` for an empty basket or a missing address
    /// - `PricingOverflow` if the prices overflow
    /// - `Conflict` if the basket changed underneath the checkout
    /// - `NumbersExhausted` if no free order number was found
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn place_order(
        &self,
        customer: &Customer,
        express_delivery: bool,
    ) -> Result<OrderWithItems, OrderError> {
        let mut tx = self.repo.begin_checkout(customer.id).await?;

        let lines = tx.basket_lines().await?;
        if lines.is_empty() {
            return Err(OrderError::FailedPrecondition(BASKET_EMPTY));
        }
        let customer = tx.customer().clone();
        if customer.delivery_address().is_none() {
            return Err(OrderError::FailedPrecondition(NO_ADDRESS));
        }

        let priced = lines
            .iter()
            .map(|line| line.priced().ok_or(OrderError::CorruptBasket(line.id)))
            .collect::<Result<Vec<_>, _>>()?;
        let area_code = u32::try_from(customer.area_code)
            .map_err(|_| OrderError::Validation("area code must be positive".to_owned()))?;
        let quote = pricing::quote(&priced, area_code, express_delivery, self.policy)?;

        let mut order = None;
        for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
            let Ok(order_number) = OrderNumber::new((self.numbers)()) else {
                continue;
            };
            let new = NewOrder {
                order_number,
                customer_id: customer.id,
                area_code: customer.area_code,
                total_price: quote.total_price,
                final_delivery_price: quote.delivery_price,
                express_delivery,
            };
            if let Some(inserted) = tx.insert_order(&new).await? {
                order = Some(inserted);
                break;
            }
            tracing::debug!(%order_number, attempt, "Order number taken, retrying");
        }
        let order = order.ok_or(OrderError::NumbersExhausted)?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            items.push(tx.insert_item(order.id, &snapshot(line)).await?);
        }

        let drained: BTreeSet<_> = tx.drain_basket().await?.into_iter().collect();
        let expected: BTreeSet<_> = lines
            .iter()
            .map(|line| (line.id, line.quantity))
            .collect();
        if drained != expected {
            tracing::warn!(
                expected = expected.len(),
                drained = drained.len(),
                "Basket changed during checkout"
            );
            return Err(OrderError::Conflict(
                "Basket changed during checkout, please try again".to_owned(),
            ));
        }

        tx.commit().await?;
        tracing::info!(
            order_number = %order.order_number,
            items = items.len(),
            total_price = %order.total_price,
            delivery_price = %order.final_delivery_price,
            "Order placed"
        );

        self.queue_confirmation(&customer, &order, &items);

        Ok(OrderWithItems { order, items })
    }

    fn queue_confirmation(&self, customer: &Customer, order: &Order, items: &[OrderItem]) {
        match OutgoingEmail::order_confirmation(
            customer,
            order.order_number,
            items,
            order.total_price,
            order.final_delivery_price,
            order.express_delivery,
        ) {
            Ok(email) => self.jobs.send_email(email),
            Err(e) => tracing::error!(
                order_number = %order.order_number,
                error = %e,
                "Failed to render order confirmation"
            ),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The caller's orders, newest first, without items.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on storage failure.
    pub async fn list(&self, customer: &Customer) -> Result<Vec<Order>, OrderError> {
        Ok(self.repo.orders_for(customer.id).await?)
    }

    /// One of the caller's orders with its items.
    ///
    /// # Errors
    ///
    /// `NotFound` if the order does not exist or belongs to someone else.
    pub async fn get(
        &self,
        customer: &Customer,
        number: OrderNumber,
    ) -> Result<OrderWithItems, OrderError> {
        let order = self
            .repo
            .order_for(customer.id, number)
            .await?
            .ok_or(AccessError::NotFound(Order::KIND))?;
        let items = self.repo.order_items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Delete one of the caller's orders while it is still being prepared.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown or foreign orders, `Conflict` once the order
    /// has been dispatched, including a dispatch that races this call.
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn delete(&self, customer: &Customer, number: OrderNumber) -> Result<(), OrderError> {
        let order = self
            .repo
            .order_by_number(number)
            .await?
            .ok_or(AccessError::NotFound(Order::KIND))?;
        ensure_owner(&order, customer)?;

        if !order.status.is_customer_deletable() {
            return Err(not_deletable(number));
        }
        if !self.repo.delete_order(order.id, order.status).await? {
            return Err(not_deletable(number));
        }

        tracing::info!(order_number = %number, "Order deleted");
        Ok(())
    }

    /// Move an order to `to`. Administrative; no ownership check.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown orders, `InvalidTransition` when the state
    /// machine forbids the step and `Conflict` if the status changed
    /// concurrently.
    #[instrument(skip(self))]
    pub async fn transition(&self, number: OrderNumber, to: OrderStatus) -> Result<Order, OrderError> {
        let mut order = self
            .repo
            .order_by_number(number)
            .await?
            .ok_or(AccessError::NotFound(Order::KIND))?;

        let from = order.status;
        if !from.can_transition_to(to) {
            return Err(OrderError::InvalidTransition { from, to });
        }
        if !self.repo.update_order_status(order.id, from, to).await? {
            return Err(OrderError::Conflict(format!(
                "Order {number} changed status concurrently"
            )));
        }

        tracing::info!(order_number = %number, %from, %to, "Order status changed");
        order.status = to;
        Ok(order)
    }
}

fn snapshot(line: &BasketLine) -> NewOrderItem {
    NewOrderItem {
        product_id: line.product_id,
        store_id: line.store_id,
        stock_number: line.stock_number,
        unit_price: line.unit_price,
        quantity: line.quantity,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use marketplace_core::{Email, Money, StockNumber};
    use tokio::sync::mpsc;

    use super::*;
    use crate::db::{
        BasketRepository, CustomerRepository, MemoryRepository, ProductRepository,
        StoreRepository,
    };
    use crate::models::{CustomerUpdate, NewCustomer, NewStore, ProductUpsert};
    use crate::services::jobs::Job;

    struct Fixture {
        repo: MemoryRepository,
        jobs: JobQueue,
        rx: mpsc::Receiver<Job>,
        buyer: Customer,
    }

    async fn customer(
        repo: &MemoryRepository,
        email: &str,
        vendor_id: Option<i64>,
        address: Option<&str>,
        area_code: i32,
    ) -> Customer {
        repo.create_customer(&NewCustomer {
            email: Email::parse(email).unwrap(),
            password_hash: "x".to_owned(),
            user_name: email.to_owned(),
            first_name: "Ann".to_owned(),
            last_name: "Lee".to_owned(),
            phone_number: "+1000".to_owned(),
            organization: None,
            address: address.map(str::to_owned),
            area_code,
            is_vendor: vendor_id.is_some(),
            seller_vendor_id: vendor_id,
        })
        .await
        .unwrap()
    }

    /// Vendor with `rate` delivery price selling one product per `(stock, price, weight)`.
    async fn vendor(repo: &MemoryRepository, n: i64, rate: i64, products: &[(i64, i64, i32)]) {
        let owner = customer(repo, &format!("vendor{n}@example.com"), Some(1000 + n), None, 1).await;
        let category = repo
            .upsert_store_category(100 + n, "Tools", owner.id)
            .await
            .unwrap();
        let store = repo
            .create_store(
                &NewStore {
                    owner_id: owner.id,
                    name: format!("Store {n}"),
                    address: "2 Side St".to_owned(),
                    url: None,
                    nominal_delivery_price: Money::from_units(rate),
                    status: true,
                },
                category.id,
            )
            .await
            .unwrap();
        for &(stock, price, weight) in products {
            repo.upsert_product(&ProductUpsert {
                stock_number: StockNumber::new(stock).unwrap(),
                name: format!("Product {stock}"),
                model: None,
                store_id: store.id,
                category_id: None,
                price: Money::from_units(price),
                recommended_price: Money::from_units(price),
                weight_class: weight,
                amount: 10,
                description: None,
            })
            .await
            .unwrap();
        }
    }

    async fn add(repo: &MemoryRepository, buyer: &Customer, stock: i64, quantity: i32) {
        let product = repo
            .product_by_stock_number(StockNumber::new(stock).unwrap())
            .await
            .unwrap()
            .unwrap();
        repo.upsert_basket_line(buyer.id, product.id, product.store_id, quantity)
            .await
            .unwrap();
    }

    /// The two-vendor basket from the pricing rules: weights 2 and 4, rates 10 and 7.
    async fn fixture() -> Fixture {
        let repo = MemoryRepository::new();
        vendor(&repo, 1, 10, &[(11, 100, 2)]).await;
        vendor(&repo, 2, 7, &[(22, 150, 4)]).await;
        let buyer = customer(&repo, "ann@example.com", None, Some("123 Main St"), 5).await;
        add(&repo, &buyer, 11, 1).await;
        add(&repo, &buyer, 22, 1).await;

        let (jobs, rx) = JobQueue::new(16);
        Fixture {
            repo,
            jobs,
            rx,
            buyer,
        }
    }

    fn number(n: i64) -> OrderNumber {
        OrderNumber::new(n).unwrap()
    }

    #[tokio::test]
    async fn places_order_and_drains_basket() {
        let mut f = fixture().await;
        let service = OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit);

        let placed = service.place_order(&f.buyer, false).await.unwrap();

        assert_eq!(placed.order.final_delivery_price, Money::from_units(200));
        assert_eq!(placed.order.total_price, Money::from_units(250));
        assert_eq!(placed.order.status, OrderStatus::New);
        assert_eq!(placed.order.area_code, 5);
        assert_eq!(placed.items.len(), 2);
        assert!(OrderNumber::RANGE.contains(&placed.order.order_number.as_i64()));
        assert!(f.repo.basket_lines(f.buyer.id).await.unwrap().is_empty());

        match f.rx.try_recv().unwrap() {
            Job::SendEmail(email) => {
                assert_eq!(email.subject, "Order confirmed");
                assert_eq!(email.to, "ann@example.com");
                assert!(email.body.contains(&placed.order.order_number.to_string()));
            }
            other => panic!("unexpected job {other:?}"),
        }
    }

    #[tokio::test]
    async fn express_triples_delivery() {
        let f = fixture().await;
        let placed = OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit)
            .place_order(&f.buyer, true)
            .await
            .unwrap();
        assert_eq!(placed.order.final_delivery_price, Money::from_units(600));
        assert!(placed.order.express_delivery);
    }

    #[tokio::test]
    async fn quantity_policy_multiplies_prices() {
        let f = fixture().await;
        add(&f.repo, &f.buyer, 11, 3).await;

        let placed = OrderService::new(&f.repo, &f.jobs, TotalPricing::Quantity)
            .place_order(&f.buyer, false)
            .await
            .unwrap();
        assert_eq!(placed.order.total_price, Money::from_units(450));
    }

    #[tokio::test]
    async fn empty_basket_creates_nothing() {
        let f = fixture().await;
        let other = customer(&f.repo, "bob@example.com", None, Some("9 Elm St"), 1).await;
        let service = OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit);

        let err = service.place_order(&other, false).await.unwrap_err();
        assert!(matches!(err, OrderError::FailedPrecondition("Basket empty")));
        assert!(service.list(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_address_keeps_basket() {
        let f = fixture().await;
        f.repo
            .update_customer(
                f.buyer.id,
                &CustomerUpdate {
                    address: Some("   ".to_owned()),
                    ..CustomerUpdate::default()
                },
            )
            .await
            .unwrap();

        let err = OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit)
            .place_order(&f.buyer, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::FailedPrecondition("Please provide customer address")
        ));
        assert_eq!(f.repo.basket_lines(f.buyer.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_placements_produce_one_order() {
        let f = fixture().await;
        let service = OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit);

        let (a, b) = tokio::join!(
            service.place_order(&f.buyer, false),
            service.place_order(&f.buyer, false)
        );

        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
        let failed = a.err().or(b.err()).unwrap();
        assert!(matches!(failed, OrderError::FailedPrecondition("Basket empty")));
        assert_eq!(service.list(&f.buyer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn taken_order_number_is_retried() {
        let f = fixture().await;
        let first = || 5000_i64;
        OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit)
            .with_number_source(&first)
            .place_order(&f.buyer, false)
            .await
            .unwrap();

        add(&f.repo, &f.buyer, 11, 1).await;
        let calls = AtomicUsize::new(0);
        let sequence = || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                5000_i64
            } else {
                6000
            }
        };
        let placed = OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit)
            .with_number_source(&sequence)
            .place_order(&f.buyer, false)
            .await
            .unwrap();

        assert_eq!(placed.order.order_number, number(6000));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_numbers_roll_back() {
        let f = fixture().await;
        let fixed = || 5000_i64;
        let service =
            OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit).with_number_source(&fixed);
        service.place_order(&f.buyer, false).await.unwrap();

        add(&f.repo, &f.buyer, 22, 1).await;
        let err = service.place_order(&f.buyer, false).await.unwrap_err();
        assert!(matches!(err, OrderError::NumbersExhausted));
        assert_eq!(f.repo.basket_lines(f.buyer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn foreign_orders_are_not_found() {
        let f = fixture().await;
        let other = customer(&f.repo, "bob@example.com", None, Some("9 Elm St"), 1).await;
        let service = OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit);
        let placed = service.place_order(&f.buyer, false).await.unwrap();
        let n = placed.order.order_number;

        assert!(matches!(
            service.get(&other, n).await,
            Err(OrderError::Access(AccessError::NotFound(_)))
        ));
        assert!(matches!(
            service.delete(&other, n).await,
            Err(OrderError::Access(AccessError::NotFound(_)))
        ));
        assert_eq!(service.get(&f.buyer, n).await.unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn dispatched_orders_cannot_be_deleted() {
        let f = fixture().await;
        let service = OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit);
        let n = service.place_order(&f.buyer, false).await.unwrap().order.order_number;

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Assembled,
            OrderStatus::Dispatched,
        ] {
            service.transition(n, status).await.unwrap();
        }

        let err = service.delete(&f.buyer, n).await.unwrap_err();
        match err {
            OrderError::Conflict(msg) => {
                assert!(msg.starts_with(&format!("Order {n} cannot be deleted")));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(service.get(&f.buyer, n).await.is_ok());
    }

    #[tokio::test]
    async fn early_orders_can_be_deleted() {
        let f = fixture().await;
        let service = OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit);
        let n = service.place_order(&f.buyer, false).await.unwrap().order.order_number;
        service.transition(n, OrderStatus::Confirmed).await.unwrap();

        service.delete(&f.buyer, n).await.unwrap();
        assert!(service.list(&f.buyer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transitions_follow_the_state_machine() {
        let f = fixture().await;
        let service = OrderService::new(&f.repo, &f.jobs, TotalPricing::Unit);
        let n = service.place_order(&f.buyer, false).await.unwrap().order.order_number;

        assert!(matches!(
            service.transition(n, OrderStatus::Delivered).await,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::New,
                to: OrderStatus::Delivered
            })
        ));
        let canceled = service.transition(n, OrderStatus::Canceled).await.unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert!(service.transition(n, OrderStatus::Confirmed).await.is_err());
    }
}
