//! Order management commands.
//!
//! Vendors have no HTTP endpoint for moving orders along, so dispatch,
//! delivery and cancellation are done from here.

use marketplace_core::{OrderNumber, OrderStatus, TotalPricing};
use marketplace_storefront::services::jobs::JobQueue;
use marketplace_storefront::services::orders::{OrderError, OrderService};
use thiserror::Error;

use super::{ConnectError, repository};

#[derive(Debug, Error)]
pub enum OrderCommandError {
    #[error("Invalid order number: {0}")]
    InvalidNumber(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Move order `number` to `status`, following the allowed transitions.
pub async fn set_status(number: &str, status: &str) -> Result<(), OrderCommandError> {
    let number: OrderNumber = number
        .parse()
        .map_err(|_| OrderCommandError::InvalidNumber(number.to_owned()))?;
    let status: OrderStatus = status.parse().map_err(OrderCommandError::InvalidStatus)?;

    let repo = repository().await?;
    // Transitions never notify anyone; the receiver is dropped straight away.
    let (jobs, _rx) = JobQueue::new(1);
    let order = OrderService::new(&repo, &jobs, TotalPricing::default())
        .transition(number, status)
        .await?;

    tracing::info!(order_number = %order.order_number, status = %order.status, "Order updated");
    Ok(())
}
