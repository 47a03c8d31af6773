//! Background jobs.
//!
//! Request handlers never wait for email delivery or bulk catalog work: they
//! push a [`Job`] onto a bounded queue and return. A single worker task
//! drains the queue. A full queue drops the job with a warning rather than
//! blocking the request.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::instrument;

use marketplace_core::CustomerId;

use crate::db::Repository;
use crate::models::ProductImport;
use crate::services::catalog::CatalogService;
use crate::services::email::{Mailer, OutgoingEmail};

#[derive(Debug, Clone)]
pub enum Job {
    SendEmail(OutgoingEmail),
    /// Upsert records into the vendor's store and mail a summary.
    ImportProducts {
        customer: CustomerId,
        products: Vec<ProductImport>,
    },
    /// Mail the vendor's product listing.
    ExportProducts { customer: CustomerId },
}

impl Job {
    const fn kind(&self) -> &'static str {
        match self {
            Self::SendEmail(_) => "send_email",
            Self::ImportProducts { .. } => "import_products",
            Self::ExportProducts { .. } => "export_products",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("job queue is full")]
    Full,
    #[error("job queue is closed")]
    Closed,
}

/// Sending half of the job queue, cheap to clone into handlers.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Create a queue holding at most `capacity` pending jobs.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Push a job without waiting.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Full` when the worker is behind and
    /// `QueueError::Closed` when it has stopped.
    pub fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        let kind = job.kind();
        self.tx.try_send(job).map_err(|e| {
            let err = match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            };
            tracing::warn!(job = kind, error = %err, "Failed to enqueue job");
            err
        })
    }

    /// Fire-and-forget email. Failures are logged by [`enqueue`](Self::enqueue).
    pub fn send_email(&self, email: OutgoingEmail) {
        let _ = self.enqueue(Job::SendEmail(email));
    }
}

/// Process jobs until every [`JobQueue`] handle is dropped.
pub async fn run_worker(
    mut rx: mpsc::Receiver<Job>,
    repo: Arc<dyn Repository>,
    mailer: Arc<dyn Mailer>,
) {
    tracing::info!("Job worker started");
    while let Some(job) = rx.recv().await {
        let kind = job.kind();
        if let Err(e) = process(job, repo.as_ref(), mailer.as_ref()).await {
            tracing::error!(job = kind, error = %e, "Job failed");
        }
    }
    tracing::info!("Job worker stopped");
}

#[derive(Debug, Error)]
enum JobError {
    #[error("customer {0} no longer exists")]
    CustomerGone(CustomerId),
    #[error("customer {0} has no store")]
    NoStore(CustomerId),
    #[error(transparent)]
    Catalog(#[from] crate::services::catalog::CatalogError),
    #[error(transparent)]
    Repository(#[from] crate::db::RepositoryError),
    #[error(transparent)]
    Email(#[from] crate::services::email::EmailError),
}

#[instrument(skip_all, fields(job = job.kind()))]
async fn process(job: Job, repo: &dyn Repository, mailer: &dyn Mailer) -> Result<(), JobError> {
    match job {
        Job::SendEmail(email) => mailer.send(&email).await?,
        Job::ImportProducts { customer, products } => {
            let customer = repo
                .customer_by_id(customer)
                .await?
                .ok_or(JobError::CustomerGone(customer))?;
            let store = repo
                .store_by_owner(customer.id)
                .await?
                .ok_or(JobError::NoStore(customer.id))?;

            let report = CatalogService::new(repo)
                .import_products(&store, &products)
                .await?;
            tracing::info!(
                store_id = %store.id,
                imported = report.imported,
                rejected = report.rejected.len(),
                "Product import finished"
            );

            let email = OutgoingEmail::import_summary(
                &customer,
                &store.name,
                report.imported,
                &report.rejected,
            )?;
            mailer.send(&email).await?;
        }
        Job::ExportProducts { customer } => {
            let customer = repo
                .customer_by_id(customer)
                .await?
                .ok_or(JobError::CustomerGone(customer))?;
            let store = repo
                .store_by_owner(customer.id)
                .await?
                .ok_or(JobError::NoStore(customer.id))?;

            let (count, listing) = CatalogService::new(repo).export_listing(&store).await?;
            let email = OutgoingEmail::product_export(&customer, &store.name, count, &listing)?;
            mailer.send(&email).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "ann@example.com".to_owned(),
            subject: "Hi".to_owned(),
            body: "Body".to_owned(),
        }
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let (queue, mut rx) = JobQueue::new(1);
        assert_eq!(queue.enqueue(Job::SendEmail(email())), Ok(()));
        assert_eq!(
            queue.enqueue(Job::SendEmail(email())),
            Err(QueueError::Full)
        );

        assert!(matches!(rx.recv().await, Some(Job::SendEmail(_))));
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (queue, rx) = JobQueue::new(4);
        drop(rx);
        assert_eq!(
            queue.enqueue(Job::ExportProducts {
                customer: CustomerId::new(1)
            }),
            Err(QueueError::Closed)
        );
    }
}
