//! Transactional email.
//!
//! Messages are rendered from Askama text templates into [`OutgoingEmail`]
//! values up front, so the job queue only ever carries plain data. Delivery
//! goes through a [`Mailer`]: SMTP via lettre in production, or a mailer that
//! only logs when SMTP is not configured.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use marketplace_core::{Money, OrderNumber};

use crate::config::EmailConfig;
use crate::models::{Customer, OrderItem};

#[derive(Template)]
#[template(path = "email/activation.txt")]
struct ActivationEmailText<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationEmailText<'a> {
    name: &'a str,
    order_number: OrderNumber,
    items: &'a [OrderItem],
    total_price: Money,
    delivery_price: Money,
    express: bool,
}

#[derive(Template)]
#[template(path = "email/import_summary.txt")]
struct ImportSummaryEmailText<'a> {
    name: &'a str,
    store_name: &'a str,
    imported: usize,
    rejected: &'a [String],
}

#[derive(Template)]
#[template(path = "email/product_export.txt")]
struct ProductExportEmailText<'a> {
    name: &'a str,
    store_name: &'a str,
    count: usize,
    listing: &'a str,
}

/// Errors that can occur when rendering or sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A fully rendered plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    /// Account activation link sent after signup (and on request at login).
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Template` if rendering fails.
    pub fn activation(customer: &Customer, link: &str) -> Result<Self, EmailError> {
        let body = ActivationEmailText {
            name: customer.display_name(),
            link,
        }
        .render()?;

        Ok(Self {
            to: customer.email.to_string(),
            subject: "Activation email".to_owned(),
            body,
        })
    }

    /// Confirmation of a freshly placed order.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Template` if rendering fails.
    pub fn order_confirmation(
        customer: &Customer,
        order_number: OrderNumber,
        items: &[OrderItem],
        total_price: Money,
        delivery_price: Money,
        express: bool,
    ) -> Result<Self, EmailError> {
        let body = OrderConfirmationEmailText {
            name: customer.display_name(),
            order_number,
            items,
            total_price,
            delivery_price,
            express,
        }
        .render()?;

        Ok(Self {
            to: customer.email.to_string(),
            subject: "Order confirmed".to_owned(),
            body,
        })
    }

    /// Outcome of a vendor product import.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Template` if rendering fails.
    pub fn import_summary(
        customer: &Customer,
        store_name: &str,
        imported: usize,
        rejected: &[String],
    ) -> Result<Self, EmailError> {
        let body = ImportSummaryEmailText {
            name: customer.display_name(),
            store_name,
            imported,
            rejected,
        }
        .render()?;

        Ok(Self {
            to: customer.email.to_string(),
            subject: "Product import finished".to_owned(),
            body,
        })
    }

    /// A vendor's product listing as JSON.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Template` if rendering fails.
    pub fn product_export(
        customer: &Customer,
        store_name: &str,
        count: usize,
        listing: &str,
    ) -> Result<Self, EmailError> {
        let body = ProductExportEmailText {
            name: customer.display_name(),
            store_name,
            count,
            listing,
        }
        .render()?;

        Ok(Self {
            to: customer.email.to_string(),
            subject: "Product export".to_owned(),
            body,
        })
    }
}

/// Delivers rendered messages.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError>;
}

/// SMTP delivery through lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?;

        self.transport.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// Mailer used when SMTP is not configured: logs instead of sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "SMTP not configured, email logged only"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use marketplace_core::{CustomerId, Email, OrderId, OrderItemId, ProductId, StockNumber, StoreId};

    use super::*;

    fn customer() -> Customer {
        Customer {
            id: CustomerId::new(1),
            email: Email::parse("ann@example.com").unwrap(),
            password_hash: String::new(),
            email_verified: true,
            is_active: true,
            user_name: "ann".to_owned(),
            first_name: "Ann".to_owned(),
            last_name: "Lee".to_owned(),
            phone_number: "+1000".to_owned(),
            organization: None,
            address: Some("123 Main St".to_owned()),
            area_code: 5,
            is_vendor: false,
            seller_vendor_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn activation_mail_contains_link() {
        let email = OutgoingEmail::activation(&customer(), "https://shop.test/a/b").unwrap();
        assert_eq!(email.to, "ann@example.com");
        assert_eq!(email.subject, "Activation email");
        assert!(email.body.contains("Hi Ann,"));
        assert!(email.body.contains("https://shop.test/a/b"));
    }

    #[test]
    fn order_confirmation_lists_items_and_totals() {
        let items = [OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(1),
            product_id: ProductId::new(1),
            store_id: StoreId::new(1),
            stock_number: StockNumber::new(15).unwrap(),
            unit_price: Money::from_units(100),
            quantity: 2,
        }];
        let email = OutgoingEmail::order_confirmation(
            &customer(),
            OrderNumber::new(4711).unwrap(),
            &items,
            Money::from_units(250),
            Money::from_units(200),
            true,
        )
        .unwrap();

        assert_eq!(email.subject, "Order confirmed");
        assert!(email.body.contains("order 4711"));
        assert!(email.body.contains("#15"));
        assert!(email.body.contains("250.00"));
        assert!(email.body.contains("(express)"));
    }

    #[tokio::test]
    async fn log_mailer_accepts_everything() {
        let email = OutgoingEmail::activation(&customer(), "x").unwrap();
        assert!(LogMailer.send(&email).await.is_ok());
    }
}
