//! HTTP middleware for the marketplace API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request spans)
//! 3. Request ID (recorded on the span, echoed in the response)
//! 4. Rate limiting on signup and login, with JSON rejections
//!
//! Authentication is an extractor, not a layer: handlers that need a
//! customer take [`RequireCustomer`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::RequireCustomer;
pub use rate_limit::{auth_rate_limiter, rate_limit_json};
pub use request_id::request_id_middleware;
