//! Business logic for the marketplace.
//!
//! # Services
//!
//! - `access` - Ownership checks shared by the other services
//! - `auth` - Signup, email activation, login and logout
//! - `basket` - Per-customer basket
//! - `catalog` - Stores, categories, products, vendor import/export
//! - `customers` - Self-service profile
//! - `email` - Email rendering and delivery
//! - `jobs` - Background job queue and worker
//! - `orders` - Order placement and lifecycle
//! - `session` - Bearer session tokens
//!
//! Services borrow a `&dyn Repository` per request and hold no state of
//! their own.

pub mod access;
pub mod auth;
pub mod basket;
pub mod catalog;
pub mod customers;
pub mod email;
pub mod jobs;
pub mod orders;
pub mod session;
