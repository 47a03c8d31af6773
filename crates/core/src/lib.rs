//! Marketplace Core - Shared domain types and pricing rules.
//!
//! This crate provides the types used across all marketplace components:
//! - `storefront` - HTTP service for customers and vendors
//! - `cli` - Command-line tools for migrations and order administration
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. The delivery and total price rules live here so they can
//! be tested in isolation from the order workflow that applies them.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, money, catalog numbers and statuses
//! - [`pricing`] - Basket pricing (total price and delivery price)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::{PricedLine, PricingError, Quote, TotalPricing};
pub use types::*;
