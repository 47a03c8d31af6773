//! Core types for the marketplace.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod numbers;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use numbers::{NumberError, OrderNumber, StockNumber};
pub use status::*;
