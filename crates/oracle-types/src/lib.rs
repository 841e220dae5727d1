//! Shared types for the price-oracle updater.
//!
//! Everything that crosses a crate boundary lives here: the price and turn
//! data model, the per-cycle decision, the uniform operation result and the
//! schema helpers used to validate backend-specific configuration tables.

pub mod chain;
pub mod decision;
pub mod price;
pub mod secret;
pub mod turn;
pub mod validation;

pub use chain::*;
pub use decision::*;
pub use price::*;
pub use secret::*;
pub use turn::*;
pub use validation::*;

pub use alloy::primitives::Address;
pub use rust_decimal::Decimal;
