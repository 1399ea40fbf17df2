//! # GreenMint Core
//!
//! Shared building blocks for the GreenMint reward ledger:
//! - `Category` - the closed set of clean-energy activity kinds
//! - `UserId` - identity-derived user identifier
//! - `TokenAmount` - whole-token amounts used by every split
//! - `EconomicsError` - the error taxonomy of the ledger and simulator

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{EconomicsError, Result};
    pub use crate::types::{constants, Category, ChargingReading, TokenAmount, UserId};
}
