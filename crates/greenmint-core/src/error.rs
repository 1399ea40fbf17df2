//! Error types for GreenMint ledger and simulation operations

use crate::types::{Category, UserId};
use thiserror::Error;

/// Result type alias for GreenMint operations
pub type Result<T> = std::result::Result<T, EconomicsError>;

/// Errors that can occur in the reward ledger and tokenomics engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EconomicsError {
    // === Reading Ingestion ===
    /// Reading is not a finite, non-negative number
    #[error("Invalid reading for {user}/{category}: {reason}")]
    InvalidReading {
        user: UserId,
        category: Category,
        reason: String,
    },

    // === Configuration ===
    /// Distribution split, transfer split or milestone table is malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Named preset does not exist
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    // === Minting ===
    /// Two mints raced on the same baseline and the retry lost again
    #[error("Concurrent mint conflict on {user}/{category}")]
    ConcurrentMintConflict { user: UserId, category: Category },

    // === Simulation ===
    /// Scenario parameters cannot be simulated
    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    // === General Errors ===
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EconomicsError {
    /// Get the error code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidReading { .. } => 2001,
            Self::Configuration(_) | Self::UnknownPreset(_) => 2002,
            Self::ConcurrentMintConflict { .. } => 2003,
            Self::InvalidScenario(_) => 2004,
            _ => 9999,
        }
    }

    /// Check if error is recoverable
    ///
    /// Recoverable errors affect one cycle or one request; the engine keeps
    /// running. Configuration errors must stop it from starting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidReading { .. }
                | Self::ConcurrentMintConflict { .. }
                | Self::InvalidScenario(_)
        )
    }
}
