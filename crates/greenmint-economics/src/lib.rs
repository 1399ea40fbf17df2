//! # GreenMint Economics - Activity Rewards & Tokenomics
//!
//! Turns verified clean-energy activity into token mints and models whether
//! the resulting token economy can be sustained.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Reading    │──►│   Activity   │──►│    Mint      │──►│  Settlement  │
//! │   Source     │   │   Ledger     │   │   Engine     │   │    Sink      │
//! └──────────────┘   └──────┬───────┘   └──────────────┘   └──────────────┘
//!                           │ high-water marks
//!                           ▼
//!                    ┌──────────────┐
//!                    │ Achievement  │
//!                    │   Engine     │
//!                    └──────────────┘
//! ```
//!
//! The [`simulation`] module is independent of the pipeline: it projects
//! price and pool health for planning scenarios.
//!
//! ## Mint Split
//!
//! | Preset | User | Burn | Liquidity | Treasury |
//! |--------|------|------|-----------|----------|
//! | Live | 93% | 5% | 1% | 1% |
//! | Planning | 75% | 20% | 3% | 2% |

pub mod achievements;
pub mod activity;
pub mod config;
pub mod distribution;
pub mod milestones;
pub mod minting;
pub mod simulation;

// Re-exports
pub use achievements::{
    AchievementEngine, AchievementId, ClaimStatus, ComboRule, EarnedAchievements,
    SettlementRegistry,
};
pub use activity::{
    compute_pending, mintable_units, ActivityLedger, BaselineStore, LedgerKey, LedgerRow,
    Reading, ReadingSource, ReadingStatus,
};
pub use config::{ConfigWarning, EngineConfig};
pub use distribution::{
    split_mint, split_transfer, DistributionConfig, MintSplit, TransferConfig, TransferSplit,
};
pub use milestones::{MilestoneRegistry, MilestoneTable, MilestoneTier};
pub use minting::{
    MemorySink, MintEngine, MintEvent, MintOutcome, NothingToMint, SettlementSink, SupplyTotals,
};
pub use simulation::{
    compute_coverage, max_activity_for_coverage, BatchEntry, LiquiditySimulator, MonthlySnapshot,
    NamedScenario, Scenario, ScenarioReport, Sustainability,
};

pub use greenmint_core::constants::*;
pub use greenmint_core::{Category, EconomicsError, Result, TokenAmount, UserId};
