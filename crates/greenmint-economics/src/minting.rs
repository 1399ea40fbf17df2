//! # Mint Distribution Ledger
//!
//! Converts pending activity into token mints.
//!
//! ## Claim-then-Settle
//!
//! ```text
//! snapshot row (version v) → pending → whole units → gross → split
//!        │
//!        └─► CAS baseline := lifetime @ v ──ok──► credit minted, totals, sink
//!                                         └─conflict─► retry once on fresh row
//!                                                       └─ pending 0 → AlreadySettled
//! ```
//!
//! The engine computes amounts only; on-chain execution belongs to the
//! [`SettlementSink`].

use crate::achievements::{AchievementId, ClaimStatus, EarnedAchievements, SettlementRegistry};
use crate::activity::{mintable_units, BaselineStore, LedgerKey};
use crate::distribution::{
    split_mint, split_transfer, DistributionConfig, MintSplit, TransferConfig, TransferSplit,
};
use chrono::{DateTime, Utc};
use greenmint_core::constants::DEFAULT_TOKENS_PER_UNIT;
use greenmint_core::{Category, EconomicsError, Result, TokenAmount, UserId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// A settled mint, handed to the external settlement layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MintEvent {
    pub event_id: Uuid,
    pub user: UserId,
    pub category: Category,
    /// Whole activity units consumed
    pub units: u64,
    pub gross_amount: TokenAmount,
    pub split: MintSplit,
    pub timestamp: DateTime<Utc>,
}

/// Why nothing was minted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NothingToMint {
    /// No whole unit of new activity since the last mint
    NoPendingActivity,
    /// A concurrent mint consumed the pending amount first
    AlreadySettled,
}

/// Result of a mint request; "nothing to mint" is a normal outcome
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MintOutcome {
    Minted(MintEvent),
    NothingToMint(NothingToMint),
}

impl MintOutcome {
    pub fn event(&self) -> Option<&MintEvent> {
        match self {
            Self::Minted(event) => Some(event),
            Self::NothingToMint(_) => None,
        }
    }
}

/// Receives mint events for on-chain execution
pub trait SettlementSink: Send + Sync {
    fn submit(&self, event: &MintEvent);
}

/// Sink that keeps every event in memory
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<MintEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MintEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl SettlementSink for MemorySink {
    fn submit(&self, event: &MintEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Running token supply totals
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyTotals {
    /// Gross tokens minted from activity
    pub gross_minted: TokenAmount,
    /// Delivered to users
    pub user_minted: TokenAmount,
    /// Burned at mint and transfer time
    pub burned: TokenAmount,
    pub liquidity: TokenAmount,
    pub treasury: TokenAmount,
    pub mint_events: u64,
    /// Collectibles settled (each counted once)
    pub collectibles_settled: u64,
}

/// Mint engine over a baseline store
pub struct MintEngine {
    store: Arc<dyn BaselineStore>,

    /// Injected mint split
    distribution: DistributionConfig,

    /// Injected transfer split
    transfer: TransferConfig,

    /// Tokens per whole unit, per category
    token_rates: BTreeMap<Category, u64>,

    supply: RwLock<SupplyTotals>,

    settlements: SettlementRegistry,

    sink: Option<Arc<dyn SettlementSink>>,
}

impl MintEngine {
    /// Create new mint engine; the split is validated up front
    pub fn new(store: Arc<dyn BaselineStore>, distribution: DistributionConfig) -> Result<Self> {
        distribution.validate()?;
        Ok(Self {
            store,
            distribution,
            transfer: TransferConfig::default(),
            token_rates: BTreeMap::new(),
            supply: RwLock::new(SupplyTotals::default()),
            settlements: SettlementRegistry::new(),
            sink: None,
        })
    }

    pub fn with_transfer_config(mut self, transfer: TransferConfig) -> Result<Self> {
        transfer.validate()?;
        self.transfer = transfer;
        Ok(self)
    }

    pub fn with_token_rates(mut self, token_rates: BTreeMap<Category, u64>) -> Result<Self> {
        if let Some((category, _)) = token_rates.iter().find(|(_, rate)| **rate == 0) {
            return Err(EconomicsError::Configuration(format!(
                "token rate for {} must be at least 1",
                category
            )));
        }
        self.token_rates = token_rates;
        Ok(self)
    }

    pub fn with_sink(mut self, sink: Arc<dyn SettlementSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn distribution(&self) -> &DistributionConfig {
        &self.distribution
    }

    /// Tokens per whole unit of a category
    pub fn token_rate(&self, category: Category) -> u64 {
        self.token_rates
            .get(&category)
            .copied()
            .unwrap_or(DEFAULT_TOKENS_PER_UNIT)
    }

    /// Mint the pending activity of one category
    pub fn mint(&self, user: UserId, category: Category) -> Result<MintOutcome> {
        let key = LedgerKey::new(user, category);
        match self.try_mint(&key, NothingToMint::NoPendingActivity) {
            Err(EconomicsError::ConcurrentMintConflict { .. }) => {
                tracing::warn!(%user, %category, "mint raced; retrying against fresh baseline");
                self.try_mint(&key, NothingToMint::AlreadySettled)
            }
            other => other,
        }
    }

    /// Mint every category with pending activity
    pub fn mint_all(&self, user: UserId) -> Vec<(Category, Result<MintOutcome>)> {
        Category::ALL
            .iter()
            .map(|category| (*category, self.mint(user, *category)))
            .collect()
    }

    fn try_mint(&self, key: &LedgerKey, when_empty: NothingToMint) -> Result<MintOutcome> {
        let row = match self.store.snapshot(key) {
            Some(row) => row,
            None => return Ok(MintOutcome::NothingToMint(NothingToMint::NoPendingActivity)),
        };

        let units = mintable_units(row.pending());
        if units == 0 {
            return Ok(MintOutcome::NothingToMint(when_empty));
        }

        let gross = units as TokenAmount * self.token_rate(key.category) as TokenAmount;
        let split = split_mint(gross, &self.distribution);

        self.store
            .compare_and_set_baseline(key, row.version, row.lifetime_value, gross)?;

        let event = MintEvent {
            event_id: Uuid::new_v4(),
            user: key.user,
            category: key.category,
            units,
            gross_amount: gross,
            split,
            timestamp: Utc::now(),
        };

        {
            let mut supply = self.supply.write();
            supply.gross_minted += split.gross;
            supply.user_minted += split.user;
            supply.burned += split.burn;
            supply.liquidity += split.liquidity;
            supply.treasury += split.treasury;
            supply.mint_events += 1;
        }

        tracing::debug!(
            user = %key.user,
            category = %key.category,
            units,
            gross,
            burned = split.burn,
            "minted"
        );

        if let Some(sink) = &self.sink {
            sink.submit(&event);
        }
        Ok(MintOutcome::Minted(event))
    }

    /// Apply the transfer split and book its burn/liquidity/treasury fees
    pub fn transfer(&self, amount: TokenAmount) -> TransferSplit {
        let split = split_transfer(amount, &self.transfer);
        let mut supply = self.supply.write();
        supply.burned += split.burn;
        supply.liquidity += split.liquidity;
        supply.treasury += split.treasury;
        split
    }

    /// Eligibility of a collectible for this identity
    pub fn collectible_status(
        &self,
        user: &UserId,
        id: &AchievementId,
        earned: &EarnedAchievements,
    ) -> ClaimStatus {
        self.settlements.claim_status(user, id, earned)
    }

    /// Settle a collectible; only the first settlement is counted
    pub fn settle_collectible(
        &self,
        user: &UserId,
        id: &AchievementId,
        earned: &EarnedAchievements,
    ) -> ClaimStatus {
        let status = self.settlements.settle(user, id, earned);
        if status == ClaimStatus::Mintable {
            self.supply.write().collectibles_settled += 1;
        }
        status
    }

    pub fn settlements(&self) -> &SettlementRegistry {
        &self.settlements
    }

    pub fn supply(&self) -> SupplyTotals {
        self.supply.read().clone()
    }
}
