//! # Mint & Transfer Distribution
//!
//! Splits every mint into user / burn / liquidity / treasury shares, and every
//! peer-to-peer transfer into recipient / burn / liquidity / treasury shares.
//!
//! ## Mint Presets
//!
//! | Preset | User | Burn | Liquidity | Treasury |
//! |--------|------|------|-----------|----------|
//! | Live | 93% | 5% | 1% | 1% |
//! | Planning | 75% | 20% | 3% | 2% |
//!
//! All math is integer basis points on whole-token amounts. Flooring
//! remainders go to the burn share, so the four shares always sum to the
//! gross amount exactly.

use greenmint_core::constants::BPS_DENOMINATOR;
use greenmint_core::{EconomicsError, Result, TokenAmount};
use serde::{Deserialize, Serialize};

/// Mint split in basis points; must sum to exactly 10_000
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionConfig {
    pub user_bps: u32,
    pub burn_bps: u32,
    pub liquidity_bps: u32,
    pub treasury_bps: u32,
}

impl DistributionConfig {
    /// Split shown to users in the live product: 93 / 5 / 1 / 1
    pub const LIVE: Self = Self {
        user_bps: 9_300,
        burn_bps: 500,
        liquidity_bps: 100,
        treasury_bps: 100,
    };

    /// Split used by the planning model: 75 / 20 / 3 / 2
    pub const PLANNING: Self = Self {
        user_bps: 7_500,
        burn_bps: 2_000,
        liquidity_bps: 300,
        treasury_bps: 200,
    };

    /// Build and validate a split from whole percentages
    pub fn from_percent(user: u32, burn: u32, liquidity: u32, treasury: u32) -> Result<Self> {
        let config = Self {
            user_bps: user * 100,
            burn_bps: burn * 100,
            liquidity_bps: liquidity * 100,
            treasury_bps: treasury * 100,
        };
        config.validate()?;
        Ok(config)
    }

    /// Look up a named preset
    pub fn preset(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "live" => Ok(Self::LIVE),
            "planning" => Ok(Self::PLANNING),
            other => Err(EconomicsError::UnknownPreset(other.to_string())),
        }
    }

    pub fn total_bps(&self) -> u64 {
        self.user_bps as u64
            + self.burn_bps as u64
            + self.liquidity_bps as u64
            + self.treasury_bps as u64
    }

    /// Fail fast unless the shares cover exactly 100%
    pub fn validate(&self) -> Result<()> {
        let total = self.total_bps();
        if total != BPS_DENOMINATOR as u64 {
            return Err(EconomicsError::Configuration(format!(
                "mint split must sum to {} bps, got {}",
                BPS_DENOMINATOR, total
            )));
        }
        Ok(())
    }

    /// User share as a fraction (0.0-1.0)
    pub fn user_fraction(&self) -> f64 {
        self.user_bps as f64 / BPS_DENOMINATOR as f64
    }

    pub fn burn_percent(&self) -> f64 {
        self.burn_bps as f64 / 100.0
    }

    pub fn liquidity_percent(&self) -> f64 {
        self.liquidity_bps as f64 / 100.0
    }

    pub fn treasury_percent(&self) -> f64 {
        self.treasury_bps as f64 / 100.0
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self::LIVE
    }
}

/// Shares of a single mint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintSplit {
    /// Gross amount (input)
    pub gross: TokenAmount,
    /// Delivered to the user's wallet
    pub user: TokenAmount,
    /// Permanently removed; includes every flooring remainder
    pub burn: TokenAmount,
    /// Sent to the liquidity pool
    pub liquidity: TokenAmount,
    /// Sent to the treasury
    pub treasury: TokenAmount,
}

impl MintSplit {
    pub fn total(&self) -> TokenAmount {
        self.user + self.burn + self.liquidity + self.treasury
    }

    /// Verify conservation: shares sum to exactly the gross amount
    pub fn verify(&self) -> bool {
        self.total() == self.gross
    }

    /// Flooring remainder that was added on top of the burn share
    pub fn remainder(&self, config: &DistributionConfig) -> TokenAmount {
        self.burn - bps_of(self.gross, config.burn_bps)
    }
}

fn bps_of(amount: TokenAmount, bps: u32) -> TokenAmount {
    amount * bps as TokenAmount / BPS_DENOMINATOR as TokenAmount
}

/// Split a gross mint amount with an injected configuration
pub fn split_mint(gross: TokenAmount, config: &DistributionConfig) -> MintSplit {
    let user = bps_of(gross, config.user_bps);
    let liquidity = bps_of(gross, config.liquidity_bps);
    let treasury = bps_of(gross, config.treasury_bps);

    // Burn absorbs the flooring remainder of every other share
    let burn = gross - user - liquidity - treasury;

    MintSplit {
        gross,
        user,
        burn,
        liquidity,
        treasury,
    }
}

/// Peer-to-peer transfer fees in basis points; must not exceed 10_000
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    pub burn_bps: u32,
    pub liquidity_bps: u32,
    pub treasury_bps: u32,
}

impl TransferConfig {
    /// 1% burn, 0.5% liquidity, 0.5% treasury
    pub const STANDARD: Self = Self {
        burn_bps: 100,
        liquidity_bps: 50,
        treasury_bps: 50,
    };

    pub fn fee_bps(&self) -> u64 {
        self.burn_bps as u64 + self.liquidity_bps as u64 + self.treasury_bps as u64
    }

    pub fn validate(&self) -> Result<()> {
        let fee = self.fee_bps();
        if fee > BPS_DENOMINATOR as u64 {
            return Err(EconomicsError::Configuration(format!(
                "transfer fees exceed 100%: {} bps",
                fee
            )));
        }
        Ok(())
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Shares of a single transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSplit {
    pub amount: TokenAmount,
    /// Delivered to the recipient (everything not taken as a fee)
    pub recipient: TokenAmount,
    pub burn: TokenAmount,
    pub liquidity: TokenAmount,
    pub treasury: TokenAmount,
}

impl TransferSplit {
    pub fn fees(&self) -> TokenAmount {
        self.burn + self.liquidity + self.treasury
    }
}

/// Split a transfer amount; the recipient receives the remainder
pub fn split_transfer(amount: TokenAmount, config: &TransferConfig) -> TransferSplit {
    let burn = bps_of(amount, config.burn_bps);
    let liquidity = bps_of(amount, config.liquidity_bps);
    let treasury = bps_of(amount, config.treasury_bps);

    TransferSplit {
        amount,
        recipient: amount - burn - liquidity - treasury,
        burn,
        liquidity,
        treasury,
    }
}
