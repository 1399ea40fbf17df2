//! Engine configuration
//!
//! ```toml
//! [distribution]
//! mint = "live"
//! planning = "planning"
//!
//! [transfer]
//! burn_bps = 100
//! liquidity_bps = 50
//! treasury_bps = 50
//!
//! [ledger]
//! reading_tolerance = 0.5
//! token_rates = { solar = 1, ev_miles = 1 }
//!
//! [[milestones]]
//! category = "solar"
//! thresholds = [100.0, 500.0, 1000.0]
//!
//! [simulation]
//! horizon_months = 36
//! divergence_months = 3
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use crate::activity::{ActivityLedger, BaselineStore};
use crate::distribution::{DistributionConfig, TransferConfig};
use crate::milestones::{MilestoneRegistry, MilestoneTable, MilestoneTier};
use crate::minting::MintEngine;
use crate::simulation::{LiquiditySimulator, DEFAULT_DIVERGENCE_MONTHS, DEFAULT_HORIZON_MONTHS};
use greenmint_core::constants::{DEFAULT_READING_TOLERANCE, DEFAULT_TOKENS_PER_UNIT};
use greenmint_core::{Category, EconomicsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Complete engine configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Mint splits
    #[serde(default)]
    pub distribution: DistributionSection,

    /// Peer-to-peer transfer fees
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Activity ledger settings
    #[serde(default)]
    pub ledger: LedgerSection,

    /// Per-category milestone replacements
    #[serde(default)]
    pub milestones: Vec<MilestoneOverride>,

    /// Simulator settings
    #[serde(default)]
    pub simulation: SimulationSection,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A preset name or explicit basis points
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SplitSetting {
    Preset(String),
    Custom(DistributionConfig),
}

impl SplitSetting {
    pub fn resolve(&self) -> Result<DistributionConfig> {
        let split = match self {
            Self::Preset(name) => DistributionConfig::preset(name)?,
            Self::Custom(split) => *split,
        };
        split.validate()?;
        Ok(split)
    }
}

/// Mint split used by the ledger and the one assumed by the planning model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionSection {
    #[serde(default = "default_mint_split")]
    pub mint: SplitSetting,

    #[serde(default = "default_planning_split")]
    pub planning: SplitSetting,
}

fn default_mint_split() -> SplitSetting {
    SplitSetting::Preset("live".to_string())
}

fn default_planning_split() -> SplitSetting {
    SplitSetting::Preset("planning".to_string())
}

impl Default for DistributionSection {
    fn default() -> Self {
        Self {
            mint: default_mint_split(),
            planning: default_planning_split(),
        }
    }
}

/// Activity ledger settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Drops up to this size are treated as source noise
    #[serde(default = "default_reading_tolerance")]
    pub reading_tolerance: f64,

    /// Tokens per whole unit, keyed by category tag
    #[serde(default)]
    pub token_rates: BTreeMap<String, u64>,
}

fn default_reading_tolerance() -> f64 {
    DEFAULT_READING_TOLERANCE
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            reading_tolerance: default_reading_tolerance(),
            token_rates: BTreeMap::new(),
        }
    }
}

/// Replacement tier table for one category
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MilestoneOverride {
    pub category: Category,
    pub thresholds: Vec<f64>,

    /// Optional display names, matched to thresholds by position
    #[serde(default)]
    pub names: Vec<String>,
}

impl MilestoneOverride {
    pub fn to_table(&self) -> Result<MilestoneTable> {
        if self.names.is_empty() {
            return MilestoneTable::from_thresholds(self.category, &self.thresholds);
        }
        if self.names.len() != self.thresholds.len() {
            return Err(EconomicsError::Configuration(format!(
                "{} milestone override has {} names for {} thresholds",
                self.category,
                self.names.len(),
                self.thresholds.len()
            )));
        }
        let tiers = self
            .thresholds
            .iter()
            .zip(&self.names)
            .enumerate()
            .map(|(i, (threshold, name))| {
                MilestoneTier::new(
                    format!("{}-{}", self.category.tag(), i + 1),
                    name.clone(),
                    *threshold,
                )
            })
            .collect();
        MilestoneTable::new(self.category, tiers)
    }
}

/// Simulator settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationSection {
    #[serde(default = "default_horizon_months")]
    pub horizon_months: u32,

    /// Consecutive floor-clamped months before a scenario is flagged
    #[serde(default = "default_divergence_months")]
    pub divergence_months: u32,
}

fn default_horizon_months() -> u32 {
    DEFAULT_HORIZON_MONTHS
}

fn default_divergence_months() -> u32 {
    DEFAULT_DIVERGENCE_MONTHS
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            horizon_months: default_horizon_months(),
            divergence_months: default_divergence_months(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Non-fatal findings surfaced at load time
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigWarning {
    /// Ledger and planning model assume different mint splits
    SplitMismatch {
        mint: DistributionConfig,
        planning: DistributionConfig,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SplitMismatch { mint, planning } => write!(
                f,
                "mint split {}/{}/{}/{} differs from planning split {}/{}/{}/{}",
                mint.user_bps,
                mint.burn_bps,
                mint.liquidity_bps,
                mint.treasury_bps,
                planning.user_bps,
                planning.burn_bps,
                planning.liquidity_bps,
                planning.treasury_bps
            ),
        }
    }
}

impl EngineConfig {
    /// Parse without validating
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| EconomicsError::Serialization(e.to_string()))
    }

    /// Read, parse and validate a config file; warnings are logged
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EconomicsError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EconomicsError::Serialization(e.to_string()))
    }

    /// Fatal checks first, then warnings
    pub fn validate(&self) -> Result<Vec<ConfigWarning>> {
        self.mint_split()?;
        self.planning_split()?;
        self.transfer.validate()?;

        let tolerance = self.ledger.reading_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(EconomicsError::Configuration(format!(
                "reading_tolerance must be non-negative, got {}",
                tolerance
            )));
        }
        self.token_rates()?;
        self.registry()?;

        if self.simulation.divergence_months == 0 {
            return Err(EconomicsError::Configuration(
                "divergence_months must be at least 1".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(EconomicsError::Configuration(format!(
                "unknown log format '{}'",
                self.logging.format
            )));
        }

        let warnings = self.warnings();
        for warning in &warnings {
            tracing::warn!(%warning, "simulations will not match live minting");
        }
        Ok(warnings)
    }

    /// Non-fatal findings only; nothing is logged
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        match (self.mint_split(), self.planning_split()) {
            (Ok(mint), Ok(planning)) if mint != planning => {
                vec![ConfigWarning::SplitMismatch { mint, planning }]
            }
            _ => Vec::new(),
        }
    }

    pub fn mint_split(&self) -> Result<DistributionConfig> {
        self.distribution.mint.resolve()
    }

    pub fn planning_split(&self) -> Result<DistributionConfig> {
        self.distribution.planning.resolve()
    }

    /// Rate for every category; unlisted categories get the default
    pub fn token_rates(&self) -> Result<BTreeMap<Category, u64>> {
        let mut rates: BTreeMap<Category, u64> = Category::ALL
            .iter()
            .map(|c| (*c, DEFAULT_TOKENS_PER_UNIT))
            .collect();
        for (tag, rate) in &self.ledger.token_rates {
            let category: Category = tag.parse()?;
            if *rate == 0 {
                return Err(EconomicsError::Configuration(format!(
                    "token rate for {} must be positive",
                    category
                )));
            }
            rates.insert(category, *rate);
        }
        Ok(rates)
    }

    pub fn registry(&self) -> Result<Arc<MilestoneRegistry>> {
        let overrides = self
            .milestones
            .iter()
            .map(MilestoneOverride::to_table)
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(MilestoneRegistry::with_overrides(overrides)?))
    }

    pub fn ledger(&self) -> ActivityLedger {
        ActivityLedger::new(self.ledger.reading_tolerance)
    }

    /// Mint engine over `store` with the configured split, fees and rates
    pub fn mint_engine(&self, store: Arc<dyn BaselineStore>) -> Result<MintEngine> {
        MintEngine::new(store, self.mint_split()?)?
            .with_transfer_config(self.transfer)?
            .with_token_rates(self.token_rates()?)
    }

    pub fn simulator(&self) -> LiquiditySimulator {
        LiquiditySimulator::new(self.simulation.divergence_months)
    }
}
