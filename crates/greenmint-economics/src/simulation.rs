//! # Liquidity Simulation
//!
//! Scenario projector for token price and pool health. Pure functions of a
//! [`Scenario`]; no state survives between runs, so scenarios can be
//! evaluated concurrently. Months within a run are sequential.
//!
//! ## Model
//!
//! ```text
//! token_reserve₀ = seed / start_price        k = seed × token_reserve₀  (fixed)
//!
//! each month m:
//!   users    = min(target, ramp_start + m × (target − ramp_start) / horizon)
//!   inject   = users × subscription × liquidity_share
//!   pool_usd += inject
//!   pool_tok = k / pool_usd
//!   price    = clamp(pool_usd / pool_tok, floor, cap)
//!   minted   = users × activity  → split → circulating += to_users − burned + unlock(m)
//! ```
//!
//! Injections are one-sided USD deposits; there are no swaps.
//!
//! ## Sustainability
//!
//! | Coverage (injection / sell pressure) | Class |
//! |--------------------------------------|-------|
//! | ≥ 1.0 | Optimal |
//! | 0.7 – 1.0 | Healthy |
//! | < 0.7 | At Risk |
//!
//! Sell pressure is valued at the fixed starting price, not the simulated
//! price of the month.

use crate::distribution::DistributionConfig;
use greenmint_core::{EconomicsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coverage at or above which a scenario is Optimal
pub const OPTIMAL_COVERAGE: f64 = 1.0;

/// Coverage at or above which a scenario is Healthy
pub const HEALTHY_COVERAGE: f64 = 0.7;

/// Default projection horizon
pub const DEFAULT_HORIZON_MONTHS: u32 = 36;

/// Consecutive months on the floor clamp that flag divergence
pub const DEFAULT_DIVERGENCE_MONTHS: u32 = 3;

/// Planning scenario
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Target paying users at the end of the ramp
    pub paying_users: u64,
    /// Paying users in month 0
    pub ramp_start_users: u64,
    /// Activity units (= tokens before split) per user per month
    pub avg_monthly_activity_units_per_user: f64,
    pub initial_liquidity_seed_usd: f64,
    pub mint_burn_rate_pct: f64,
    pub liquidity_pct: f64,
    pub treasury_pct: f64,
    /// Share of users' tokens sold each month
    pub monthly_sell_pressure_rate_pct: f64,
    pub subscription_price_usd: f64,
    /// Share of subscription revenue injected into the pool
    pub subscription_to_liquidity_share_pct: f64,
    /// Also the fixed reference price for sell pressure
    pub starting_token_price_usd: f64,
    pub floor_price_usd: f64,
    pub cap_price_usd: f64,
    pub initial_circulating_supply: f64,
    /// Treasury/LP tokens unlocked per month; later months unlock nothing
    pub unlock_schedule: Vec<f64>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::ideal()
    }
}

impl Scenario {
    /// The product's documented "ideal" preset
    pub fn ideal() -> Self {
        let split = DistributionConfig::PLANNING;
        Self {
            paying_users: 5_000,
            ramp_start_users: 500,
            avg_monthly_activity_units_per_user: 500.0,
            initial_liquidity_seed_usd: 100_000.0,
            mint_burn_rate_pct: 20.0,
            liquidity_pct: split.liquidity_percent(),
            treasury_pct: split.treasury_percent(),
            monthly_sell_pressure_rate_pct: 15.0,
            subscription_price_usd: 9.99,
            subscription_to_liquidity_share_pct: 50.0,
            starting_token_price_usd: 0.10,
            floor_price_usd: 0.01,
            cap_price_usd: 10.0,
            initial_circulating_supply: 0.0,
            unlock_schedule: Vec::new(),
        }
    }

    /// Low activity, low sell pressure
    pub fn conservative() -> Self {
        Self {
            avg_monthly_activity_units_per_user: 300.0,
            monthly_sell_pressure_rate_pct: 10.0,
            ..Self::ideal()
        }
    }

    /// Heavy activity and selling under the live split
    pub fn stress() -> Self {
        Self {
            avg_monthly_activity_units_per_user: 1_500.0,
            monthly_sell_pressure_rate_pct: 30.0,
            ..Self::ideal().with_distribution(&DistributionConfig::LIVE)
        }
    }

    /// Look up a named preset
    pub fn preset(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ideal" => Ok(Self::ideal()),
            "conservative" => Ok(Self::conservative()),
            "stress" => Ok(Self::stress()),
            other => Err(EconomicsError::UnknownPreset(other.to_string())),
        }
    }

    /// Take burn/liquidity/treasury rates from a mint split
    pub fn with_distribution(mut self, split: &DistributionConfig) -> Self {
        self.mint_burn_rate_pct = split.burn_percent();
        self.liquidity_pct = split.liquidity_percent();
        self.treasury_pct = split.treasury_percent();
        self
    }

    /// Fraction of minted tokens delivered to users
    pub fn user_share(&self) -> f64 {
        (100.0 - self.mint_burn_rate_pct - self.liquidity_pct - self.treasury_pct) / 100.0
    }

    fn unlocked(&self, month: u32) -> f64 {
        self.unlock_schedule
            .get(month as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// Reject parameters the model cannot run
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("avg_monthly_activity_units_per_user", self.avg_monthly_activity_units_per_user),
            ("initial_liquidity_seed_usd", self.initial_liquidity_seed_usd),
            ("mint_burn_rate_pct", self.mint_burn_rate_pct),
            ("liquidity_pct", self.liquidity_pct),
            ("treasury_pct", self.treasury_pct),
            ("monthly_sell_pressure_rate_pct", self.monthly_sell_pressure_rate_pct),
            ("subscription_price_usd", self.subscription_price_usd),
            ("subscription_to_liquidity_share_pct", self.subscription_to_liquidity_share_pct),
            ("starting_token_price_usd", self.starting_token_price_usd),
            ("floor_price_usd", self.floor_price_usd),
            ("cap_price_usd", self.cap_price_usd),
            ("initial_circulating_supply", self.initial_circulating_supply),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(EconomicsError::InvalidScenario(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.starting_token_price_usd <= 0.0 {
            return Err(EconomicsError::InvalidScenario(
                "starting_token_price_usd must be positive".to_string(),
            ));
        }
        if self.initial_liquidity_seed_usd <= 0.0 {
            return Err(EconomicsError::InvalidScenario(
                "initial_liquidity_seed_usd must be positive".to_string(),
            ));
        }
        if self.floor_price_usd > self.cap_price_usd {
            return Err(EconomicsError::InvalidScenario(format!(
                "floor price {} exceeds cap price {}",
                self.floor_price_usd, self.cap_price_usd
            )));
        }
        let fees = self.mint_burn_rate_pct + self.liquidity_pct + self.treasury_pct;
        if fees > 100.0 {
            return Err(EconomicsError::InvalidScenario(format!(
                "burn + liquidity + treasury = {}% exceeds 100%",
                fees
            )));
        }
        for (name, pct) in [
            ("monthly_sell_pressure_rate_pct", self.monthly_sell_pressure_rate_pct),
            ("subscription_to_liquidity_share_pct", self.subscription_to_liquidity_share_pct),
        ] {
            if pct > 100.0 {
                return Err(EconomicsError::InvalidScenario(format!(
                    "{} cannot exceed 100, got {}",
                    name, pct
                )));
            }
        }
        if let Some(bad) = self.unlock_schedule.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(EconomicsError::InvalidScenario(format!(
                "unlock schedule entry {} is invalid",
                bad
            )));
        }
        Ok(())
    }
}

/// Sustainability class
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sustainability {
    Optimal,
    Healthy,
    AtRisk,
}

impl Sustainability {
    pub fn from_coverage(ratio: f64) -> Self {
        if ratio >= OPTIMAL_COVERAGE {
            Self::Optimal
        } else if ratio >= HEALTHY_COVERAGE {
            Self::Healthy
        } else {
            Self::AtRisk
        }
    }

    /// Get name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Optimal => "Optimal",
            Self::Healthy => "Healthy",
            Self::AtRisk => "At Risk",
        }
    }
}

impl fmt::Display for Sustainability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Steady-state coverage figures at the target user count
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetrics {
    pub liquidity_injection_usd: f64,
    pub tokens_to_users: f64,
    pub sell_pressure_usd: f64,
    /// Infinite when there is no sell pressure
    pub coverage_ratio: f64,
    pub sustainability: Sustainability,
}

/// Coverage figures for a representative month at the target user count
pub fn coverage_metrics(scenario: &Scenario) -> CoverageMetrics {
    // Users cancel out of the ratio; one user stands in for an empty scenario
    let users = scenario.paying_users.max(1) as f64;

    let liquidity_injection_usd = users
        * scenario.subscription_price_usd
        * scenario.subscription_to_liquidity_share_pct
        / 100.0;
    let tokens_to_users =
        users * scenario.avg_monthly_activity_units_per_user * scenario.user_share();
    let sell_pressure_usd = tokens_to_users * scenario.monthly_sell_pressure_rate_pct / 100.0
        * scenario.starting_token_price_usd;

    let coverage_ratio = if sell_pressure_usd > 0.0 {
        liquidity_injection_usd / sell_pressure_usd
    } else {
        f64::INFINITY
    };

    CoverageMetrics {
        liquidity_injection_usd,
        tokens_to_users,
        sell_pressure_usd,
        coverage_ratio,
        sustainability: Sustainability::from_coverage(coverage_ratio),
    }
}

/// LP coverage ratio of a scenario
pub fn compute_coverage(scenario: &Scenario) -> f64 {
    coverage_metrics(scenario).coverage_ratio
}

/// Largest per-user monthly activity that keeps coverage at or above `target`
///
/// Closed-form inversion of the coverage formula.
pub fn max_activity_for_coverage(target: f64, scenario: &Scenario) -> Result<f64> {
    if !target.is_finite() || target <= 0.0 {
        return Err(EconomicsError::InvalidInput(format!(
            "target coverage must be positive, got {}",
            target
        )));
    }
    scenario.validate()?;

    let user_share = scenario.user_share();
    let sell_fraction = scenario.monthly_sell_pressure_rate_pct / 100.0;
    let reference_price = scenario.starting_token_price_usd;
    let denominator = target * user_share * sell_fraction * reference_price;
    if denominator <= 0.0 {
        return Err(EconomicsError::InvalidScenario(
            "no sell pressure reaches users; activity is unbounded".to_string(),
        ));
    }

    let liquidity_share = scenario.subscription_to_liquidity_share_pct / 100.0;
    Ok(scenario.subscription_price_usd * liquidity_share / denominator)
}

/// One month of a projection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlySnapshot {
    pub month: u32,
    pub active_users: u64,
    pub subscription_revenue_usd: f64,
    pub liquidity_injection_usd: f64,
    pub pool_usd_reserve: f64,
    pub pool_token_reserve: f64,
    pub price: f64,
    /// Price was held up by the floor clamp
    pub at_floor: bool,
    pub tokens_minted: f64,
    pub tokens_to_users: f64,
    pub tokens_burned: f64,
    pub unlocked_tokens: f64,
    pub circulating_supply: f64,
    pub total_burned: f64,
}

/// Price pinned to the floor for too long
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DivergenceWarning {
    /// First month of the longest floor run
    pub first_month: u32,
    pub consecutive_months: u32,
}

/// Full evaluation of one scenario
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub horizon_months: u32,
    pub snapshots: Vec<MonthlySnapshot>,
    pub coverage: CoverageMetrics,
    pub divergence: Option<DivergenceWarning>,
    /// Coverage class, downgraded to AtRisk on divergence
    pub sustainability: Sustainability,
}

impl ScenarioReport {
    pub fn final_snapshot(&self) -> Option<&MonthlySnapshot> {
        self.snapshots.last()
    }
}

/// Scenario with a name, for batch runs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedScenario {
    pub name: String,
    #[serde(flatten)]
    pub scenario: Scenario,
}

/// Outcome of one scenario in a batch
#[derive(Debug)]
pub struct BatchEntry {
    pub name: String,
    pub result: Result<ScenarioReport>,
}

/// Scenario projector
#[derive(Clone, Debug)]
pub struct LiquiditySimulator {
    divergence_months: u32,
}

impl Default for LiquiditySimulator {
    fn default() -> Self {
        Self::new(DEFAULT_DIVERGENCE_MONTHS)
    }
}

impl LiquiditySimulator {
    pub fn new(divergence_months: u32) -> Self {
        Self {
            divergence_months: divergence_months.max(1),
        }
    }

    /// Project monthly snapshots
    pub fn project(&self, scenario: &Scenario, horizon_months: u32) -> Result<Vec<MonthlySnapshot>> {
        scenario.validate()?;

        let token_reserve = scenario.initial_liquidity_seed_usd / scenario.starting_token_price_usd;
        let invariant_k = scenario.initial_liquidity_seed_usd * token_reserve;

        let target = scenario.paying_users as f64;
        let ramp_start = scenario.ramp_start_users as f64;
        let horizon = horizon_months as f64;
        let user_share = scenario.user_share();

        let mut pool_usd = scenario.initial_liquidity_seed_usd;
        let mut circulating = scenario.initial_circulating_supply;
        let mut total_burned = 0.0;
        let mut snapshots = Vec::with_capacity(horizon_months as usize);

        for month in 0..horizon_months {
            let ramped = ramp_start + month as f64 * (target - ramp_start) / horizon;
            let active_users = target.min(ramped).max(0.0).floor();

            let revenue = active_users * scenario.subscription_price_usd;
            let injection = revenue * scenario.subscription_to_liquidity_share_pct / 100.0;
            pool_usd += injection;
            let pool_tokens = invariant_k / pool_usd;

            let raw_price = pool_usd / pool_tokens;
            let price = raw_price.clamp(scenario.floor_price_usd, scenario.cap_price_usd);

            let minted = active_users * scenario.avg_monthly_activity_units_per_user;
            let burned = minted * scenario.mint_burn_rate_pct / 100.0;
            let to_users = minted * user_share;
            let unlocked = scenario.unlocked(month);

            circulating = (circulating + to_users - burned + unlocked).max(0.0);
            total_burned += burned;

            snapshots.push(MonthlySnapshot {
                month,
                active_users: active_users as u64,
                subscription_revenue_usd: revenue,
                liquidity_injection_usd: injection,
                pool_usd_reserve: pool_usd,
                pool_token_reserve: pool_tokens,
                price,
                at_floor: raw_price <= scenario.floor_price_usd,
                tokens_minted: minted,
                tokens_to_users: to_users,
                tokens_burned: burned,
                unlocked_tokens: unlocked,
                circulating_supply: circulating,
                total_burned,
            });
        }

        Ok(snapshots)
    }

    /// Projection plus coverage and divergence classification
    pub fn evaluate(&self, scenario: &Scenario, horizon_months: u32) -> Result<ScenarioReport> {
        let snapshots = self.project(scenario, horizon_months)?;
        let coverage = coverage_metrics(scenario);
        let divergence = self.detect_divergence(&snapshots);

        let sustainability = match &divergence {
            Some(warning) => {
                tracing::warn!(
                    first_month = warning.first_month,
                    months = warning.consecutive_months,
                    "price held at floor clamp; scenario diverging"
                );
                Sustainability::AtRisk
            }
            None => coverage.sustainability,
        };

        Ok(ScenarioReport {
            horizon_months,
            snapshots,
            coverage,
            divergence,
            sustainability,
        })
    }

    /// Evaluate many scenarios; each failure stays in its own entry
    pub fn evaluate_batch(&self, scenarios: &[NamedScenario], horizon_months: u32) -> Vec<BatchEntry> {
        scenarios
            .iter()
            .map(|named| {
                let result = self.evaluate(&named.scenario, horizon_months);
                if let Err(e) = &result {
                    tracing::warn!(scenario = %named.name, error = %e, "scenario rejected");
                }
                BatchEntry {
                    name: named.name.clone(),
                    result,
                }
            })
            .collect()
    }

    fn detect_divergence(&self, snapshots: &[MonthlySnapshot]) -> Option<DivergenceWarning> {
        let mut longest: Option<DivergenceWarning> = None;
        let mut run_start = 0u32;
        let mut run = 0u32;

        for snapshot in snapshots {
            if snapshot.at_floor {
                if run == 0 {
                    run_start = snapshot.month;
                }
                run += 1;
                if run >= self.divergence_months
                    && longest.as_ref().map(|w| run > w.consecutive_months).unwrap_or(true)
                {
                    longest = Some(DivergenceWarning {
                        first_month: run_start,
                        consecutive_months: run,
                    });
                }
            } else {
                run = 0;
            }
        }
        longest
    }
}
