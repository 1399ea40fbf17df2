//! # Activity Ledger
//!
//! Per-user, per-category cumulative readings and the baseline recorded at
//! the last mint. Pending (mintable) activity is always derived, never stored.
//!
//! ## Fresh-Start / Baseline-Delta Rule
//!
//! ```text
//! lifetime < baseline          → 0          (data-source anomaly)
//! lifetime - baseline > 0      → delta      (new activity since last mint)
//! row never minted             → lifetime   (historical production on connect)
//! otherwise                    → 0
//! ```
//!
//! Every row carries a version and its own minted total; mints reset the
//! baseline and credit that total through compare-and-set on the version, so
//! one pending amount is consumed once and categories never affect each other.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use greenmint_core::constants::DEFAULT_READING_TOLERANCE;
use greenmint_core::{Category, ChargingReading, EconomicsError, Result, TokenAmount, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Derive the mintable amount for one category; `minted` is what this
/// category has already minted for the user
pub fn compute_pending(lifetime: f64, baseline: f64, minted: TokenAmount) -> f64 {
    if !lifetime.is_finite() || !baseline.is_finite() || lifetime < 0.0 {
        return 0.0;
    }
    if lifetime < baseline {
        return 0.0;
    }

    let delta = (lifetime - baseline).max(0.0);
    if delta > 0.0 {
        return delta;
    }
    if minted == 0 {
        return lifetime;
    }
    0.0
}

/// Whole units that can be minted; fractions below one unit stay pending
pub fn mintable_units(pending: f64) -> u64 {
    if !pending.is_finite() || pending <= 0.0 {
        return 0;
    }
    pending.floor() as u64
}

/// A cumulative reading from the ingestion layer
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Lifetime value in the category's unit
    pub value: f64,
    /// When the source observed the value
    pub as_of: DateTime<Utc>,
}

/// Outcome of recording a reading
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ReadingStatus {
    /// First reading for this key; baseline set to it
    Created,
    /// Lifetime moved forward
    Advanced { delta: f64 },
    /// Same value, or a drop within tolerance (ignored)
    Unchanged,
    /// Lifetime dropped beyond tolerance; pending clamps to 0 this cycle
    Regressed { previous: f64, reported: f64 },
}

/// Ledger row key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerKey {
    pub user: UserId,
    pub category: Category,
}

impl LedgerKey {
    pub fn new(user: UserId, category: Category) -> Self {
        Self { user, category }
    }
}

/// One `(user, category)` ledger row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// Latest accepted lifetime reading
    pub lifetime_value: f64,
    /// Maximum lifetime value ever observed
    pub high_water: f64,
    /// Lifetime value at the last mint (or first connection)
    pub baseline_value: f64,
    /// Gross tokens minted from this row
    pub minted: TokenAmount,
    /// Bumped on every mutation; compare-and-set token
    pub version: u64,
    /// Timestamp of the last accepted reading
    pub updated_at: DateTime<Utc>,
}

impl LedgerRow {
    fn connected(value: f64, as_of: DateTime<Utc>) -> Self {
        Self {
            lifetime_value: value,
            high_water: value,
            baseline_value: value,
            minted: 0,
            version: 0,
            updated_at: as_of,
        }
    }

    pub fn pending(&self) -> f64 {
        compute_pending(self.lifetime_value, self.baseline_value, self.minted)
    }
}

/// Source of lifetime readings (device integrations)
pub trait ReadingSource: Send + Sync {
    /// Latest lifetime value, or None if the user has no such device
    fn lifetime_value(&self, user: &UserId, category: Category) -> Option<Reading>;
}

/// Baseline persistence with atomic compare-and-set
pub trait BaselineStore: Send + Sync {
    /// Copy of the current row
    fn snapshot(&self, key: &LedgerKey) -> Option<LedgerRow>;

    fn load_baseline(&self, key: &LedgerKey) -> Option<f64> {
        self.snapshot(key).map(|row| row.baseline_value)
    }

    /// Set the baseline iff the row is still at `expected_version`, and
    /// credit `minted` to the row and to the user's aggregate before the row
    /// is released. Returns the new version.
    fn compare_and_set_baseline(
        &self,
        key: &LedgerKey,
        expected_version: u64,
        new_baseline: f64,
        minted: TokenAmount,
    ) -> Result<u64>;

    /// Aggregate tokens minted for a user across categories
    fn lifetime_minted(&self, user: &UserId) -> TokenAmount;
}

/// In-memory activity ledger
pub struct ActivityLedger {
    /// Rows keyed by (user, category); each entry is locked independently
    rows: DashMap<LedgerKey, LedgerRow>,

    /// Known identities and their aggregate minted tokens
    minted: DashMap<UserId, TokenAmount>,

    /// Drop (in units) tolerated before a reading counts as a regression
    reading_tolerance: f64,
}

impl Default for ActivityLedger {
    fn default() -> Self {
        Self::new(DEFAULT_READING_TOLERANCE)
    }
}

impl ActivityLedger {
    /// Create new ledger
    pub fn new(reading_tolerance: f64) -> Self {
        Self {
            rows: DashMap::new(),
            minted: DashMap::new(),
            reading_tolerance: reading_tolerance.max(0.0),
        }
    }

    /// Record that a user has an identity / wallet record
    pub fn register_user(&self, user: UserId) {
        self.minted.entry(user).or_insert(0);
    }

    pub fn has_identity(&self, user: &UserId) -> bool {
        self.minted.contains_key(user)
    }

    /// Ingest a lifetime reading
    pub fn record_reading(
        &self,
        user: UserId,
        category: Category,
        value: f64,
        as_of: DateTime<Utc>,
    ) -> Result<ReadingStatus> {
        if !value.is_finite() || value < 0.0 {
            tracing::warn!(%user, %category, value, "rejecting invalid reading");
            return Err(EconomicsError::InvalidReading {
                user,
                category,
                reason: format!("value {} is not a finite non-negative number", value),
            });
        }

        self.register_user(user);
        let key = LedgerKey::new(user, category);

        let mut row = match self.rows.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(LedgerRow::connected(value, as_of));
                tracing::debug!(%user, %category, value, "device connected");
                return Ok(ReadingStatus::Created);
            }
            Entry::Occupied(occupied) => occupied.into_ref(),
        };

        let previous = row.lifetime_value;
        if value > previous {
            row.lifetime_value = value;
            row.high_water = row.high_water.max(value);
            row.updated_at = as_of;
            row.version += 1;
            return Ok(ReadingStatus::Advanced {
                delta: value - previous,
            });
        }

        if previous - value <= self.reading_tolerance {
            return Ok(ReadingStatus::Unchanged);
        }

        tracing::warn!(
            %user,
            %category,
            previous,
            reported = value,
            "lifetime reading regressed; no new pending this cycle"
        );
        row.lifetime_value = value;
        row.updated_at = as_of;
        row.version += 1;
        Ok(ReadingStatus::Regressed {
            previous,
            reported: value,
        })
    }

    /// Ingest both charging meters; they are summed before anything else
    pub fn record_charging(
        &self,
        user: UserId,
        reading: ChargingReading,
        as_of: DateTime<Utc>,
    ) -> Result<ReadingStatus> {
        if reading.home_kwh < 0.0 || reading.supercharger_kwh < 0.0 {
            return Err(EconomicsError::InvalidReading {
                user,
                category: Category::Charging,
                reason: format!(
                    "negative meter value (home {}, supercharger {})",
                    reading.home_kwh, reading.supercharger_kwh
                ),
            });
        }
        self.record_reading(user, Category::Charging, reading.total(), as_of)
    }

    /// Pull the latest readings for every category from a source.
    /// Invalid readings are reported per category and never abort the sync.
    pub fn sync_from(
        &self,
        source: &dyn ReadingSource,
        user: UserId,
    ) -> Vec<(Category, Result<ReadingStatus>)> {
        Category::ALL
            .iter()
            .filter_map(|category| {
                source.lifetime_value(&user, *category).map(|reading| {
                    (
                        *category,
                        self.record_reading(user, *category, reading.value, reading.as_of),
                    )
                })
            })
            .collect()
    }

    /// Pending activity for one category
    pub fn pending(&self, user: &UserId, category: Category) -> f64 {
        self.rows
            .get(&LedgerKey::new(*user, category))
            .map(|row| row.pending())
            .unwrap_or(0.0)
    }

    /// Pending activity floored to whole units
    pub fn pending_units(&self, user: &UserId, category: Category) -> u64 {
        mintable_units(self.pending(user, category))
    }

    /// Highest lifetime value ever observed; drives achievements
    pub fn high_water(&self, user: &UserId, category: Category) -> f64 {
        self.rows
            .get(&LedgerKey::new(*user, category))
            .map(|row| row.high_water)
            .unwrap_or(0.0)
    }

    /// High-water marks for every category (0 where no device is connected)
    pub fn high_water_marks(&self, user: &UserId) -> BTreeMap<Category, f64> {
        Category::ALL
            .iter()
            .map(|c| (*c, self.high_water(user, *c)))
            .collect()
    }

    /// Number of ledger rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl BaselineStore for ActivityLedger {
    fn snapshot(&self, key: &LedgerKey) -> Option<LedgerRow> {
        self.rows.get(key).map(|row| row.clone())
    }

    fn compare_and_set_baseline(
        &self,
        key: &LedgerKey,
        expected_version: u64,
        new_baseline: f64,
        minted: TokenAmount,
    ) -> Result<u64> {
        let conflict = || EconomicsError::ConcurrentMintConflict {
            user: key.user,
            category: key.category,
        };

        let mut row = self.rows.get_mut(key).ok_or_else(conflict)?;
        if row.version != expected_version {
            return Err(conflict());
        }
        row.baseline_value = new_baseline;
        row.minted += minted;
        row.version += 1;

        *self.minted.entry(key.user).or_insert(0) += minted;
        Ok(row.version)
    }

    fn lifetime_minted(&self, user: &UserId) -> TokenAmount {
        self.minted.get(user).map(|m| *m).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::from_identity("alice")
    }

    #[test]
    fn test_fresh_start_rule() {
        assert_eq!(compute_pending(1_000.0, 0.0, 0), 1_000.0);
        // Connected mid-lifetime: baseline equals lifetime, never minted
        assert_eq!(compute_pending(1_000.0, 1_000.0, 0), 1_000.0);
        // Same situation after any mint: nothing new
        assert_eq!(compute_pending(1_000.0, 1_000.0, 50), 0.0);
    }

    #[test]
    fn test_delta_rule() {
        assert_eq!(compute_pending(1_250.0, 1_000.0, 930), 250.0);
        assert_eq!(compute_pending(1_250.0, 1_000.0, 0), 250.0);
    }

    #[test]
    fn test_anomaly_clamps_to_zero() {
        assert_eq!(compute_pending(900.0, 1_000.0, 0), 0.0);
        assert_eq!(compute_pending(f64::NAN, 0.0, 0), 0.0);
        assert_eq!(compute_pending(-5.0, 0.0, 0), 0.0);
    }

    #[test]
    fn test_mintable_units_floor() {
        assert_eq!(mintable_units(0.99), 0);
        assert_eq!(mintable_units(250.7), 250);
        assert_eq!(mintable_units(-1.0), 0);
    }

    #[test]
    fn test_first_reading_connects() {
        let ledger = ActivityLedger::default();
        let status = ledger
            .record_reading(alice(), Category::Solar, 1_000.0, Utc::now())
            .unwrap();

        assert_eq!(status, ReadingStatus::Created);
        assert!(ledger.has_identity(&alice()));
        let row = ledger
            .snapshot(&LedgerKey::new(alice(), Category::Solar))
            .unwrap();
        assert_eq!(row.baseline_value, 1_000.0);
        // Fresh start: full history is mintable
        assert_eq!(ledger.pending(&alice(), Category::Solar), 1_000.0);
    }

    #[test]
    fn test_invalid_reading_rejected() {
        let ledger = ActivityLedger::default();
        ledger
            .record_reading(alice(), Category::Battery, 10.0, Utc::now())
            .unwrap();

        let err = ledger
            .record_reading(alice(), Category::Battery, f64::NAN, Utc::now())
            .unwrap_err();
        assert!(err.is_recoverable());
        assert!(ledger
            .record_reading(alice(), Category::Battery, -1.0, Utc::now())
            .is_err());
        // Stored row untouched
        assert_eq!(ledger.high_water(&alice(), Category::Battery), 10.0);
    }

    #[test]
    fn test_regression_keeps_high_water() {
        let ledger = ActivityLedger::new(0.5);
        let now = Utc::now();
        ledger.record_reading(alice(), Category::EvMiles, 500.0, now).unwrap();
        ledger.record_reading(alice(), Category::EvMiles, 800.0, now).unwrap();

        let jitter = ledger
            .record_reading(alice(), Category::EvMiles, 799.8, now)
            .unwrap();
        assert_eq!(jitter, ReadingStatus::Unchanged);

        let status = ledger
            .record_reading(alice(), Category::EvMiles, 600.0, now)
            .unwrap();
        assert_eq!(
            status,
            ReadingStatus::Regressed {
                previous: 800.0,
                reported: 600.0
            }
        );
        assert_eq!(ledger.high_water(&alice(), Category::EvMiles), 800.0);
    }

    #[test]
    fn test_charging_meters_summed() {
        let ledger = ActivityLedger::default();
        ledger
            .record_charging(alice(), ChargingReading::new(120.0, 80.0), Utc::now())
            .unwrap();
        assert_eq!(ledger.high_water(&alice(), Category::Charging), 200.0);

        let err = ledger
            .record_charging(alice(), ChargingReading::new(-1.0, 80.0), Utc::now())
            .unwrap_err();
        assert_eq!(err.code(), 2001);
    }

    #[test]
    fn test_compare_and_set() {
        let ledger = ActivityLedger::default();
        let key = LedgerKey::new(alice(), Category::Solar);
        ledger.record_reading(alice(), Category::Solar, 100.0, Utc::now()).unwrap();

        let version = ledger.snapshot(&key).unwrap().version;
        let new_version = ledger
            .compare_and_set_baseline(&key, version, 100.0, 93)
            .unwrap();
        assert_eq!(new_version, version + 1);
        assert_eq!(ledger.snapshot(&key).unwrap().minted, 93);
        assert_eq!(ledger.lifetime_minted(&alice()), 93);

        // Stale version loses and credits nothing
        let err = ledger
            .compare_and_set_baseline(&key, version, 100.0, 93)
            .unwrap_err();
        assert_eq!(ledger.lifetime_minted(&alice()), 93);
        assert!(matches!(err, EconomicsError::ConcurrentMintConflict { .. }));
    }

    #[test]
    fn test_history_tracked_per_category() {
        let ledger = ActivityLedger::default();
        let now = Utc::now();
        ledger.record_reading(alice(), Category::Solar, 400.0, now).unwrap();
        ledger.record_reading(alice(), Category::Battery, 100.0, now).unwrap();

        let solar = LedgerKey::new(alice(), Category::Solar);
        let version = ledger.snapshot(&solar).unwrap().version;
        ledger
            .compare_and_set_baseline(&solar, version, 400.0, 400)
            .unwrap();

        assert_eq!(ledger.pending(&alice(), Category::Solar), 0.0);
        assert_eq!(ledger.pending(&alice(), Category::Battery), 100.0);
        assert_eq!(ledger.lifetime_minted(&alice()), 400);
    }

    struct FixedSource;

    impl ReadingSource for FixedSource {
        fn lifetime_value(&self, _user: &UserId, category: Category) -> Option<Reading> {
            let value = match category {
                Category::Solar => 1_200.0,
                Category::Battery => -4.0,
                Category::EvMiles => return None,
                Category::Charging => 75.0,
            };
            Some(Reading {
                value,
                as_of: Utc::now(),
            })
        }
    }

    #[test]
    fn test_sync_isolates_bad_category() {
        let ledger = ActivityLedger::default();
        let results = ledger.sync_from(&FixedSource, alice());

        assert_eq!(results.len(), 3);
        let battery = results.iter().find(|(c, _)| *c == Category::Battery).unwrap();
        assert!(battery.1.is_err());
        assert_eq!(ledger.high_water(&alice(), Category::Solar), 1_200.0);
        assert_eq!(ledger.high_water(&alice(), Category::Charging), 75.0);
    }
}
