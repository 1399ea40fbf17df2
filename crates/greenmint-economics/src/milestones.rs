//! # Milestone Catalog
//!
//! Static, ordered threshold tables per category. Loaded once into an
//! immutable [`MilestoneRegistry`] and shared by handle.
//!
//! ## Standard Catalog
//!
//! | Category | Tiers | First | Last |
//! |----------|-------|-------|------|
//! | Solar | 8 | 100 kWh | 50,000 kWh |
//! | Battery | 7 | 50 kWh | 10,000 kWh |
//! | EV Miles | 8 | 100 mi | 100,000 mi |
//! | Charging | 7 | 50 kWh | 10,000 kWh |

use greenmint_core::{Category, EconomicsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A single cumulative threshold within one category
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MilestoneTier {
    /// Stable identifier (e.g. "solar-3")
    pub id: String,
    /// Display name
    pub name: String,
    /// Lifetime value at which the tier is earned
    pub threshold: f64,
}

impl MilestoneTier {
    pub fn new(id: impl Into<String>, name: impl Into<String>, threshold: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            threshold,
        }
    }
}

/// Ordered tiers of one category
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MilestoneTable {
    pub category: Category,
    pub tiers: Vec<MilestoneTier>,
}

impl MilestoneTable {
    /// Create a validated table
    pub fn new(category: Category, tiers: Vec<MilestoneTier>) -> Result<Self> {
        let table = Self { category, tiers };
        table.validate()?;
        Ok(table)
    }

    /// Build a table from bare thresholds, generating ids and names
    pub fn from_thresholds(category: Category, thresholds: &[f64]) -> Result<Self> {
        let tiers = thresholds
            .iter()
            .enumerate()
            .map(|(i, t)| {
                MilestoneTier::new(
                    format!("{}-{}", category.tag(), i + 1),
                    format!("{} {} {}", category.name(), t, category.unit()),
                    *t,
                )
            })
            .collect();
        Self::new(category, tiers)
    }

    /// Thresholds must be finite, non-negative and strictly increasing
    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            return Err(EconomicsError::Configuration(format!(
                "milestone table for {} is empty",
                self.category
            )));
        }

        let mut ids = HashSet::new();
        let mut previous: Option<f64> = None;
        for tier in &self.tiers {
            if !tier.threshold.is_finite() || tier.threshold < 0.0 {
                return Err(EconomicsError::Configuration(format!(
                    "milestone {} has invalid threshold {}",
                    tier.id, tier.threshold
                )));
            }
            if let Some(prev) = previous {
                if tier.threshold <= prev {
                    return Err(EconomicsError::Configuration(format!(
                        "milestone thresholds for {} must strictly increase ({} after {})",
                        self.category, tier.threshold, prev
                    )));
                }
            }
            if !ids.insert(tier.id.as_str()) {
                return Err(EconomicsError::Configuration(format!(
                    "duplicate milestone id {}",
                    tier.id
                )));
            }
            previous = Some(tier.threshold);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Index of the highest defined tier
    pub fn highest_index(&self) -> usize {
        self.tiers.len().saturating_sub(1)
    }

    pub fn tier(&self, index: usize) -> Option<&MilestoneTier> {
        self.tiers.get(index)
    }

    /// Next tier not yet reached and the remaining distance to it
    pub fn next_tier(&self, value: f64) -> Option<(&MilestoneTier, f64)> {
        self.tiers
            .iter()
            .find(|t| t.threshold > value)
            .map(|t| (t, t.threshold - value))
    }
}

fn tier(category: Category, index: usize, name: &str, threshold: f64) -> MilestoneTier {
    MilestoneTier::new(format!("{}-{}", category.tag(), index), name, threshold)
}

/// Standard tiers for a category
pub fn standard_table(category: Category) -> MilestoneTable {
    let c = category;
    let tiers = match category {
        Category::Solar => vec![
            tier(c, 1, "First Light", 100.0),
            tier(c, 2, "Sun Catcher", 500.0),
            tier(c, 3, "Rooftop Regular", 1_000.0),
            tier(c, 4, "Photon Farmer", 2_500.0),
            tier(c, 5, "Solar Steward", 5_000.0),
            tier(c, 6, "Daystar", 10_000.0),
            tier(c, 7, "Helios", 25_000.0),
            tier(c, 8, "Sun King", 50_000.0),
        ],
        Category::Battery => vec![
            tier(c, 1, "First Charge Held", 50.0),
            tier(c, 2, "Peak Shaver", 250.0),
            tier(c, 3, "Grid Buffer", 500.0),
            tier(c, 4, "Night Shift", 1_000.0),
            tier(c, 5, "Load Balancer", 2_500.0),
            tier(c, 6, "Powerwall Pro", 5_000.0),
            tier(c, 7, "Storage Sage", 10_000.0),
        ],
        Category::EvMiles => vec![
            tier(c, 1, "First Mile", 100.0),
            tier(c, 2, "Commuter", 500.0),
            tier(c, 3, "Road Tripper", 1_000.0),
            tier(c, 4, "Zero-Emission Cruiser", 5_000.0),
            tier(c, 5, "Mileage Maker", 10_000.0),
            tier(c, 6, "Coast to Coast", 25_000.0),
            tier(c, 7, "Electric Nomad", 50_000.0),
            tier(c, 8, "Around the World x4", 100_000.0),
        ],
        Category::Charging => vec![
            tier(c, 1, "Plugged In", 50.0),
            tier(c, 2, "Topped Up", 250.0),
            tier(c, 3, "Charge Regular", 500.0),
            tier(c, 4, "Supercharged", 1_000.0),
            tier(c, 5, "Kilowatt Collector", 2_500.0),
            tier(c, 6, "Megawatt Mover", 5_000.0),
            tier(c, 7, "Charge Master", 10_000.0),
        ],
    };
    MilestoneTable { category, tiers }
}

/// Immutable catalog of milestone tables, one per category
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RegistryTables")]
pub struct MilestoneRegistry {
    tables: BTreeMap<Category, MilestoneTable>,
}

/// Unchecked wire form of a registry
#[derive(Deserialize)]
struct RegistryTables {
    tables: BTreeMap<Category, MilestoneTable>,
}

impl TryFrom<RegistryTables> for MilestoneRegistry {
    type Error = EconomicsError;

    fn try_from(raw: RegistryTables) -> Result<Self> {
        if let Some((key, table)) = raw.tables.iter().find(|(key, t)| t.category != **key) {
            return Err(EconomicsError::Configuration(format!(
                "{} table stored under {}",
                table.category, key
            )));
        }
        let registry = Self { tables: raw.tables };
        registry.validate()?;
        Ok(registry)
    }
}

impl MilestoneRegistry {
    /// Catalog shipped with the product
    pub fn standard() -> Self {
        let tables = Category::ALL
            .iter()
            .map(|c| (*c, standard_table(*c)))
            .collect();
        Self { tables }
    }

    /// Standard catalog with per-category replacements
    pub fn with_overrides(overrides: Vec<MilestoneTable>) -> Result<Self> {
        let mut registry = Self::standard();
        for table in overrides {
            table.validate()?;
            registry.tables.insert(table.category, table);
        }
        Ok(registry)
    }

    /// Every category must be present and valid
    pub fn validate(&self) -> Result<()> {
        for category in Category::ALL {
            match self.tables.get(&category) {
                Some(table) => table.validate()?,
                None => {
                    return Err(EconomicsError::Configuration(format!(
                        "no milestone table for {}",
                        category
                    )))
                }
            }
        }
        Ok(())
    }

    /// Table for a category
    ///
    /// Construction guarantees one table per category.
    pub fn table(&self, category: Category) -> &MilestoneTable {
        &self.tables[&category]
    }

    pub fn tables(&self) -> impl Iterator<Item = &MilestoneTable> {
        self.tables.values()
    }

    /// Total number of category tiers across the catalog
    pub fn total_tiers(&self) -> usize {
        self.tables.values().map(|t| t.len()).sum()
    }
}

impl Default for MilestoneRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
