//! # Achievement Engine
//!
//! Earned single-category tiers and cross-category combo achievements.
//!
//! ## Combo Rules
//!
//! | Rule | Condition |
//! |------|-----------|
//! | Two Categories | earned tiers span ≥ 2 categories |
//! | Three Categories | earned tiers span ≥ 3 categories |
//! | Five / Ten / Twenty / Thirty Tiers | total category tiers ≥ 5 / 10 / 20 / 30 |
//! | Category Maxed | one category at its highest tier |
//! | All Maxed | every category at its highest tier |
//!
//! Evaluation order is fixed: per-category counts, then combos, then the
//! grand total (`WELCOME + tiers + combos`).

use crate::activity::ActivityLedger;
use crate::milestones::{MilestoneRegistry, MilestoneTable, MilestoneTier};
use greenmint_core::{Category, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Every tier whose threshold is at or below `value`, ascending
pub fn earned_tiers(value: f64, table: &MilestoneTable) -> Vec<&MilestoneTier> {
    table
        .tiers
        .iter()
        .take_while(|t| t.threshold <= value)
        .collect()
}

/// Cross-category combo achievement
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComboRule {
    TwoCategories,
    ThreeCategories,
    FiveTiers,
    TenTiers,
    TwentyTiers,
    ThirtyTiers,
    CategoryMaxed,
    AllMaxed,
}

impl ComboRule {
    pub const ALL: [ComboRule; 8] = [
        ComboRule::TwoCategories,
        ComboRule::ThreeCategories,
        ComboRule::FiveTiers,
        ComboRule::TenTiers,
        ComboRule::TwentyTiers,
        ComboRule::ThirtyTiers,
        ComboRule::CategoryMaxed,
        ComboRule::AllMaxed,
    ];

    /// Get name
    pub fn name(&self) -> &'static str {
        match self {
            Self::TwoCategories => "Double Threat",
            Self::ThreeCategories => "Triple Crown",
            Self::FiveTiers => "High Five",
            Self::TenTiers => "Perfect Ten",
            Self::TwentyTiers => "Score",
            Self::ThirtyTiers => "Thirty Strong",
            Self::CategoryMaxed => "Specialist",
            Self::AllMaxed => "Grand Slam",
        }
    }

    fn satisfied(&self, progress: &ComboProgress) -> bool {
        match self {
            Self::TwoCategories => progress.categories_with_tiers >= 2,
            Self::ThreeCategories => progress.categories_with_tiers >= 3,
            Self::FiveTiers => progress.total_tiers >= 5,
            Self::TenTiers => progress.total_tiers >= 10,
            Self::TwentyTiers => progress.total_tiers >= 20,
            Self::ThirtyTiers => progress.total_tiers >= 30,
            Self::CategoryMaxed => progress.maxed_categories >= 1,
            Self::AllMaxed => progress.maxed_categories == Category::ALL.len(),
        }
    }
}

impl fmt::Display for ComboRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

struct ComboProgress {
    categories_with_tiers: usize,
    total_tiers: usize,
    maxed_categories: usize,
}

/// Evaluate all eight combo rules independently
///
/// `max_tier_by_category` holds the 0-based index of the highest tier
/// reached, for categories with at least one earned tier.
pub fn combo_achievements(
    earned_by_category: &BTreeMap<Category, usize>,
    max_tier_by_category: &BTreeMap<Category, usize>,
    registry: &MilestoneRegistry,
) -> Vec<ComboRule> {
    let progress = ComboProgress {
        categories_with_tiers: earned_by_category.values().filter(|n| **n > 0).count(),
        total_tiers: earned_by_category.values().sum(),
        maxed_categories: Category::ALL
            .iter()
            .filter(|c| {
                max_tier_by_category
                    .get(*c)
                    .map(|idx| *idx >= registry.table(**c).highest_index())
                    .unwrap_or(false)
            })
            .count(),
    };

    ComboRule::ALL
        .iter()
        .copied()
        .filter(|rule| rule.satisfied(&progress))
        .collect()
}

/// Identifier of anything a user can earn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AchievementId {
    /// Earned by every user with an identity record
    Welcome,
    /// 0-based tier index within a category
    Tier { category: Category, index: usize },
    Combo { rule: ComboRule },
}

impl fmt::Display for AchievementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome => write!(f, "welcome"),
            Self::Tier { category, index } => write!(f, "{}-{}", category.tag(), index + 1),
            Self::Combo { rule } => write!(f, "combo:{:?}", rule),
        }
    }
}

/// Read model for display layers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EarnedAchievements {
    pub welcome: bool,
    pub tiers: BTreeMap<Category, Vec<MilestoneTier>>,
    pub combos: Vec<ComboRule>,
    /// WELCOME + category tiers + combos
    pub total_earned: usize,
}

impl EarnedAchievements {
    pub fn tier_count(&self) -> usize {
        self.tiers.values().map(|t| t.len()).sum()
    }

    /// Every earned achievement id
    pub fn ids(&self) -> Vec<AchievementId> {
        let mut ids = Vec::with_capacity(self.total_earned);
        if self.welcome {
            ids.push(AchievementId::Welcome);
        }
        for (category, tiers) in &self.tiers {
            ids.extend((0..tiers.len()).map(|index| AchievementId::Tier {
                category: *category,
                index,
            }));
        }
        ids.extend(self.combos.iter().map(|rule| AchievementId::Combo { rule: *rule }));
        ids
    }

    pub fn contains(&self, id: &AchievementId) -> bool {
        match id {
            AchievementId::Welcome => self.welcome,
            AchievementId::Tier { category, index } => self
                .tiers
                .get(category)
                .map(|t| *index < t.len())
                .unwrap_or(false),
            AchievementId::Combo { rule } => self.combos.contains(rule),
        }
    }
}

/// Achievement engine over an immutable milestone catalog
#[derive(Clone, Debug)]
pub struct AchievementEngine {
    registry: Arc<MilestoneRegistry>,
}

impl AchievementEngine {
    pub fn new(registry: Arc<MilestoneRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MilestoneRegistry {
        &self.registry
    }

    /// Tiers earned in one category at a given lifetime value
    pub fn earned_tiers(&self, category: Category, value: f64) -> Vec<&MilestoneTier> {
        earned_tiers(value, self.registry.table(category))
    }

    /// Evaluate achievements from per-category high-water marks
    pub fn evaluate(&self, welcome: bool, high_water: &BTreeMap<Category, f64>) -> EarnedAchievements {
        let mut tiers = BTreeMap::new();
        let mut earned_by_category = BTreeMap::new();
        let mut max_tier_by_category = BTreeMap::new();

        for category in Category::ALL {
            let value = high_water.get(&category).copied().unwrap_or(0.0);
            let earned: Vec<MilestoneTier> = self
                .earned_tiers(category, value)
                .into_iter()
                .cloned()
                .collect();

            earned_by_category.insert(category, earned.len());
            if let Some(max_index) = earned.len().checked_sub(1) {
                max_tier_by_category.insert(category, max_index);
            }
            tiers.insert(category, earned);
        }

        let combos = combo_achievements(&earned_by_category, &max_tier_by_category, &self.registry);
        let tier_total: usize = earned_by_category.values().sum();
        let total_earned = usize::from(welcome) + tier_total + combos.len();

        EarnedAchievements {
            welcome,
            tiers,
            combos,
            total_earned,
        }
    }

    /// Read model for one user from the ledger's high-water marks
    pub fn list_earned(&self, ledger: &ActivityLedger, user: &UserId) -> EarnedAchievements {
        self.evaluate(ledger.has_identity(user), &ledger.high_water_marks(user))
    }
}

/// Mint eligibility of a collectible
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    /// Earned and not yet settled
    Mintable,
    /// Already settled for this identity; not an error
    AlreadyMinted,
    NotEarned,
}

/// Collectibles already settled on the ledger/chain, per identity
#[derive(Default)]
pub struct SettlementRegistry {
    settled: RwLock<HashMap<UserId, HashSet<AchievementId>>>,
}

impl SettlementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_settled(&self, user: &UserId, id: &AchievementId) -> bool {
        self.settled
            .read()
            .get(user)
            .map(|set| set.contains(id))
            .unwrap_or(false)
    }

    /// Mintable iff earned and not yet settled
    pub fn claim_status(
        &self,
        user: &UserId,
        id: &AchievementId,
        earned: &EarnedAchievements,
    ) -> ClaimStatus {
        if self.is_settled(user, id) {
            ClaimStatus::AlreadyMinted
        } else if earned.contains(id) {
            ClaimStatus::Mintable
        } else {
            ClaimStatus::NotEarned
        }
    }

    /// Record a settlement. Returns `Mintable` only for the call that
    /// actually settled it; repeats report `AlreadyMinted`.
    pub fn settle(
        &self,
        user: &UserId,
        id: &AchievementId,
        earned: &EarnedAchievements,
    ) -> ClaimStatus {
        if !earned.contains(id) {
            return ClaimStatus::NotEarned;
        }
        let mut settled = self.settled.write();
        if settled.entry(*user).or_default().insert(*id) {
            ClaimStatus::Mintable
        } else {
            ClaimStatus::AlreadyMinted
        }
    }

    /// Earned achievements still waiting for settlement
    pub fn mintable(&self, user: &UserId, earned: &EarnedAchievements) -> Vec<AchievementId> {
        let settled = self.settled.read();
        let done = settled.get(user);
        earned
            .ids()
            .into_iter()
            .filter(|id| done.map(|set| !set.contains(id)).unwrap_or(true))
            .collect()
    }

    pub fn settled_count(&self, user: &UserId) -> usize {
        self.settled.read().get(user).map(|s| s.len()).unwrap_or(0)
    }
}
