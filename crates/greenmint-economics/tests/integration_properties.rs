//! Property tests for GreenMint economics
//!
//! Conservation and monotonicity laws that must hold for any input.

use chrono::Utc;
use greenmint_economics::milestones::standard_table;
use greenmint_economics::{
    achievements::earned_tiers, compute_coverage, compute_pending, max_activity_for_coverage,
    split_mint, split_transfer, ActivityLedger, Category, DistributionConfig, MintEngine,
    Scenario, TransferConfig, UserId,
};
use proptest::prelude::*;
use std::sync::Arc;

fn any_split() -> impl Strategy<Value = DistributionConfig> {
    (0u32..=10_000, 0u32..=10_000, 0u32..=10_000).prop_map(|(a, b, c)| {
        let mut cuts = [a, b, c];
        cuts.sort_unstable();
        DistributionConfig {
            user_bps: cuts[0],
            burn_bps: cuts[1] - cuts[0],
            liquidity_bps: cuts[2] - cuts[1],
            treasury_bps: 10_000 - cuts[2],
        }
    })
}

proptest! {
    #[test]
    fn prop_split_conserves_gross(gross in 0u128..=u64::MAX as u128, split in any_split()) {
        let result = split_mint(gross, &split);
        prop_assert_eq!(result.total(), gross);
        prop_assert!(result.verify());
    }

    #[test]
    fn prop_transfer_conserves_amount(
        amount in 0u128..=u64::MAX as u128,
        burn in 0u32..=3_000,
        liquidity in 0u32..=3_000,
        treasury in 0u32..=3_000,
    ) {
        let config = TransferConfig { burn_bps: burn, liquidity_bps: liquidity, treasury_bps: treasury };
        let split = split_transfer(amount, &config);
        prop_assert_eq!(split.recipient + split.fees(), amount);
    }

    #[test]
    fn prop_pending_never_negative(
        lifetime in prop::num::f64::ANY,
        baseline in prop::num::f64::ANY,
        minted in 0u128..1_000_000,
    ) {
        prop_assert!(compute_pending(lifetime, baseline, minted) >= 0.0);
    }

    #[test]
    fn prop_fresh_start_equivalence(value in 0.0f64..1e12) {
        prop_assert_eq!(compute_pending(value, 0.0, 0), value);
    }

    #[test]
    fn prop_milestones_monotone(a in 0.0f64..200_000.0, b in 0.0f64..200_000.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        for category in Category::ALL {
            let table = standard_table(category);
            prop_assert!(earned_tiers(low, &table).len() <= earned_tiers(high, &table).len());
        }
    }

    #[test]
    fn prop_coverage_inversion(target in 0.05f64..20.0, sell in 1.0f64..80.0, activity in 1.0f64..5_000.0) {
        let scenario = Scenario {
            monthly_sell_pressure_rate_pct: sell,
            avg_monthly_activity_units_per_user: activity,
            ..Scenario::ideal()
        };
        let solved = max_activity_for_coverage(target, &scenario).unwrap();
        let at_max = Scenario { avg_monthly_activity_units_per_user: solved, ..scenario };
        let coverage = compute_coverage(&at_max);
        prop_assert!((coverage - target).abs() <= target * 1e-9);
    }

    #[test]
    fn prop_no_double_mint(readings in prop::collection::vec((0.0f64..10_000.0, any::<bool>()), 1..40)) {
        let ledger = Arc::new(ActivityLedger::default());
        let engine = MintEngine::new(ledger.clone(), DistributionConfig::LIVE).unwrap();
        let user = UserId::from_identity("prop");

        let mut max_seen = 0.0f64;
        let mut gross_total = 0u128;
        for (value, mint_now) in readings {
            ledger.record_reading(user, Category::Solar, value, Utc::now()).unwrap();
            max_seen = max_seen.max(value);
            if mint_now {
                if let Some(event) = engine.mint(user, Category::Solar).unwrap().event() {
                    gross_total += event.gross_amount;
                }
                prop_assert_eq!(ledger.pending_units(&user, Category::Solar), 0);
            }
        }
        prop_assert!(gross_total as f64 <= max_seen.floor());
    }
}
