//! Integration tests for the GreenMint reward pipeline
//!
//! Readings flow through the activity ledger into the mint engine and the
//! achievement engine; these tests drive the whole path end to end.

use chrono::Utc;
use greenmint_economics::{
    AchievementEngine, AchievementId, ActivityLedger, BaselineStore, Category, ClaimStatus,
    ComboRule, DistributionConfig, EconomicsError, EngineConfig, MemorySink, MilestoneRegistry,
    MintEngine, MintOutcome, NothingToMint, Reading, ReadingSource, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

fn user(name: &str) -> UserId {
    UserId::from_identity(name)
}

mod ledger_flow_tests {
    use super::*;

    #[test]
    fn test_connect_mint_and_advance() {
        let ledger = Arc::new(ActivityLedger::default());
        let sink = Arc::new(MemorySink::new());
        let engine = MintEngine::new(ledger.clone(), DistributionConfig::LIVE)
            .unwrap()
            .with_sink(sink.clone());
        let alice = user("alice");

        ledger
            .record_reading(alice, Category::Solar, 1_000.0, Utc::now())
            .unwrap();
        assert_eq!(ledger.pending(&alice, Category::Solar), 1_000.0);

        let event = match engine.mint(alice, Category::Solar).unwrap() {
            MintOutcome::Minted(event) => event,
            other => panic!("expected a mint, got {:?}", other),
        };
        assert_eq!(event.gross_amount, 1_000);
        assert_eq!(event.split.user, 930);
        assert_eq!(ledger.pending(&alice, Category::Solar), 0.0);

        ledger
            .record_reading(alice, Category::Solar, 1_250.0, Utc::now())
            .unwrap();
        assert_eq!(ledger.pending(&alice, Category::Solar), 250.0);

        engine.mint(alice, Category::Solar).unwrap();
        assert_eq!(ledger.lifetime_minted(&alice), 1_250);
        assert_eq!(sink.len(), 2);
        assert_eq!(engine.supply().gross_minted, 1_250);
    }

    #[test]
    fn test_regression_blocks_pending_until_recovered() {
        let ledger = Arc::new(ActivityLedger::default());
        let engine = MintEngine::new(ledger.clone(), DistributionConfig::LIVE).unwrap();
        let bob = user("bob");

        ledger
            .record_reading(bob, Category::EvMiles, 2_000.0, Utc::now())
            .unwrap();
        engine.mint(bob, Category::EvMiles).unwrap();

        // Source reset to a lower counter
        ledger
            .record_reading(bob, Category::EvMiles, 1_500.0, Utc::now())
            .unwrap();
        assert_eq!(ledger.pending(&bob, Category::EvMiles), 0.0);
        assert_eq!(ledger.high_water(&bob, Category::EvMiles), 2_000.0);

        let outcome = engine.mint(bob, Category::EvMiles).unwrap();
        assert_eq!(
            outcome,
            MintOutcome::NothingToMint(NothingToMint::NoPendingActivity)
        );

        ledger
            .record_reading(bob, Category::EvMiles, 2_100.0, Utc::now())
            .unwrap();
        assert_eq!(ledger.pending(&bob, Category::EvMiles), 100.0);
    }

    #[test]
    fn test_invalid_reading_rejected() {
        let ledger = ActivityLedger::default();
        let result = ledger.record_reading(user("carol"), Category::Battery, -5.0, Utc::now());
        assert!(matches!(result, Err(EconomicsError::InvalidReading { .. })));
        assert_eq!(ledger.row_count(), 0);
    }

    struct DeviceFeed {
        values: HashMap<Category, f64>,
    }

    impl ReadingSource for DeviceFeed {
        fn lifetime_value(&self, _user: &UserId, category: Category) -> Option<Reading> {
            self.values.get(&category).map(|value| Reading {
                value: *value,
                as_of: Utc::now(),
            })
        }
    }

    #[test]
    fn test_sync_then_mint_all() {
        let ledger = Arc::new(ActivityLedger::default());
        let engine = MintEngine::new(ledger.clone(), DistributionConfig::PLANNING).unwrap();
        let dave = user("dave");

        let feed = DeviceFeed {
            values: HashMap::from([
                (Category::Solar, 600.0),
                (Category::Battery, f64::NAN),
                (Category::Charging, 75.5),
            ]),
        };
        let results = ledger.sync_from(&feed, dave);
        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|(_, r)| r.is_err()).count(), 1);

        let minted: Vec<_> = engine
            .mint_all(dave)
            .into_iter()
            .filter_map(|(_, outcome)| outcome.ok()?.event().cloned())
            .collect();

        // Each connected device mints its own history
        assert_eq!(minted.len(), 2);
        assert_eq!(minted[0].category, Category::Solar);
        assert_eq!(minted[0].units, 600);
        assert_eq!(minted[1].category, Category::Charging);
        assert_eq!(minted[1].units, 75);
        assert_eq!(ledger.lifetime_minted(&dave), 675);
    }

    #[test]
    fn test_mint_all_keeps_every_category_history() {
        let ledger = Arc::new(ActivityLedger::default());
        let engine = MintEngine::new(ledger.clone(), DistributionConfig::LIVE).unwrap();
        let jack = user("jack");
        ledger
            .record_reading(jack, Category::Solar, 400.0, Utc::now())
            .unwrap();
        ledger
            .record_reading(jack, Category::Battery, 100.0, Utc::now())
            .unwrap();

        let units: HashMap<Category, u64> = engine
            .mint_all(jack)
            .into_iter()
            .filter_map(|(category, outcome)| Some((category, outcome.ok()?.event()?.units)))
            .collect();
        assert_eq!(units.get(&Category::Solar), Some(&400));
        assert_eq!(units.get(&Category::Battery), Some(&100));

        // Later readings only add their delta
        ledger
            .record_reading(jack, Category::Battery, 150.0, Utc::now())
            .unwrap();
        assert_eq!(ledger.pending(&jack, Category::Battery), 50.0);
    }
}

mod concurrency_tests {
    use super::*;

    #[test]
    fn test_concurrent_mints_exactly_one_wins() {
        let ledger = Arc::new(ActivityLedger::default());
        let engine = Arc::new(MintEngine::new(ledger.clone(), DistributionConfig::LIVE).unwrap());
        let erin = user("erin");
        ledger
            .record_reading(erin, Category::Solar, 5_000.0, Utc::now())
            .unwrap();

        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let engine = engine.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    engine.mint(erin, Category::Solar)
                })
            })
            .collect();

        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        let winners = outcomes
            .iter()
            .filter(|o| matches!(o, MintOutcome::Minted(_)))
            .count();
        assert_eq!(winners, 1);
        // Losers either retried onto the consumed row or arrived after it
        assert!(outcomes.iter().all(|o| matches!(
            o,
            MintOutcome::Minted(_)
                | MintOutcome::NothingToMint(
                    NothingToMint::AlreadySettled | NothingToMint::NoPendingActivity
                )
        )));
        assert_eq!(ledger.lifetime_minted(&erin), 5_000);
        assert_eq!(engine.supply().mint_events, 1);
        assert_eq!(engine.supply().user_minted, 4_650);
    }

    #[test]
    fn test_categories_mint_independently_under_contention() {
        for run in 0..50 {
            let ledger = Arc::new(ActivityLedger::default());
            let engine =
                Arc::new(MintEngine::new(ledger.clone(), DistributionConfig::LIVE).unwrap());
            let kim = user(&format!("kim-{}", run));
            ledger
                .record_reading(kim, Category::Solar, 400.0, Utc::now())
                .unwrap();
            ledger
                .record_reading(kim, Category::Battery, 100.0, Utc::now())
                .unwrap();

            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = [Category::Solar, Category::Battery]
                .into_iter()
                .map(|category| {
                    let engine = engine.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        engine.mint(kim, category)
                    })
                })
                .collect();
            for handle in handles {
                assert!(matches!(handle.join().unwrap(), Ok(MintOutcome::Minted(_))));
            }

            assert_eq!(ledger.lifetime_minted(&kim), 500);
            assert_eq!(engine.supply().mint_events, 2);
        }
    }

    #[test]
    fn test_different_keys_mint_in_parallel() {
        let ledger = Arc::new(ActivityLedger::default());
        let engine = Arc::new(MintEngine::new(ledger.clone(), DistributionConfig::LIVE).unwrap());

        let users: Vec<UserId> = (0..16).map(|i| user(&format!("user-{}", i))).collect();
        for u in &users {
            ledger
                .record_reading(*u, Category::Battery, 100.0, Utc::now())
                .unwrap();
        }

        let handles: Vec<_> = users
            .iter()
            .map(|u| {
                let engine = engine.clone();
                let u = *u;
                thread::spawn(move || engine.mint(u, Category::Battery))
            })
            .collect();
        for handle in handles {
            assert!(matches!(handle.join().unwrap(), Ok(MintOutcome::Minted(_))));
        }

        assert_eq!(engine.supply().gross_minted, 1_600);
    }
}

mod achievement_tests {
    use super::*;

    #[test]
    fn test_list_earned_from_ledger() {
        let ledger = ActivityLedger::default();
        let engine = AchievementEngine::new(Arc::new(MilestoneRegistry::standard()));
        let frank = user("frank");

        let nobody = engine.list_earned(&ledger, &frank);
        assert!(!nobody.welcome);
        assert_eq!(nobody.total_earned, 0);

        ledger
            .record_reading(frank, Category::Solar, 1_200.0, Utc::now())
            .unwrap();
        ledger
            .record_reading(frank, Category::EvMiles, 600.0, Utc::now())
            .unwrap();

        let earned = engine.list_earned(&ledger, &frank);
        assert!(earned.welcome);
        assert_eq!(earned.tiers[&Category::Solar].len(), 3);
        assert_eq!(earned.tiers[&Category::EvMiles].len(), 2);
        assert_eq!(
            earned.combos,
            vec![ComboRule::TwoCategories, ComboRule::FiveTiers]
        );
        assert_eq!(earned.total_earned, 1 + 5 + 2);
    }

    #[test]
    fn test_achievements_survive_regression() {
        let ledger = ActivityLedger::default();
        let engine = AchievementEngine::new(Arc::new(MilestoneRegistry::standard()));
        let gina = user("gina");

        ledger
            .record_reading(gina, Category::Battery, 600.0, Utc::now())
            .unwrap();
        ledger
            .record_reading(gina, Category::Battery, 10.0, Utc::now())
            .unwrap();

        let earned = engine.list_earned(&ledger, &gina);
        assert_eq!(earned.tiers[&Category::Battery].len(), 3);
    }

    #[test]
    fn test_collectible_settles_once() {
        let ledger = Arc::new(ActivityLedger::default());
        let achievements = AchievementEngine::new(Arc::new(MilestoneRegistry::standard()));
        let minter = MintEngine::new(ledger.clone(), DistributionConfig::LIVE).unwrap();
        let hank = user("hank");

        ledger
            .record_reading(hank, Category::Charging, 60.0, Utc::now())
            .unwrap();
        let earned = achievements.list_earned(&ledger, &hank);
        let tier = AchievementId::Tier {
            category: Category::Charging,
            index: 0,
        };

        assert_eq!(minter.settle_collectible(&hank, &tier, &earned), ClaimStatus::Mintable);
        assert_eq!(
            minter.settle_collectible(&hank, &tier, &earned),
            ClaimStatus::AlreadyMinted
        );
        let unearned = AchievementId::Tier {
            category: Category::Charging,
            index: 4,
        };
        assert_eq!(
            minter.collectible_status(&hank, &unearned, &earned),
            ClaimStatus::NotEarned
        );
        assert_eq!(minter.supply().collectibles_settled, 1);
        assert_eq!(minter.settlements().mintable(&hank, &earned), vec![AchievementId::Welcome]);
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_engine_from_config() {
        let config = EngineConfig::from_toml_str(
            r#"
            [distribution]
            mint = "planning"
            planning = "planning"

            [ledger]
            token_rates = { solar = 10 }
            "#,
        )
        .unwrap();
        assert!(config.validate().unwrap().is_empty());

        let ledger = Arc::new(config.ledger());
        let engine = config.mint_engine(ledger.clone()).unwrap();
        let ivy = user("ivy");
        ledger
            .record_reading(ivy, Category::Solar, 40.0, Utc::now())
            .unwrap();

        let event = engine.mint(ivy, Category::Solar).unwrap();
        let event = event.event().unwrap();
        assert_eq!(event.gross_amount, 400);
        assert_eq!(event.split.user, 300);
        assert_eq!(event.split.burn, 80);
    }
}
