//! Property-based tests for the inventory.
//!
//! - Budget: index size never exceeds the `(priority, tier)` cap
//! - FIFO: selection returns keys in store order within one tier
//! - No upward fallback: a selected key is never stronger than desired
//! - Trim on downgrade: every tier fits the new caps afterwards

use aqm_core::{budget_cap, AqmConfig, ManualClock, Priority, Tier};
use aqm_device::{InventoryStore, MemoryInventory};
use bytes::Bytes;
use proptest::prelude::*;

fn inventory() -> (MemoryInventory<ManualClock>, ManualClock) {
    let clock = ManualClock::new(1_000);
    (MemoryInventory::new(&AqmConfig::default(), clock.clone()), clock)
}

fn any_tier() -> impl Strategy<Value = Tier> {
    prop_oneof![Just(Tier::Gold), Just(Tier::Silver), Just(Tier::Bronze)]
}

fn any_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![Just(Priority::Bestie), Just(Priority::Mate), Just(Priority::Stranger)]
}

/// Property: no sequence of inserts pushes any index past its cap.
#[test]
fn prop_budget_cap_holds() {
    proptest!(|(
        priority in any_priority(),
        inserts in prop::collection::vec((0u16..64, any_tier()), 0..40),
    )| {
        let (inv, clock) = inventory();
        inv.register_contact("bob", priority, "")?;

        for (id, tier) in inserts {
            let _ = inv.store_key("bob", &format!("k{id}"), tier, Bytes::new(), Bytes::new());
            clock.advance(1);
        }

        let summary = inv.summary("bob")?;
        for tier in Tier::ALL {
            prop_assert!(summary.count(tier) <= u64::from(budget_cap(priority, tier)));
        }
    });
}

/// Property: within one tier, selection order equals store order, whatever
/// the timestamp gaps were.
#[test]
fn prop_selection_is_fifo() {
    proptest!(|(gaps in prop::collection::vec(0u64..5, 1..6))| {
        let (inv, clock) = inventory();
        inv.register_contact("carol", Priority::Mate, "")?;

        // Up to 6 distinct silver keys (cap is 6), non-decreasing timestamps.
        let mut stored = Vec::new();
        for (i, gap) in gaps.iter().enumerate() {
            let key = format!("s{i}");
            inv.store_key("carol", &key, Tier::Silver, Bytes::new(), Bytes::new())?;
            stored.push(key);
            clock.advance(*gap);
        }

        let mut selected = Vec::new();
        while let Some(entry) = inv.select_coin("carol", Tier::Silver)? {
            selected.push(entry.key_id);
        }
        prop_assert_eq!(selected, stored);
    });
}

/// Property: `select_coin` never returns a tier stronger than desired.
#[test]
fn prop_no_upward_fallback() {
    proptest!(|(
        stock in prop::collection::vec(any_tier(), 0..10),
        desired in any_tier(),
    )| {
        let (inv, _) = inventory();
        inv.register_contact("bob", Priority::Bestie, "")?;

        for (i, tier) in stock.iter().enumerate() {
            // Ignore cap rejections; we only care what ends up selectable.
            let _ = inv.store_key("bob", &format!("k{i}"), *tier, Bytes::new(), Bytes::new());
        }

        if let Some(entry) = inv.select_coin("bob", desired)? {
            prop_assert!(
                entry.tier >= desired,
                "selected {:?} for desired {:?}",
                entry.tier,
                desired
            );
        }
    });
}

/// Property: after a downgrade, every tier fits the new caps.
#[test]
fn prop_downgrade_trims_to_new_caps() {
    proptest!(|(
        inserts in prop::collection::vec((0u16..64, any_tier()), 0..30),
        new_priority in prop_oneof![Just(Priority::Mate), Just(Priority::Stranger)],
    )| {
        let (inv, clock) = inventory();
        inv.register_contact("bob", Priority::Bestie, "")?;

        for (id, tier) in inserts {
            let _ = inv.store_key("bob", &format!("k{id}"), tier, Bytes::new(), Bytes::new());
            clock.advance(1);
        }

        inv.set_contact_priority("bob", new_priority)?;

        let summary = inv.summary("bob")?;
        for tier in Tier::ALL {
            prop_assert!(summary.count(tier) <= u64::from(budget_cap(new_priority, tier)));
        }
        prop_assert_eq!(summary.priority, new_priority);
    });
}

/// Property: consume-then-select never yields the consumed key.
#[test]
fn prop_consumed_key_is_never_selected() {
    proptest!(|(count in 1usize..4, victim in 0usize..4)| {
        let victim = victim % count;
        let (inv, clock) = inventory();
        inv.register_contact("bob", Priority::Bestie, "")?;

        for i in 0..count {
            inv.store_key("bob", &format!("s{i}"), Tier::Silver, Bytes::new(), Bytes::new())?;
            clock.advance(1);
        }

        let victim_key = format!("s{}", victim);
        prop_assert!(inv.consume_key("bob", &victim_key)?);

        while let Some(entry) = inv.select_coin("bob", Tier::Silver)? {
            prop_assert_ne!(entry.key_id, victim_key.clone());
        }
    });
}
