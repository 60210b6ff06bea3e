//! Property tests for baseline selection.
//!
//! Key invariants, across random ack histories and slot churn:
//! 1. Every selected baseline is acked, inside the age window, and
//!    carries the queried ghost's identity in the queried slot.
//! 2. Baselines come back newest first, even across the tick wrap.
//! 3. A relocated ghost never borrows records from its old slot, and
//!    a newcomer reusing a slot never inherits its predecessor's.
//! 4. The spawn encoding appears exactly when no candidate exists.

use proptest::prelude::*;
use wraith_shared::host::baseline::select;
use wraith_shared::{tick_after, GhostId, SnapshotHistory, Tick};

const RECORD_WORDS: usize = 4;

fn ghost(id: u32) -> GhostId {
    GhostId::new(id, 0)
}

/// (age, ghost id, acked) writes, applied oldest-entry-first so later
/// script entries can restamp a slot under a different identity while
/// an earlier ack sticks.
fn script_strategy() -> impl Strategy<Value = Vec<(u16, u32, bool)>> {
    prop::collection::vec((1u16..15, 1u32..5, any::<bool>()), 0..32)
}

fn history_from_script(current: Tick, script: &[(u16, u32, bool)]) -> SnapshotHistory {
    let mut history = SnapshotHistory::new(16, 1, RECORD_WORDS);
    for &(age, id, acked) in script {
        let tick = current.wrapping_sub(age);
        history.begin_tick(tick).set_identity(0, ghost(id));
        if acked {
            history.ack_tick(tick);
        }
    }
    history
}

proptest! {
    #[test]
    fn prop_selected_baselines_are_acked_matching_and_ordered(
        current in any::<u16>(),
        max_age in 1u16..15,
        target in 1u32..5,
        script in script_strategy(),
    ) {
        let history = history_from_script(current, &script);
        let triple = select(&history, 0, ghost(target), current, max_age);

        let mut ticks = [0 as Tick; 3];
        let count = triple.collect(&mut ticks);
        let mut newer: Option<Tick> = None;
        for &tick in &ticks[..count] {
            prop_assert!(
                history.has_record(tick, 0, ghost(target)),
                "selected tick {} lacks an acked matching record",
                tick
            );
            let age = current.wrapping_sub(tick);
            prop_assert!(age >= 1 && age <= max_age, "tick {} is outside the window", tick);
            if let Some(previous) = newer {
                prop_assert!(tick_after(previous, tick), "baselines must come newest first");
            }
            newer = Some(tick);
        }
    }

    #[test]
    fn prop_spawn_encoding_exactly_when_no_candidate_exists(
        current in any::<u16>(),
        max_age in 1u16..15,
        target in 1u32..5,
        script in script_strategy(),
    ) {
        let history = history_from_script(current, &script);
        let candidate_exists = (1..=max_age)
            .any(|age| history.has_record(current.wrapping_sub(age), 0, ghost(target)));

        let triple = select(&history, 0, ghost(target), current, max_age);
        prop_assert_eq!(triple.is_spawn(), !candidate_exists);
    }

    #[test]
    fn prop_relocation_never_borrows_the_old_slots_records(
        current in any::<u16>(),
        move_age in 2u16..10,
        max_age in 1u16..15,
    ) {
        // Ghost 1 lives in slot 0 up to `move_age` ticks ago, then
        // relocates to slot 1 while ghost 9 takes slot 0 over. Every
        // tick is acked, so only identity checks keep them apart.
        let mut history = SnapshotHistory::new(16, 2, RECORD_WORDS);
        for age in 1u16..15 {
            let tick = current.wrapping_sub(age);
            let slot = history.begin_tick(tick);
            if age >= move_age {
                slot.set_identity(0, ghost(1));
                slot.mark_gap(1);
            } else {
                slot.set_identity(1, ghost(1));
                slot.set_identity(0, ghost(9));
            }
            history.ack_tick(tick);
        }

        let relocated = select(&history, 1, ghost(1), current, max_age);
        let mut ticks = [0 as Tick; 3];
        let count = relocated.collect(&mut ticks);
        for &tick in &ticks[..count] {
            prop_assert!(
                current.wrapping_sub(tick) < move_age,
                "slot 1 only holds ghost 1 after the move"
            );
        }

        let newcomer = select(&history, 0, ghost(9), current, max_age);
        let count = newcomer.collect(&mut ticks);
        for &tick in &ticks[..count] {
            prop_assert!(
                current.wrapping_sub(tick) < move_age,
                "ghost 9 must not inherit ghost 1's old records"
            );
        }
    }
}
