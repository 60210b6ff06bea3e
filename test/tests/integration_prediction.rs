//! Predicted blocks over a live link: the speculative present rolls
//! back to the last backup before server state lands, already-applied
//! ticks are not reapplied, and a backup invalidated by slot movement
//! degrades to resimulation instead of corrupting state.

use wraith_shared::{
    apply_predicted, AppliedTicks, BlockId, GhostBlock, PredictedApply, PredictionBackupStore,
    ReplicationConfig, TickInstant,
};
use wraith_test::{
    assert_component_equal, mirror_spawned, vitals_schema, BlockBuilder, Exchange,
};

fn int_value(block: &GhostBlock, entity: usize, component: usize) -> i32 {
    let bytes = block.value(entity, component);
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn predicted_pair() -> (GhostBlock, GhostBlock) {
    let vitals = vitals_schema(true);
    let host = BlockBuilder::new(0, &vitals, 4)
        .spawn_ids(&[1, 2])
        .int(0, 0, 10)
        .int(1, 0, 20)
        .int(0, 1, 1)
        .int(1, 1, 2)
        .build();
    let mut remote = mirror_spawned(&host);
    remote.set_predicted(0, true);
    remote.set_predicted(1, true);
    (host, remote)
}

#[test]
fn the_speculative_present_rolls_back_before_server_state_lands() {
    let vitals = vitals_schema(true);
    let (mut host, mut remote) = predicted_pair();
    let mut link = Exchange::new(ReplicationConfig::default(), &[&vitals]);
    let backups = PredictionBackupStore::new();
    let applied = AppliedTicks::new();

    let report = link.tick(&[&host], &[&remote], 900);
    assert!(report.delivered);
    let history = link.remote.history(BlockId(0)).expect("batch landed");
    let first = apply_predicted(&mut remote, history, &backups, &applied, 900);
    // Nothing to restore on the very first server tick.
    assert_eq!(first, PredictedApply::Resimulated);
    assert_eq!(applied.get(BlockId(0)), Some(900));
    assert_component_equal(&host, &remote, 0, 0);

    // End of tick 900: back up the applied state, then speculate.
    backups.capture(&[&remote], TickInstant::whole(900));
    remote.set_value(0, 0, &555i32.to_le_bytes());

    host = BlockBuilder::rewrap(host).int(0, 0, 42).build();
    let report = link.tick(&[&host], &[&remote], 901);
    assert!(report.delivered);
    let history = link.remote.history(BlockId(0)).expect("batch landed");
    let second = apply_predicted(&mut remote, history, &backups, &applied, 901);
    assert_eq!(second, PredictedApply::Restored);
    assert_eq!(applied.get(BlockId(0)), Some(901));

    // The speculative 555 is gone; the server's 42 is in.
    assert_eq!(int_value(&remote, 0, 0), 42);
    assert_component_equal(&host, &remote, 1, 0);
}

#[test]
fn an_already_applied_tick_is_reused_not_reapplied() {
    let vitals = vitals_schema(true);
    let (host, mut remote) = predicted_pair();
    let mut link = Exchange::new(ReplicationConfig::default(), &[&vitals]);
    let backups = PredictionBackupStore::new();
    let applied = AppliedTicks::new();

    link.tick(&[&host], &[&remote], 900);
    let history = link.remote.history(BlockId(0)).expect("batch landed");
    apply_predicted(&mut remote, history, &backups, &applied, 900);

    // Speculation between two polls of the same server tick.
    remote.set_value(0, 0, &777i32.to_le_bytes());
    let again = apply_predicted(&mut remote, history, &backups, &applied, 900);
    assert_eq!(again, PredictedApply::Reused);
    assert_eq!(int_value(&remote, 0, 0), 777, "a reused tick must not clobber speculation");
}

#[test]
fn slot_movement_invalidates_the_backup_and_gates_the_records() {
    let vitals = vitals_schema(true);
    let (mut host, mut remote) = predicted_pair();
    let mut link = Exchange::new(ReplicationConfig::default(), &[&vitals]);
    let backups = PredictionBackupStore::new();
    let applied = AppliedTicks::new();

    link.tick(&[&host], &[&remote], 900);
    let history = link.remote.history(BlockId(0)).expect("batch landed");
    apply_predicted(&mut remote, history, &backups, &applied, 900);
    backups.capture(&[&remote], TickInstant::whole(900));

    // Local slot churn the host knows nothing about.
    remote.relocate(0, 3);

    host = BlockBuilder::rewrap(host).int(0, 0, 42).int(1, 0, 21).build();
    let report = link.tick(&[&host], &[&remote], 901);
    assert!(report.delivered);
    // Ghost 1's record deltas against a baseline the moved slot does
    // not hold; the identity gate drops it rather than guessing.
    assert_eq!(report.outcome.entities_skipped, 1);
    assert_eq!(report.outcome.entities_applied, 1);

    let history = link.remote.history(BlockId(0)).expect("batch landed");
    let outcome = apply_predicted(&mut remote, history, &backups, &applied, 901);
    assert_eq!(outcome, PredictedApply::Resimulated);
    assert_eq!(applied.get(BlockId(0)), Some(901));

    // The untouched ghost still converges.
    assert_component_equal(&host, &remote, 1, 0);
    // The moved ghost kept its pre-churn value instead of a torn one.
    assert_eq!(int_value(&remote, 3, 0), 10);
}
