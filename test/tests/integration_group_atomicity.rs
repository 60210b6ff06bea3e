//! Grouped ghosts cross the wire as a unit. Under packet pressure a
//! group that cannot fit whole is held back whole, ships complete on
//! the next pass, and the remote never observes a mixed-tick group.

use wraith_shared::{apply_tick, BlockId, GhostBlock, ReplicationConfig};
use wraith_test::{
    assert_blocks_equal, assert_component_equal, mirror_spawned, vitals_schema, BlockBuilder,
    Exchange,
};

fn int_value(block: &GhostBlock, entity: usize, component: usize) -> i32 {
    let bytes = block.value(entity, component);
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn grouped_host() -> GhostBlock {
    let vitals = vitals_schema(true);
    let mut builder = BlockBuilder::new(0, &vitals, 7).spawn_ids(&[1, 2, 3, 4, 5, 6, 7]);
    for entity in 0..7 {
        builder = builder
            .int(entity, 0, 50 + entity as i32)
            .int(entity, 1, entity as i32);
    }
    builder.group(4, 3).build()
}

fn tight_config() -> ReplicationConfig {
    ReplicationConfig {
        packet_capacity_bits: 600,
        ..ReplicationConfig::default()
    }
}

#[test]
fn a_group_that_does_not_fit_stays_out_whole() {
    let host = grouped_host();
    let vitals = vitals_schema(true);
    let mut remote = mirror_spawned(&host);
    let mut link = Exchange::new(tight_config(), &[&vitals]);

    // First pass: the four singles fit, the trailing group of three
    // would split, so it is held back entirely.
    let report = link.tick(&[&host], &[&remote], 700);
    assert!(report.delivered);
    assert!(report.pass.filled);
    assert_eq!(report.pass.entities_written, 4);
    assert_eq!(report.outcome.entities_applied, 4);
    if let Some(history) = link.remote.history(BlockId(0)) {
        apply_tick(&mut remote, history, 700);
    }
    for entity in 0..4 {
        assert_component_equal(&host, &remote, entity, 0);
    }
    for entity in 4..7 {
        assert_eq!(
            int_value(&remote, entity, 0),
            0,
            "no group member may arrive ahead of the others"
        );
    }

    // Second pass: the fresh packet starts at the group and carries
    // all of it.
    let report = link.tick(&[&host], &[&remote], 701);
    assert!(report.delivered);
    assert_eq!(report.pass.entities_written, 3);
    assert_eq!(report.outcome.entities_applied, 3);
    if let Some(history) = link.remote.history(BlockId(0)) {
        apply_tick(&mut remote, history, 701);
    }
    assert_blocks_equal(&host, &remote);
}

#[test]
fn the_remote_never_observes_a_mixed_tick_group() {
    let mut host = grouped_host();
    let vitals = vitals_schema(true);
    let mut remote = mirror_spawned(&host);
    let mut link = Exchange::new(tight_config(), &[&vitals]);

    // Stamp the whole group with the tick number every tick, so any
    // partial application shows up as unequal members.
    for step in 0u16..10 {
        let tick = 700 + step;
        let stamp = 1000 + step as i32;
        host = BlockBuilder::rewrap(host)
            .int(4, 0, stamp)
            .int(5, 0, stamp)
            .int(6, 0, stamp)
            .int(step as usize % 4, 0, stamp)
            .build();

        let report = link.tick(&[&host], &[&remote], tick);
        assert!(report.delivered);
        if let Some(history) = link.remote.history(BlockId(0)) {
            apply_tick(&mut remote, history, tick);
        }

        let members = [
            int_value(&remote, 4, 0),
            int_value(&remote, 5, 0),
            int_value(&remote, 6, 0),
        ];
        assert_eq!(members[0], members[1], "group tore at tick {tick}");
        assert_eq!(members[1], members[2], "group tore at tick {tick}");
    }

    // Freeze and let the cursor finish its lap.
    for step in 10u16..14 {
        let tick = 700 + step;
        let report = link.tick(&[&host], &[&remote], tick);
        assert!(report.delivered);
        if let Some(history) = link.remote.history(BlockId(0)) {
            apply_tick(&mut remote, history, tick);
        }
    }
    assert_blocks_equal(&host, &remote);
}
