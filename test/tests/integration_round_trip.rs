//! Multi-tick host/remote round trip over a simulated acked link:
//! after every delivered tick, the applied remote state matches the
//! host's live state for every component kind.

use wraith_shared::{apply_tick, BlockId, ReplicationConfig};
use wraith_test::{
    assert_blocks_equal, cargo_schema, mirror_reversed, mirror_spawned, movement_schema,
    vitals_schema, BlockBuilder, Exchange,
};

#[test]
fn delivered_ticks_converge_every_component_kind() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();

    let movement = movement_schema(true);
    let vitals = vitals_schema(true);
    let cargo = cargo_schema(true);

    let mut host_movement = BlockBuilder::new(0, &movement, 4)
        .spawn_ids(&[1, 2, 3])
        .vec3(0, 0, [1.0, 2.0, 3.0])
        .vec3(1, 0, [-4.5, 0.0, 12.25])
        .vec3(2, 0, [100.0, -50.5, 0.25])
        .float(0, 1, 0.5)
        .float(1, 1, -0.25)
        .float(2, 1, 1.0)
        .build();
    let mut host_vitals = BlockBuilder::new(1, &vitals, 2)
        .spawn_ids(&[10, 11])
        .int(0, 0, 100)
        .int(1, 0, 85)
        .int(0, 1, 50)
        .int(1, 1, 25)
        .build();
    let mut host_cargo = BlockBuilder::new(2, &cargo, 2)
        .spawn_ids(&[20, 21])
        .int(0, 0, 7)
        .int(1, 0, 12)
        .payload(0, 1, b"ore,fuel")
        .payload(1, 1, b"")
        .build();

    let mut remote_movement = mirror_spawned(&host_movement);
    let mut remote_vitals = mirror_reversed(&host_vitals);
    let mut remote_cargo = mirror_spawned(&host_cargo);

    let mut link = Exchange::new(ReplicationConfig::default(), &[&movement, &vitals, &cargo]);

    for step in 0u16..12 {
        let tick = 100 + step;

        // The host simulation moves on every tick.
        let x = 1.0 + step as f32 * 0.5;
        host_movement = BlockBuilder::rewrap(host_movement)
            .vec3(0, 0, [x, 2.0, 3.0])
            .build();
        let health = 100 + step as i32;
        host_vitals = BlockBuilder::rewrap(host_vitals).int(0, 0, health).build();
        if step == 5 {
            host_vitals = BlockBuilder::rewrap(host_vitals).disabled(1, 1).build();
        }
        if step % 3 == 0 {
            let manifest = format!("ore,fuel,tick{tick}");
            host_cargo = BlockBuilder::rewrap(host_cargo)
                .payload(0, 1, manifest.as_bytes())
                .build();
        }

        let report = link.tick(
            &[&host_movement, &host_vitals, &host_cargo],
            &[&remote_movement, &remote_vitals, &remote_cargo],
            tick,
        );
        assert!(report.delivered);
        assert_eq!(report.outcome.entities_skipped, 0);
        if step == 0 {
            // Spawn tick covers every entity of every block.
            assert_eq!(report.outcome.entities_applied, 7);
        }

        for (block, id) in [
            (&mut remote_movement, BlockId(0)),
            (&mut remote_vitals, BlockId(1)),
            (&mut remote_cargo, BlockId(2)),
        ] {
            if let Some(history) = link.remote.history(id) {
                apply_tick(block, history, tick);
            }
        }

        assert_blocks_equal(&host_movement, &remote_movement);
        assert_blocks_equal(&host_vitals, &remote_vitals);
        assert_blocks_equal(&host_cargo, &remote_cargo);
    }
}

#[test]
fn a_lost_packet_does_not_stall_convergence() {
    let vitals = vitals_schema(true);
    let mut host = BlockBuilder::new(0, &vitals, 2)
        .spawn_ids(&[1, 2])
        .int(0, 0, 10)
        .int(1, 0, 20)
        .int(0, 1, 1)
        .int(1, 1, 2)
        .build();
    let mut remote = mirror_spawned(&host);
    let mut link = Exchange::new(ReplicationConfig::default(), &[&vitals]);

    for step in 0u16..8 {
        let tick = 200 + step;
        host = BlockBuilder::rewrap(host).int(0, 0, 10 + step as i32).build();
        if step == 3 {
            link.drop_next = true;
        }

        let report = link.tick(&[&host], &[&remote], tick);

        if step == 3 {
            assert!(!report.delivered);
            continue;
        }
        let history = link.remote.history(BlockId(0)).unwrap();
        apply_tick(&mut remote, history, tick);
        assert_blocks_equal(&host, &remote);
    }
}
