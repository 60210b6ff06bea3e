//! Wire-level walk of the first-ack transition: the first tick of a
//! block's life ships all-ones masks and no-baseline run headers; the
//! tick after its ack ships masks and payloads relative to it.

use std::sync::Arc;

use wraith_shared::{
    BitReader, BitSerde, BitWriter, ComponentDef, GhostBlock, GhostTypeId, HostManager, IntCodec,
    PacketNotifiable, ReplicationConfig, SchemaDescriptor, SerializeScratch, SignedVarInt, Tick,
    UnsignedVarInt,
};
use wraith_test::BlockBuilder;

fn fuel_schema() -> Arc<SchemaDescriptor> {
    Arc::new(SchemaDescriptor::build(
        GhostTypeId(9),
        true,
        vec![ComponentDef::new("fuel", Arc::new(IntCodec))],
    ))
}

fn write_packet(host: &mut HostManager, block: &GhostBlock, tick: Tick, index: u16) -> Vec<u8> {
    let mut writer = BitWriter::with_capacity_bits(host.config().packet_capacity_bits);
    let mut scratch = SerializeScratch::new(host.config());
    let pass = host
        .write_blocks(
            &[block],
            tick,
            100.0,
            index,
            &mut writer,
            &mut scratch,
            |_, _, _| true,
        )
        .unwrap();
    assert_eq!(pass.entities_written, 3);
    writer.to_bytes()
}

fn read_batch_header(reader: &mut BitReader) -> (u64, u64, bool) {
    assert!(bool::de(reader).unwrap(), "batch present bit");
    let type_id = UnsignedVarInt::<5>::de(reader).unwrap().get();
    let count = UnsignedVarInt::<7>::de(reader).unwrap().get();
    let prespawn = bool::de(reader).unwrap();
    (type_id, count, prespawn)
}

fn read_run_header(reader: &mut BitReader) -> ([u64; 3], u64) {
    let mut ages = [0u64; 3];
    for age in ages.iter_mut() {
        *age = UnsignedVarInt::<5>::de(reader).unwrap().get();
    }
    let run_len = UnsignedVarInt::<5>::de(reader).unwrap().get();
    (ages, run_len)
}

#[test]
fn first_tick_ships_spawn_records_and_the_next_builds_on_the_ack() {
    let schema = fuel_schema();
    let block = BlockBuilder::new(0, &schema, 4)
        .spawn_ids(&[1, 2, 3])
        .int(0, 0, 5)
        .int(1, 0, 5)
        .int(2, 0, 5)
        .build();
    let mut host = HostManager::new(ReplicationConfig::default());

    // Tick 100: nothing acked yet.
    let packet = write_packet(&mut host, &block, 100, 1);
    let mut reader = BitReader::new(&packet);
    assert_eq!(u16::de(&mut reader).unwrap(), 100);
    let (type_id, count, prespawn) = read_batch_header(&mut reader);
    assert_eq!(type_id, 9);
    assert_eq!(count, 3);
    assert!(!prespawn);

    let (ages, run_len) = read_run_header(&mut reader);
    assert_eq!(ages, [0, 0, 0], "no valid baseline on the first tick");
    assert_eq!(run_len, 3);
    for expected_id in 1..=3u64 {
        let ghost = UnsignedVarInt::<7>::de(&mut reader).unwrap().get();
        assert_eq!(ghost, expected_id);
        let prefix = UnsignedVarInt::<7>::de(&mut reader).unwrap().get() as u32;
        let before = reader.bits_remaining();
        let mask = UnsignedVarInt::<7>::de(&mut reader).unwrap().get();
        assert_eq!(mask, 1, "spawn records mark every field changed");
        let value = u32::de(&mut reader).unwrap();
        assert_eq!(value, 5, "no baseline, so the field rides raw");
        assert_eq!(before - reader.bits_remaining(), prefix);
    }
    assert!(!bool::de(&mut reader).unwrap(), "terminator");

    // The transport delivers packet 1; tick 100 becomes the baseline.
    host.notify_packet_delivered(1);
    let block = BlockBuilder::rewrap(block).int(1, 0, 7).build();

    let packet = write_packet(&mut host, &block, 101, 2);
    let mut reader = BitReader::new(&packet);
    assert_eq!(u16::de(&mut reader).unwrap(), 101);
    let (_, count, _) = read_batch_header(&mut reader);
    assert_eq!(count, 3);

    let (ages, run_len) = read_run_header(&mut reader);
    assert_eq!(ages, [1, 0, 0], "primary baseline is one tick back");
    assert_eq!(run_len, 3);
    // The tick-100 records carried all-ones masks; wire masks arrive
    // XORed against them.
    let baseline_mask = 1u64;
    for expected_id in 1..=3u64 {
        let ghost = UnsignedVarInt::<7>::de(&mut reader).unwrap().get();
        assert_eq!(ghost, expected_id);
        let prefix = UnsignedVarInt::<7>::de(&mut reader).unwrap().get() as u32;
        let before = reader.bits_remaining();
        let change_mask = UnsignedVarInt::<7>::de(&mut reader).unwrap().get() ^ baseline_mask;
        if expected_id == 2 {
            assert_eq!(change_mask, 1, "the touched entity marks its field");
            let delta = SignedVarInt::<7>::de(&mut reader).unwrap().get();
            assert_eq!(delta, 2, "5 to 7 rides as a predictor delta");
        } else {
            assert_eq!(change_mask, 0, "untouched entities carry empty masks");
        }
        assert_eq!(before - reader.bits_remaining(), prefix);
    }
    assert!(!bool::de(&mut reader).unwrap(), "terminator");
}
