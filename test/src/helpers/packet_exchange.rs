use std::sync::Arc;

use wraith_shared::{
    BitWriter, GhostBlock, GhostId, HostManager, PacketIndex, PacketNotifiable, ReadOutcome,
    RemoteManager, ReplicationConfig, SchemaDescriptor, SchemaRegistry, SerializeError,
    SerializeScratch, Tick, WritePass,
};

use super::test_schema::registry_of;

/// What one exchanged tick did on both ends.
#[derive(Debug, Clone, Copy)]
pub struct TickReport {
    pub pass: WritePass,
    pub outcome: ReadOutcome,
    pub packet_bytes: usize,
    pub delivered: bool,
}

/// One host/remote pair joined by a lossless-by-default link: each
/// tick serializes one packet, delivers it, decodes it, and acks it
/// back. Set `drop_next` to lose a packet in transit.
pub struct Exchange {
    pub host: HostManager,
    pub remote: RemoteManager,
    registry: SchemaRegistry,
    scratch: SerializeScratch,
    next_packet: PacketIndex,
    pub drop_next: bool,
    pub rtt_millis: f32,
}

impl Exchange {
    pub fn new(config: ReplicationConfig, schemas: &[&Arc<SchemaDescriptor>]) -> Self {
        Self {
            host: HostManager::new(config.clone()),
            remote: RemoteManager::new(config.clone()),
            registry: registry_of(schemas),
            scratch: SerializeScratch::new(&config),
            next_packet: 1,
            drop_next: false,
            rtt_millis: 100.0,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Exchange one tick with every ghost relevant.
    pub fn tick(
        &mut self,
        host_blocks: &[&GhostBlock],
        remote_blocks: &[&GhostBlock],
        tick: Tick,
    ) -> TickReport {
        self.tick_filtered(host_blocks, remote_blocks, tick, |_, _, _| true)
    }

    /// Exchange one tick with a relevancy predicate on the host side.
    pub fn tick_filtered<F>(
        &mut self,
        host_blocks: &[&GhostBlock],
        remote_blocks: &[&GhostBlock],
        tick: Tick,
        mut relevant: F,
    ) -> TickReport
    where
        F: FnMut(&GhostBlock, usize, GhostId) -> bool,
    {
        let index = self.next_packet;
        self.next_packet = self.next_packet.wrapping_add(1);
        let capacity_bits = self.host.config().packet_capacity_bits;
        let max_scratch_bits = self.host.config().max_scratch_bits;

        let (pass, writer) = loop {
            let mut writer = BitWriter::with_capacity_bits(capacity_bits);
            match self.host.write_blocks(
                host_blocks,
                tick,
                self.rtt_millis,
                index,
                &mut writer,
                &mut self.scratch,
                &mut relevant,
            ) {
                Ok(pass) => break (pass, writer),
                Err(SerializeError::ScratchOverflow { needed_bits }) => {
                    while self.scratch.capacity_bits() < needed_bits {
                        assert!(
                            self.scratch.grow(max_scratch_bits),
                            "scratch ceiling reached in test harness"
                        );
                    }
                }
            }
        };
        let bytes = writer.to_bytes();

        if self.drop_next {
            self.drop_next = false;
            self.host.notify_packet_dropped(index);
            return TickReport {
                pass,
                outcome: ReadOutcome::default(),
                packet_bytes: bytes.len(),
                delivered: false,
            };
        }

        self.remote
            .read_packet(&bytes)
            .expect("snapshot header parses");
        let outcome = self.remote.process_ready(tick, &self.registry, remote_blocks);
        self.host.notify_packet_delivered(index);
        TickReport {
            pass,
            outcome,
            packet_bytes: bytes.len(),
            delivered: true,
        }
    }
}
