use std::time::Duration;

use wraith_serde::MTU_SIZE_BITS;

use crate::tick::Tick;

/// Multiplier applied to round-trip time when deciding how stale a
/// baseline may get before it is written off as undeliverable.
pub const BASELINE_AGE_RTT_FACTOR: f32 = 1.5;

/// Tuning knobs shared by the host and remote ends of a replication
/// session. Both ends must be constructed from the same values; the
/// history ring math depends on it.
#[derive(Clone, Debug)]
pub struct ReplicationConfig {
    /// Snapshot ring length per block, in ticks. Must be a power of two.
    pub history_capacity: usize,
    /// Consecutive serialized ticks a block must stay byte-identical
    /// before the static optimization may skip it.
    pub static_streak: u32,
    /// Baseline staleness multiplier over RTT; see
    /// [`BASELINE_AGE_RTT_FACTOR`].
    pub baseline_age_factor: f32,
    /// Wall-clock length of one simulation tick.
    pub tick_duration: Duration,
    /// Capacity of one outgoing packet, in bits.
    pub packet_capacity_bits: u32,
    /// Starting size of the per-worker serialization scratch, in bits.
    pub scratch_capacity_bits: u32,
    /// Ceiling for scratch doubling before an overflow becomes fatal.
    pub max_scratch_bits: u32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            history_capacity: 32,
            static_streak: 3,
            baseline_age_factor: BASELINE_AGE_RTT_FACTOR,
            tick_duration: Duration::from_millis(50),
            packet_capacity_bits: MTU_SIZE_BITS,
            scratch_capacity_bits: MTU_SIZE_BITS * 4,
            max_scratch_bits: 1 << 24,
        }
    }
}

impl ReplicationConfig {
    /// Oldest acceptable baseline age in ticks for a connection with
    /// the given round-trip time. Never exceeds what the ring can hold.
    pub fn max_baseline_age(&self, rtt_millis: f32) -> Tick {
        let tick_millis = self.tick_duration.as_millis().max(1) as f32;
        let age = ((rtt_millis * self.baseline_age_factor) / tick_millis).ceil() as usize;
        age.clamp(1, self.history_capacity - 1) as Tick
    }
}
