//! Skip gate for blocks whose acknowledged state cannot have diverged
//! from the live state.

use crate::{
    block::GhostBlock,
    tick::{tick_after, Tick},
};

/// Per-connection, per-block send gate. A block may be dropped from a
/// send pass only when the remote provably holds its current state:
/// the data version untouched for a full streak of serialized ticks,
/// no relevancy movement, no groups in the block, and an ack at or
/// after the tick that first carried the current data.
#[derive(Debug, Default, Clone)]
pub struct StaticOptimizer {
    data_version: u64,
    structure_version: u64,
    /// First serialized tick at which the current data version was
    /// already in place.
    marker: Option<Tick>,
    streak: u32,
    last_tick: Option<Tick>,
}

impl StaticOptimizer {
    /// Gate seeded from the block's current versions, so the first
    /// serialized tick already starts a streak.
    pub fn new_for(block: &GhostBlock) -> Self {
        Self {
            data_version: block.data_version(),
            structure_version: block.structure_version(),
            marker: None,
            streak: 0,
            last_tick: None,
        }
    }

    /// True when the send pass may skip this block entirely.
    pub fn can_skip(
        &self,
        block: &GhostBlock,
        latest_acked: Option<Tick>,
        static_streak: u32,
    ) -> bool {
        let Some(marker) = self.marker else {
            return false;
        };
        let Some(acked) = latest_acked else {
            return false;
        };
        if block.has_groups() {
            return false;
        }
        if block.data_version() != self.data_version
            || block.structure_version() != self.structure_version
        {
            return false;
        }
        self.streak >= static_streak && (acked == marker || tick_after(acked, marker))
    }

    /// Record the versions the block was serialized with at `tick`.
    /// A packet rebuilt for the same tick counts one streak step.
    pub fn on_serialized(&mut self, block: &GhostBlock, tick: Tick) {
        if self.last_tick == Some(tick) {
            return;
        }
        self.last_tick = Some(tick);
        if block.structure_version() != self.structure_version {
            // Relocations invalidate the zero-change marker outright;
            // the streak restarts on the next unchanged serialize.
            self.structure_version = block.structure_version();
            self.data_version = block.data_version();
            self.marker = None;
            self.streak = 0;
            return;
        }
        if self.marker.is_none() || block.data_version() != self.data_version {
            self.data_version = block.data_version();
            self.marker = Some(tick);
            self.streak = 0;
        } else {
            self.streak = self.streak.saturating_add(1);
        }
    }

    /// Relevancy movement or any external doubt: restart the streak.
    pub fn invalidate(&mut self) {
        self.marker = None;
        self.streak = 0;
    }
}
