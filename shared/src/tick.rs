use wraith_serde::{BitReader, BitSerde, BitWrite, StreamError};

/// Simulation tick counter. Wraps at 65536; all comparisons must go
/// through [`tick_after`] / [`tick_delta`].
pub type Tick = u16;

/// True if `a` occurs after `b`, allowing wraparound.
pub fn tick_after(a: Tick, b: Tick) -> bool {
    (a.wrapping_sub(b) as i16) > 0
}

/// Signed distance from `from` to `to`, allowing wraparound. Positive
/// when `to` is later.
pub fn tick_delta(from: Tick, to: Tick) -> i16 {
    to.wrapping_sub(from) as i16
}

/// A sample point on the tick timeline: a tick plus the fraction of the
/// following tick that has elapsed. `fraction == 0.0` marks a fully
/// simulated tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInstant {
    pub tick: Tick,
    pub fraction: f32,
}

impl TickInstant {
    pub fn new(tick: Tick, fraction: f32) -> Self {
        debug_assert!((0.0..1.0).contains(&fraction));
        Self { tick, fraction }
    }

    pub fn whole(tick: Tick) -> Self {
        Self {
            tick,
            fraction: 0.0,
        }
    }

    /// Whether this instant sits exactly on a tick boundary.
    pub fn is_whole(&self) -> bool {
        self.fraction == 0.0
    }
}

impl BitSerde for TickInstant {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.tick.ser(writer);
        // Quantized to 1/256ths; enough for render-time blending.
        let fraction = (self.fraction * 256.0) as u8;
        fraction.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, StreamError> {
        let tick = Tick::de(reader)?;
        let fraction = u8::de(reader)? as f32 / 256.0;
        Ok(Self { tick, fraction })
    }

    fn bit_length(&self) -> u32 {
        24
    }
}
