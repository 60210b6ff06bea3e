use wraith_serde::{BitReader, BitSerde, BitWrite, SignedVarInt, StreamError};

use crate::tick::{tick_delta, Tick};

/// Static shape of one component inside a snapshot record.
#[derive(Debug, Clone, Copy)]
pub struct CodecLayout {
    /// Change-mask bits this component owns (LSB-first in the value
    /// returned by [`ComponentCodec::encode`]).
    pub mask_bits: u8,
    /// Fixed record words this component owns.
    pub words: u8,
    /// Bytes per entity in the live value column. Zero for buffers.
    pub stride: usize,
    /// Variable-length component: words are `(len, arena offset)` and
    /// the snapshot layer moves the bytes itself.
    pub buffer: bool,
    /// Whether the words may be run through the baseline predictor.
    pub predict: bool,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::QuantizedFloatCodec {}
    impl Sealed for super::IntCodec {}
    impl Sealed for super::QuantizedVec3Codec {}
    impl Sealed for super::BufferCodec {}
}

/// Per-component transform between live bytes, quantized record words
/// and wire bits. Dispatch is resolved once per type through the
/// schema descriptor, never per field.
///
/// The trait is sealed: the record layout math in the serializer and
/// history ring is only valid for the codecs defined here.
pub trait ComponentCodec: Send + Sync + sealed::Sealed {
    fn layout(&self) -> CodecLayout;

    /// Quantize live bytes into record words.
    fn capture(&self, live: &[u8], words: &mut [u32]);

    /// Reconstitute live bytes from record words.
    fn apply(&self, words: &[u32], live: &mut [u8]);

    /// Compare `current` words against the predicted baseline, write
    /// payload bits for what changed, and return the change bits.
    /// `predicted` is `None` exactly when the entity is being sent
    /// without a baseline; everything is then written raw.
    fn encode(&self, current: &[u32], predicted: Option<&[u32]>, payload: &mut dyn BitWrite)
        -> u32;

    /// Mirror of [`Self::encode`]: rebuild current words from the
    /// change bits, the predicted baseline and the payload.
    fn decode(
        &self,
        mask: u32,
        predicted: Option<&[u32]>,
        words: &mut [u32],
        reader: &mut BitReader,
    ) -> Result<(), StreamError>;

    /// Blend two records at `t` in `[0, 1]` and write the result to
    /// live bytes.
    fn interpolate(&self, from: &[u32], to: &[u32], t: f32, live: &mut [u8]);
}

fn f32_from_live(live: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        live[offset],
        live[offset + 1],
        live[offset + 2],
        live[offset + 3],
    ])
}

fn delta_encode(current: u32, predicted: u32, payload: &mut dyn BitWrite) {
    let delta = (current as i32 as i64) - (predicted as i32 as i64);
    SignedVarInt::<7>::new(delta).ser(payload);
}

fn delta_decode(predicted: u32, reader: &mut BitReader) -> Result<u32, StreamError> {
    let delta = SignedVarInt::<7>::de(reader)?.get();
    Ok(((predicted as i32 as i64) + delta) as i32 as u32)
}

/// `f32` scaled by a fixed multiplier and stored as a signed 32-bit
/// quantity. One change bit, one word.
pub struct QuantizedFloatCodec {
    multiplier: f32,
}

impl QuantizedFloatCodec {
    pub fn new(multiplier: f32) -> Self {
        assert!(multiplier > 0.0);
        Self { multiplier }
    }

    fn quantize(&self, value: f32) -> u32 {
        (value * self.multiplier).round() as i32 as u32
    }

    fn dequantize(&self, word: u32) -> f32 {
        (word as i32 as f32) / self.multiplier
    }
}

impl ComponentCodec for QuantizedFloatCodec {
    fn layout(&self) -> CodecLayout {
        CodecLayout {
            mask_bits: 1,
            words: 1,
            stride: 4,
            buffer: false,
            predict: true,
        }
    }

    fn capture(&self, live: &[u8], words: &mut [u32]) {
        words[0] = self.quantize(f32_from_live(live, 0));
    }

    fn apply(&self, words: &[u32], live: &mut [u8]) {
        live[0..4].copy_from_slice(&self.dequantize(words[0]).to_le_bytes());
    }

    fn encode(
        &self,
        current: &[u32],
        predicted: Option<&[u32]>,
        payload: &mut dyn BitWrite,
    ) -> u32 {
        match predicted {
            Some(predicted) => {
                if current[0] == predicted[0] {
                    0
                } else {
                    delta_encode(current[0], predicted[0], payload);
                    1
                }
            }
            None => {
                current[0].ser(payload);
                1
            }
        }
    }

    fn decode(
        &self,
        mask: u32,
        predicted: Option<&[u32]>,
        words: &mut [u32],
        reader: &mut BitReader,
    ) -> Result<(), StreamError> {
        match predicted {
            Some(predicted) => {
                words[0] = if mask & 1 != 0 {
                    delta_decode(predicted[0], reader)?
                } else {
                    predicted[0]
                };
            }
            None => words[0] = u32::de(reader)?,
        }
        Ok(())
    }

    fn interpolate(&self, from: &[u32], to: &[u32], t: f32, live: &mut [u8]) {
        let a = self.dequantize(from[0]);
        let b = self.dequantize(to[0]);
        let blended = a + (b - a) * t;
        live[0..4].copy_from_slice(&blended.to_le_bytes());
    }
}

/// Raw 32-bit integer. Interpolation steps instead of blending.
pub struct IntCodec;

impl ComponentCodec for IntCodec {
    fn layout(&self) -> CodecLayout {
        CodecLayout {
            mask_bits: 1,
            words: 1,
            stride: 4,
            buffer: false,
            predict: true,
        }
    }

    fn capture(&self, live: &[u8], words: &mut [u32]) {
        words[0] = u32::from_le_bytes([live[0], live[1], live[2], live[3]]);
    }

    fn apply(&self, words: &[u32], live: &mut [u8]) {
        live[0..4].copy_from_slice(&words[0].to_le_bytes());
    }

    fn encode(
        &self,
        current: &[u32],
        predicted: Option<&[u32]>,
        payload: &mut dyn BitWrite,
    ) -> u32 {
        match predicted {
            Some(predicted) => {
                if current[0] == predicted[0] {
                    0
                } else {
                    delta_encode(current[0], predicted[0], payload);
                    1
                }
            }
            None => {
                current[0].ser(payload);
                1
            }
        }
    }

    fn decode(
        &self,
        mask: u32,
        predicted: Option<&[u32]>,
        words: &mut [u32],
        reader: &mut BitReader,
    ) -> Result<(), StreamError> {
        match predicted {
            Some(predicted) => {
                words[0] = if mask & 1 != 0 {
                    delta_decode(predicted[0], reader)?
                } else {
                    predicted[0]
                };
            }
            None => words[0] = u32::de(reader)?,
        }
        Ok(())
    }

    fn interpolate(&self, from: &[u32], _to: &[u32], _t: f32, live: &mut [u8]) {
        self.apply(from, live);
    }
}

/// Three quantized `f32`s sharing one multiplier. One change bit per
/// axis, so a single moving axis costs one delta varint.
pub struct QuantizedVec3Codec {
    multiplier: f32,
}

impl QuantizedVec3Codec {
    pub fn new(multiplier: f32) -> Self {
        assert!(multiplier > 0.0);
        Self { multiplier }
    }

    fn quantize(&self, value: f32) -> u32 {
        (value * self.multiplier).round() as i32 as u32
    }

    fn dequantize(&self, word: u32) -> f32 {
        (word as i32 as f32) / self.multiplier
    }
}

impl ComponentCodec for QuantizedVec3Codec {
    fn layout(&self) -> CodecLayout {
        CodecLayout {
            mask_bits: 3,
            words: 3,
            stride: 12,
            buffer: false,
            predict: true,
        }
    }

    fn capture(&self, live: &[u8], words: &mut [u32]) {
        for axis in 0..3 {
            words[axis] = self.quantize(f32_from_live(live, axis * 4));
        }
    }

    fn apply(&self, words: &[u32], live: &mut [u8]) {
        for axis in 0..3 {
            let bytes = self.dequantize(words[axis]).to_le_bytes();
            live[axis * 4..axis * 4 + 4].copy_from_slice(&bytes);
        }
    }

    fn encode(
        &self,
        current: &[u32],
        predicted: Option<&[u32]>,
        payload: &mut dyn BitWrite,
    ) -> u32 {
        let mut mask = 0u32;
        for axis in 0..3 {
            match predicted {
                Some(predicted) => {
                    if current[axis] != predicted[axis] {
                        delta_encode(current[axis], predicted[axis], payload);
                        mask |= 1 << axis;
                    }
                }
                None => {
                    current[axis].ser(payload);
                    mask |= 1 << axis;
                }
            }
        }
        mask
    }

    fn decode(
        &self,
        mask: u32,
        predicted: Option<&[u32]>,
        words: &mut [u32],
        reader: &mut BitReader,
    ) -> Result<(), StreamError> {
        for axis in 0..3 {
            match predicted {
                Some(predicted) => {
                    words[axis] = if mask & (1 << axis) != 0 {
                        delta_decode(predicted[axis], reader)?
                    } else {
                        predicted[axis]
                    };
                }
                None => words[axis] = u32::de(reader)?,
            }
        }
        Ok(())
    }

    fn interpolate(&self, from: &[u32], to: &[u32], t: f32, live: &mut [u8]) {
        for axis in 0..3 {
            let a = self.dequantize(from[axis]);
            let b = self.dequantize(to[axis]);
            let bytes = (a + (b - a) * t).to_le_bytes();
            live[axis * 4..axis * 4 + 4].copy_from_slice(&bytes);
        }
    }
}

/// Variable-length byte payload. The snapshot layer owns the byte
/// movement through the slot arenas; this codec only contributes the
/// record shape: words are `(len, arena offset)`, one change bit.
pub struct BufferCodec;

impl ComponentCodec for BufferCodec {
    fn layout(&self) -> CodecLayout {
        CodecLayout {
            mask_bits: 1,
            words: 2,
            stride: 0,
            buffer: true,
            predict: false,
        }
    }

    fn capture(&self, _live: &[u8], _words: &mut [u32]) {}

    fn apply(&self, _words: &[u32], _live: &mut [u8]) {}

    fn encode(
        &self,
        _current: &[u32],
        _predicted: Option<&[u32]>,
        _payload: &mut dyn BitWrite,
    ) -> u32 {
        0
    }

    fn decode(
        &self,
        _mask: u32,
        _predicted: Option<&[u32]>,
        _words: &mut [u32],
        _reader: &mut BitReader,
    ) -> Result<(), StreamError> {
        Ok(())
    }

    fn interpolate(&self, _from: &[u32], _to: &[u32], _t: f32, _live: &mut [u8]) {}
}

/// Integer extrapolation over up to three baseline points,
/// most-recent-first. Both ends run the identical math, so the
/// prediction cancels exactly and unchanged-after-prediction fields
/// cost zero payload bits.
pub struct DeltaPredictor {
    dt: i64,
    d01: i64,
    d12: i64,
    count: usize,
}

impl DeltaPredictor {
    /// `ticks` are the baseline ticks, newest first, all older than
    /// `target` and strictly descending.
    pub fn new(target: Tick, ticks: &[Tick]) -> Self {
        let count = ticks.len().min(3);
        debug_assert!(count >= 1);
        let dt = tick_delta(ticks[0], target) as i64;
        let d01 = if count >= 2 {
            tick_delta(ticks[1], ticks[0]) as i64
        } else {
            1
        };
        let d12 = if count >= 3 {
            tick_delta(ticks[2], ticks[1]) as i64
        } else {
            1
        };
        debug_assert!(dt >= 1 && d01 >= 1 && d12 >= 1);
        Self {
            dt,
            d01,
            d12,
            count,
        }
    }

    pub fn predict(&self, b0: u32, b1: u32, b2: u32) -> u32 {
        let v0 = b0 as i32 as i64;
        if self.count < 2 {
            return b0;
        }
        let v1 = b1 as i32 as i64;
        let vel = (v0 - v1) / self.d01;
        let mut predicted = v0 + vel * self.dt;
        if self.count >= 3 {
            let v2 = b2 as i32 as i64;
            let accel = vel - (v1 - v2) / self.d12;
            predicted += accel * self.dt * (self.dt + 1) / 2;
        }
        predicted as i32 as u32
    }
}
