//! Sample slot metadata.

use arrayvec::ArrayString;

/// Maximum sample length the reference replayer supports: 0xFFFF words.
pub const MAX_SAMPLE_LEN: u32 = 0xFFFF * 2;

/// Sentinel `offset`/start value meaning "no sample data" -- the shared
/// empty-sample buffer the reference calls `EmptySample`, used for
/// zero-length slots and out-of-range sample numbers.
pub const EMPTY_SAMPLE: u32 = u32::MAX;

/// One of a module's 31 sample slots.
///
/// Audio data itself lives in the owning `Module`'s `sample_data` buffer;
/// `offset`/`length` index into it rather than holding a pointer, mirroring
/// the spec's "(base_offset, length)" representation.
#[derive(Clone, Debug)]
pub struct SampleSlot {
    pub name: ArrayString<22>,
    /// Byte offset into the module's `sample_data`.
    pub offset: u32,
    /// Length in bytes (word-count from the file times 2).
    pub length: u32,
    /// Signed nibble, -8..=7 (two's complement in 4 bits as stored in the file).
    pub finetune: i8,
    /// Default volume, 0..=64.
    pub volume: u8,
    /// Loop start in bytes, relative to `offset`.
    pub loop_start: u32,
    /// Loop length in bytes; sanitized at load time, never 0.
    pub loop_length: u32,
}

impl SampleSlot {
    /// A slot for "no sample" / out-of-range sample numbers.
    pub fn empty() -> SampleSlot {
        SampleSlot {
            name: ArrayString::new(),
            offset: EMPTY_SAMPLE,
            length: 0,
            finetune: 0,
            volume: 0,
            loop_start: 0,
            loop_length: 2,
        }
    }

    pub fn has_loop(&self) -> bool {
        self.loop_length > 2
    }
}
