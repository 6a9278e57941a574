//! The loaded module: everything read once from a MOD file.

use alloc::vec::Vec;
use arrayvec::{ArrayString, ArrayVec};

use crate::pattern::Pattern;
use crate::sample::SampleSlot;
use crate::{MAX_ORDER_LEN, MAX_SAMPLES};

/// A fully parsed 31-sample MOD, read-only once loaded.
///
/// Owns the concatenated 8-bit signed PCM for every sample; individual
/// `SampleSlot`s index into it by `(offset, length)`.
#[derive(Clone, Debug)]
pub struct Module {
    pub title: ArrayString<20>,
    pub samples: ArrayVec<SampleSlot, MAX_SAMPLES>,
    /// Pattern-table order; only the first `song_length` entries are played.
    pub order: ArrayVec<u8, MAX_ORDER_LEN>,
    pub song_length: u8,
    pub restart_pos: u8,
    pub patterns: Vec<Pattern>,
    pub sample_data: Vec<i8>,
}

impl Module {
    /// Sample data for slot `index` (0-based), or an empty slice if the
    /// index is out of range or the slot has no data.
    pub fn sample_bytes(&self, index: usize) -> &[i8] {
        let Some(slot) = self.samples.get(index) else {
            return &[];
        };
        let start = slot.offset as usize;
        let end = start + slot.length as usize;
        self.sample_data.get(start..end).unwrap_or(&[])
    }

    /// Pattern index played at order-table position `pos` (wraps modulo
    /// `song_length`, per spec's song-position invariant).
    pub fn pattern_at(&self, pos: usize) -> usize {
        let len = self.song_length.max(1) as usize;
        let wrapped = pos % len;
        self.order[wrapped] as usize
    }
}
