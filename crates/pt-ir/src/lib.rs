//! Core IR types for the ProTracker 2.3D module format.
//!
//! This crate defines the data a 31-sample MOD loads into: a byte-exact,
//! period-native representation (no MIDI-style note abstraction) consumed
//! directly by the replayer engine. Format parsers emit this IR; nothing
//! else produces or mutates it at playback time except the funk and
//! (optional) Karplus-Strong effects, which rewrite sample bytes in place.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod effects;
mod module;
mod pattern;
mod sample;

pub use effects::{Effect, ExtCommand};
pub use module::Module;
pub use pattern::{Cell, Pattern};
pub use sample::{SampleSlot, EMPTY_SAMPLE};

/// ProTracker 2.3D always drives exactly four Paula voices; there is no
/// 6/8-channel variant in this format.
pub const AMIGA_VOICES: usize = 4;

/// Every pattern in a 31-sample MOD has exactly 64 rows.
pub const ROWS_PER_PATTERN: usize = 64;

/// Maximum number of distinct patterns addressable by the order table.
pub const MAX_PATTERNS: usize = 128;

/// Maximum number of sample slots (1-indexed in cell data; slot 0 means "no sample").
pub const MAX_SAMPLES: usize = 31;

/// Maximum song length: number of order-table entries actually played.
pub const MAX_ORDER_LEN: usize = 128;
