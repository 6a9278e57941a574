//! Format parsing for 31-sample ProTracker MOD files.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod mod_format;

pub use mod_format::load_mod;

/// Error type for module loading. This is the only fallible boundary in
/// the whole crate family: once a `Module` exists, playback cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtError {
    /// File is shorter than the fixed 1084-byte header region.
    UnexpectedEof,
    /// The 4-byte tag at offset 1080 isn't a 4-channel signature this
    /// loader recognizes (`M.K.`, `M!K!`, `FLT4`).
    InvalidHeader,
    /// Pattern or sample data runs past the end of the file.
    TruncatedData,
}
