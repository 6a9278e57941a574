//! Cycle-accurate software replayer for ProTracker 2.3D modules.
//!
//! Owns no I/O: feed it a parsed [`pt_ir::Module`] and pull interleaved
//! stereo PCM out of [`Player::fill_audio`]. Everything downstream of
//! parsing -- the Paula voice model, the effect tick state machine, the
//! fixed analog filter chain, and the dithered mixdown -- lives here.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod blep;
mod channel;
mod filters;
mod minblep;
mod mixer;
mod player;
mod replayer;
mod tables;
mod voice;

pub use mixer::{calculate_pans, Mixer};
pub use player::{PlaybackPosition, Player};
pub use replayer::{Replayer, TempoMode};
pub use voice::{PaulaVoice, PeriodCache};
