//! Desktop audio output for the ProTracker replayer.
//!
//! Bridges [`pt_engine::Player::fill_audio`]'s chunked interleaved i16
//! buffers to a real sound card via CPAL.

mod cpal_backend;
mod traits;

pub use cpal_backend::CpalOutput;
pub use traits::{AudioError, AudioOutput};
