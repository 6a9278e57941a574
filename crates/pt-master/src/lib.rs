//! Headless controller for the ProTracker replayer.
//!
//! Provides a unified API for loading modules, real-time playback, and
//! offline WAV rendering that both a CLI and a future GUI can share.

mod wav;

use pt_audio::{AudioOutput, CpalOutput};
use pt_engine::{Player, TempoMode};
use pt_ir::Module;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub use pt_engine::PlaybackPosition;
pub use pt_format::PtError;

pub use wav::{samples_to_wav, write_wav};

/// Headless tracker controller -- owns at most one loaded module and
/// manages real-time playback on a background thread.
pub struct Controller {
    module: Option<Module>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    position: Arc<AtomicU32>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new() -> Self {
        Self {
            module: None,
            playback: None,
        }
    }

    // --- Module management ---

    pub fn module(&self) -> Option<&Module> {
        self.module.as_ref()
    }

    pub fn load_mod(&mut self, data: &[u8]) -> Result<(), PtError> {
        self.stop();
        self.module = Some(pt_format::load_mod(data)?);
        Ok(())
    }

    // --- Real-time playback ---

    /// Starts playback on a background thread against the default audio
    /// device. No-op if no module is loaded.
    pub fn play(&mut self) {
        self.stop();

        let Some(module) = self.module.clone() else {
            return;
        };

        let stop_signal = Arc::new(AtomicBool::new(false));
        let position = Arc::new(AtomicU32::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stop = stop_signal.clone();
        let pos = position.clone();
        let done = finished.clone();

        let thread = std::thread::spawn(move || {
            audio_thread(module, stop, pos, done);
        });

        self.playback = Some(PlaybackHandle {
            stop_signal,
            position,
            finished,
            thread: Some(thread),
        });
    }

    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                let _ = handle.join();
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    pub fn is_finished(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.finished.load(Ordering::Relaxed))
    }

    pub fn position(&self) -> Option<PlaybackPosition> {
        let pb = self.playback.as_ref()?;
        if pb.finished.load(Ordering::Relaxed) {
            return None;
        }
        Some(unpack_position(pb.position.load(Ordering::Relaxed)))
    }

    // --- Offline rendering ---

    /// Renders up to `max_frames` interleaved stereo samples (2 i16s per
    /// frame) at `sample_rate`. The module keeps looping through its order
    /// list forever, so the caller's `max_frames` is the only stop
    /// condition -- there is no natural "song end" in a 31-sample MOD.
    pub fn render_samples(&self, sample_rate: u32, max_frames: usize) -> Vec<i16> {
        let Some(module) = self.module.clone() else {
            return Vec::new();
        };

        let mut player = Player::new(module, TempoMode::Cia, sample_rate);
        let mut out = vec![0i16; max_frames * 2];
        player.fill_audio(&mut out, max_frames);
        out
    }

    pub fn render_to_wav(&self, sample_rate: u32, max_seconds: u32) -> Vec<u8> {
        let max_frames = (sample_rate * max_seconds) as usize;
        let samples = self.render_samples(sample_rate, max_frames);
        wav::samples_to_wav(&samples, sample_rate)
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

fn pack_position(pos: PlaybackPosition) -> u32 {
    (pos.order_index as u32) << 16 | (pos.pattern_index as u32 & 0xFF) << 8 | pos.row as u32
}

fn unpack_position(packed: u32) -> PlaybackPosition {
    PlaybackPosition {
        order_index: (packed >> 16) as u8,
        pattern_index: ((packed >> 8) & 0xFF) as usize,
        row: (packed & 0xFF) as u8,
    }
}

fn audio_thread(
    module: Module,
    stop_signal: Arc<AtomicBool>,
    position: Arc<AtomicU32>,
    finished: Arc<AtomicBool>,
) {
    let Ok((mut output, consumer)) = CpalOutput::new() else {
        finished.store(true, Ordering::Relaxed);
        return;
    };

    let sample_rate = output.sample_rate();
    let mut player = Player::new(module, TempoMode::Cia, sample_rate);

    if output.build_stream(consumer).is_err() {
        finished.store(true, Ordering::Relaxed);
        return;
    }
    let _ = output.start();

    // Small chunks keep the position readout responsive without adding
    // meaningful per-call overhead.
    const CHUNK_FRAMES: usize = 512;
    let mut chunk = vec![0i16; CHUNK_FRAMES * 2];

    while !stop_signal.load(Ordering::Relaxed) {
        player.fill_audio(&mut chunk, CHUNK_FRAMES);
        let _ = output.write(&chunk);
        position.store(pack_position(player.position()), Ordering::Relaxed);
    }

    let silence = vec![0i16; sample_rate as usize * 2];
    let _ = output.write(&silence);

    finished.store(true, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_mod_bytes() -> Vec<u8> {
        let mut data = vec![0u8; 1084 + 1024];
        data[1080..1084].copy_from_slice(b"M.K.");
        data[950] = 1;
        data
    }

    #[test]
    fn new_controller_has_no_module() {
        let ctrl = Controller::new();
        assert!(ctrl.module().is_none());
        assert!(!ctrl.is_playing());
        assert!(ctrl.position().is_none());
    }

    #[test]
    fn load_mod_populates_the_module() {
        let mut ctrl = Controller::new();
        ctrl.load_mod(&minimal_mod_bytes()).unwrap();
        assert!(ctrl.module().is_some());
    }

    #[test]
    fn render_without_a_loaded_module_is_empty() {
        let ctrl = Controller::new();
        assert!(ctrl.render_samples(44100, 1000).is_empty());
    }

    #[test]
    fn render_samples_produces_the_requested_frame_count() {
        let mut ctrl = Controller::new();
        ctrl.load_mod(&minimal_mod_bytes()).unwrap();
        let samples = ctrl.render_samples(44100, 1000);
        assert_eq!(samples.len(), 2000);
    }

    #[test]
    fn position_packing_roundtrips() {
        let pos = PlaybackPosition {
            order_index: 7,
            pattern_index: 42,
            row: 63,
        };
        assert_eq!(unpack_position(pack_position(pos)), pos);
    }
}
