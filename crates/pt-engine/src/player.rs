//! Top-level engine facade: owns the loaded module, the four Paula voices,
//! the replayer's tick state, and the mixer. `fill_audio` is the only
//! method on the real-time path.

use pt_ir::Module;

use crate::mixer::{calculate_pans, Mixer};
use crate::replayer::{Replayer, TempoMode};
use crate::voice::{PaulaVoice, PeriodCache};

/// Matches the reference mixer's static buffer size; caps how many frames
/// `fill_audio` mixes in one inner pass so a long tick (low BPM, high
/// sample rate) can't index past the mixer's scratch buffers.
const MIX_BUF_SAMPLES: usize = 4096;

/// Clamp applied to the caller-supplied audio rate: below 32kHz the BLEP
/// synthesis misbehaves, and there's no reason to go above 96kHz.
fn clamp_audio_rate(rate: u32) -> u32 {
    rate.clamp(32_000, 96_000)
}

pub struct Player {
    module: Module,
    voices: [PaulaVoice; 4],
    cache: PeriodCache,
    replayer: Replayer,
    mixer: Mixer,
    paused: bool,
    samples_per_tick_left: u32,
    sample_counter: u64,
    audio_rate: u32,
}

impl Player {
    /// Equivalent of `pt2play_PlaySong`: clamps the audio rate, builds the
    /// filter chain and pan table for the default 25% stereo separation,
    /// and starts the song paused-then-immediately-unpaused the way the
    /// reference does (so the first tick sees consistent state).
    pub fn new(module: Module, tempo_mode: TempoMode, audio_rate: u32) -> Player {
        let audio_rate = clamp_audio_rate(audio_rate);
        let mut replayer = Replayer::new(audio_rate);
        replayer.tempo_mode = tempo_mode;

        let mut voices: [PaulaVoice; 4] = Default::default();
        for (i, (pan_l, pan_r)) in calculate_pans(25).into_iter().enumerate() {
            voices[i].d_pan_l = pan_l;
            voices[i].d_pan_r = pan_r;
        }

        Player {
            module,
            voices,
            cache: PeriodCache::default(),
            replayer,
            mixer: Mixer::new(audio_rate),
            paused: false,
            samples_per_tick_left: 0,
            sample_counter: 0,
            audio_rate,
        }
    }

    /// Fills `buffer` (interleaved stereo i16, `buffer.len() == frames * 2`)
    /// with `frames` samples, advancing the replayer a tick at a time.
    ///
    /// Ports `pt2play_FillAudioBuffer`: the replayer only ticks when the
    /// previous tick's samples are exhausted, so a caller requesting a
    /// buffer smaller than one tick's worth of samples can call this
    /// repeatedly without skipping or repeating ticks.
    pub fn fill_audio(&mut self, buffer: &mut [i16], frames: usize) {
        debug_assert!(buffer.len() >= frames * 2);

        let mut remaining = frames;
        let mut offset = 0;
        while remaining > 0 {
            if self.samples_per_tick_left == 0 {
                if !self.paused {
                    self.replayer.tick(&mut self.module, &mut self.voices, &mut self.cache);
                }
                self.samples_per_tick_left = self.replayer.samples_per_tick as u32;
            }

            let chunk = remaining.min(self.samples_per_tick_left as usize).min(MIX_BUF_SAMPLES);
            let out = &mut buffer[offset * 2..(offset + chunk) * 2];

            if self.paused {
                out.fill(0);
            } else {
                self.mixer.mix(&mut self.voices, &self.module.sample_data, out, chunk);
            }

            offset += chunk;
            remaining -= chunk;
            self.samples_per_tick_left -= chunk as u32;
        }

        self.sample_counter += frames as u64;
    }

    pub fn set_stereo_sep(&mut self, percentage: u8) {
        let pct = percentage.min(100);
        for (i, (pan_l, pan_r)) in calculate_pans(pct).into_iter().enumerate() {
            self.voices[i].d_pan_l = pan_l;
            self.voices[i].d_pan_r = pan_r;
        }
    }

    pub fn set_master_vol(&mut self, vol: u16) {
        self.mixer.master_vol = (vol as i32).clamp(0, 256);
    }

    pub fn get_master_vol(&self) -> u16 {
        self.mixer.master_vol as u16
    }

    /// Milliseconds of audio produced so far, truncated the way the
    /// reference's integer division does.
    pub fn get_mixer_ticks(&self) -> u32 {
        if self.audio_rate < 1000 {
            return 0;
        }
        (self.sample_counter / (self.audio_rate / 1000) as u64) as u32
    }

    pub fn pause_song(&mut self, flag: bool) {
        self.paused = flag;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn led_filter_on(&self) -> bool {
        self.replayer.led_filter_on
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Current song/pattern/row the replayer is ticking, for display
    /// purposes only -- nothing in the mix path depends on this.
    pub fn position(&self) -> PlaybackPosition {
        let order_index = self.replayer.song_position;
        let pattern_index = self.module.pattern_at(order_index as usize);
        let row = ((self.replayer.pattern_pos >> 4) & 63) as u8;
        PlaybackPosition {
            order_index,
            pattern_index,
            row,
        }
    }
}

/// Snapshot of where playback currently is, for UI/CLI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackPosition {
    pub order_index: u8,
    pub pattern_index: usize,
    pub row: u8,
}

#[cfg(feature = "alloc_check")]
impl Player {
    /// Same as `fill_audio`, wrapped so any hidden allocation on the
    /// real-time path aborts the test/bench instead of silently jittering.
    pub fn fill_audio_checked(&mut self, buffer: &mut [i16], frames: usize) {
        assert_no_alloc::assert_no_alloc(|| self.fill_audio(buffer, frames));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pt_format::load_mod;

    fn minimal_mod() -> Module {
        let mut data = alloc::vec![0u8; 1084 + 1024];
        data[1080..1084].copy_from_slice(b"M.K.");
        data[950] = 1; // song length
        load_mod(&data).expect("minimal module should load")
    }

    #[test]
    fn fill_audio_produces_silence_for_an_empty_module() {
        let module = minimal_mod();
        let mut player = Player::new(module, TempoMode::Cia, 48000);
        let mut buf = [0i16; 2000];
        player.fill_audio(&mut buf, 1000);
        assert!(buf.iter().all(|&s| s == 0));
    }

    #[test]
    fn paused_player_emits_silence_and_does_not_tick() {
        let module = minimal_mod();
        let mut player = Player::new(module, TempoMode::Cia, 48000);
        player.pause_song(true);
        let mut buf = [1i16; 200];
        player.fill_audio(&mut buf, 100);
        assert!(buf.iter().all(|&s| s == 0));
    }

    #[test]
    fn mixer_ticks_scale_with_audio_rate() {
        let module = minimal_mod();
        let mut player = Player::new(module, TempoMode::Cia, 48000);
        let mut buf = [0i16; 96000];
        player.fill_audio(&mut buf, 48000);
        assert_eq!(player.get_mixer_ticks(), 1000);
    }
}
