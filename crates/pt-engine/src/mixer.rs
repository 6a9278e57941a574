//! Per-sample mixing: voice summation, the fixed filter chain, equal-power
//! panning, and triangular-PDF dithered quantization to 16-bit PCM.

use crate::blep::Blep;
use crate::filters::{LedFilter, RcFilter};
use crate::voice::PaulaVoice;

pub const AMIGA_VOICES: usize = 4;
pub const INITIAL_DITHER_SEED: i32 = 0x1234_5000;

/// Equal-power pan curve approximation (not a true sine/cosine — a cheap
/// polynomial fit good enough that nobody on real hardware could tell).
fn sin_apx(x: f64) -> f64 {
    let x = x * (2.0 - x);
    x * 1.09742972 + x * x * 0.31678383
}

fn cos_apx(x: f64) -> f64 {
    let x = (1.0 - x) * (1.0 + x);
    x * 1.09742972 + x * x * 0.31678383
}

/// Per-voice L/R pan gains for a given stereo separation percentage (0..=100).
/// Voices 0 and 3 share one pan position, voices 1 and 2 the mirrored one,
/// matching Paula's fixed LRRL hardware wiring.
pub fn calculate_pans(separation_pct: u8) -> [(f64, f64); AMIGA_VOICES] {
    let sep = separation_pct.min(100);
    let scaled_pan_pos = (sep as u32 * 128) / 100;

    let p_left = (128 - scaled_pan_pos) as f64 * (1.0 / 256.0);
    let p_right = (128 + scaled_pan_pos) as f64 * (1.0 / 256.0);

    let outer = (cos_apx(p_left), sin_apx(p_left));
    let inner = (cos_apx(p_right), sin_apx(p_right));
    [outer, inner, inner, outer]
}

fn random32(seed: &mut i32) -> i32 {
    *seed = seed.wrapping_mul(134_775_813).wrapping_add(1);
    *seed
}

/// Per-channel BLEP state plus the dithering/filter chain shared by every
/// voice. Owned by `Player`, advanced one tick's worth of samples at a time.
pub struct Mixer {
    pub blep_smp: [Blep; AMIGA_VOICES],
    pub blep_vol: [Blep; AMIGA_VOICES],
    pub filter_lo: RcFilter,
    pub filter_hi: RcFilter,
    pub filter_led: LedFilter,
    pub led_filter_on: bool,
    pub master_vol: i32,
    rand_seed: i32,
    prng_state_l: f64,
    prng_state_r: f64,
}

impl Mixer {
    pub fn new(audio_rate: u32) -> Mixer {
        let rate = audio_rate as f64;
        Mixer {
            blep_smp: Default::default(),
            blep_vol: Default::default(),
            // A500 one-pole RC low-pass: R321 360ohm, C321 0.1uF, ~4420.97Hz.
            filter_lo: RcFilter::with_coeffs(rate, 1.0 / (2.0 * core::f64::consts::PI * 360.0 * 1e-7)),
            // A500/A1200 Sallen-Key "LED" filter: R322/R323 10K, C322 6800pF, C323 3900pF, Fb=0.125.
            filter_led: LedFilter::with_coeffs(
                rate,
                1.0 / (2.0 * core::f64::consts::PI * libm::sqrt(10_000.0 * 10_000.0 * 6.8e-9 * 3.9e-9)),
                0.125,
            ),
            // A500/A1200 one-pole RC high-pass: R324+R325 1390ohm, C334 22uF, ~5.2KHz.
            filter_hi: RcFilter::with_coeffs(rate, 1.0 / (2.0 * core::f64::consts::PI * 1390.0 * 2.2e-5)),
            led_filter_on: false,
            master_vol: 256,
            rand_seed: INITIAL_DITHER_SEED,
            prng_state_l: 0.0,
            prng_state_r: 0.0,
        }
    }

    pub fn reset_dithering(&mut self) {
        self.rand_seed = INITIAL_DITHER_SEED;
        self.prng_state_l = 0.0;
        self.prng_state_r = 0.0;
    }

    /// Mixes `len` samples from the four Paula voices into `out` (interleaved
    /// stereo i16 pairs). `pans` gives each voice's fixed (L, R) gain.
    pub fn mix(&mut self, voices: &mut [PaulaVoice; AMIGA_VOICES], sample_data: &[i8], out: &mut [i16], len: usize) {
        let mut mix_l = [0.0f64; 4096];
        let mut mix_r = [0.0f64; 4096];
        let mix_l = &mut mix_l[..len];
        let mix_r = &mut mix_r[..len];

        for (i, voice) in voices.iter_mut().enumerate() {
            if !voice.active {
                continue;
            }
            let blep_smp = &mut self.blep_smp[i];
            let blep_vol = &mut self.blep_vol[i];

            for j in 0..len {
                let byte = sample_at(sample_data, voice.data, voice.pos);
                let mut smp = byte as f64 * (1.0 / 128.0);
                let mut vol = voice.d_volume;

                if smp != blep_smp.d_last_value {
                    if voice.d_last_delta > voice.d_last_phase {
                        blep_smp.add(voice.d_last_phase * voice.d_last_delta_mul, blep_smp.d_last_value - smp);
                    }
                    blep_smp.d_last_value = smp;
                }

                if vol != blep_vol.d_last_value {
                    blep_vol.vol_add(blep_vol.d_last_value - vol);
                    blep_vol.d_last_value = vol;
                }

                if blep_smp.samples_left > 0 {
                    smp = blep_smp.run(smp);
                }
                if blep_vol.samples_left > 0 {
                    vol = blep_vol.run(vol);
                }

                smp *= vol;
                mix_l[j] += smp * voice.d_pan_l;
                mix_r[j] += smp * voice.d_pan_r;

                voice.d_phase += voice.d_delta;
                if voice.d_phase >= 1.0 {
                    voice.d_phase -= 1.0;
                    voice.d_last_phase = voice.d_phase;
                    voice.d_last_delta = voice.d_delta;
                    voice.d_last_delta_mul = voice.d_delta_mul;

                    voice.pos += 1;
                    if voice.pos >= voice.length {
                        voice.pos = 0;
                        voice.length = voice.new_length;
                        voice.data = voice.new_data;
                    }
                }
            }
        }

        for j in 0..len {
            let mut out_l = mix_l[j];
            let mut out_r = mix_r[j];

            let lo = self.filter_lo.low_pass([out_l, out_r]);
            out_l = lo[0];
            out_r = lo[1];
            if self.led_filter_on {
                let led = self.filter_led.process([out_l, out_r]);
                out_l = led[0];
                out_r = led[1];
            }
            let hp = self.filter_hi.high_pass([out_l, out_r]);
            out_l = hp[0];
            out_r = hp[1];

            let (l16, r16) = self.post_mix(out_l, out_r);
            out[j * 2] = l16;
            out[j * 2 + 1] = r16;
        }
    }

    /// Normalizes, flips phase (the A500/A1200 audio signal is inverted),
    /// dithers with a 1-bit triangular high-pass PDF, and clamps to i16.
    /// Master volume is applied *after* dithering, matching the reference.
    fn post_mix(&mut self, l: f64, r: f64) -> (i16, i16) {
        const SCALE: f64 = -(i16::MAX as f64) / AMIGA_VOICES as f64;
        let mut l = l * SCALE;
        let mut r = r * SCALE;

        let dprng_l = random32(&mut self.rand_seed) as f64 * (0.5 / i32::MAX as f64);
        l = (l + dprng_l) - self.prng_state_l;
        self.prng_state_l = dprng_l;
        let mut smp_l = l as i32;
        smp_l = (smp_l * self.master_vol) >> 8;

        let dprng_r = random32(&mut self.rand_seed) as f64 * (0.5 / i32::MAX as f64);
        r = (r + dprng_r) - self.prng_state_r;
        self.prng_state_r = dprng_r;
        let mut smp_r = r as i32;
        smp_r = (smp_r * self.master_vol) >> 8;

        (clamp16(smp_l), clamp16(smp_r))
    }
}

fn clamp16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Reads the signed byte at `pos` within the sample starting at `data`,
/// treating `EMPTY_SAMPLE` (and any position outside the buffer) as silence.
fn sample_at(sample_data: &[i8], data: u32, pos: i32) -> i8 {
    if data == crate::channel::EMPTY_SAMPLE {
        return 0;
    }
    let idx = data as usize + pos as usize;
    sample_data.get(idx).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pans_are_symmetric_at_full_separation() {
        let pans = calculate_pans(100);
        assert!((pans[0].0 - pans[3].0).abs() < 1e-12);
        assert!((pans[1].1 - pans[2].1).abs() < 1e-12);
        // hard left/right: outer voices should favor L over R
        assert!(pans[0].0 > pans[0].1);
    }

    #[test]
    fn mono_separation_centers_all_voices() {
        let pans = calculate_pans(0);
        for (l, r) in pans {
            assert!((l - r).abs() < 1e-9);
        }
    }

    #[test]
    fn sample_at_treats_empty_sample_as_silence() {
        let data = [1i8, 2, 3];
        assert_eq!(sample_at(&data, crate::channel::EMPTY_SAMPLE, 0), 0);
        assert_eq!(sample_at(&data, 0, 2), 3);
    }

    #[test]
    fn mixing_silence_produces_silence() {
        let mut mixer = Mixer::new(48000);
        let mut voices: [PaulaVoice; AMIGA_VOICES] = Default::default();
        let mut out = [0i16; 20];
        mixer.mix(&mut voices, &[], &mut out, 10);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn center_panned_voice_stays_symmetric_through_the_whole_filter_chain() {
        // A center-panned voice feeds the low-pass filter identical L/R
        // input; if either channel skipped a filter stage the two outputs
        // would diverge even though nothing in the signal path is supposed
        // to distinguish L from R here.
        let mut mixer = Mixer::new(48000);
        let mut voices: [PaulaVoice; AMIGA_VOICES] = Default::default();
        voices[0].active = true;
        voices[0].data = 0;
        voices[0].length = 4;
        voices[0].new_length = 4;
        voices[0].d_volume = 1.0;
        voices[0].d_pan_l = 0.5;
        voices[0].d_pan_r = 0.5;

        let sample_data = [100i8, -100, 100, -100];
        let mut out = [0i16; 40];
        mixer.mix(&mut voices, &sample_data, &mut out, 20);

        for j in 0..20 {
            assert_eq!(out[j * 2], out[j * 2 + 1], "channel {j} diverged under a center pan");
        }
        assert!(out.iter().any(|&s| s != 0), "expected audible output from a center-panned voice");
    }
}
