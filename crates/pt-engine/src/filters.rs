//! The Amiga's three fixed analog filters, modeled from real R/C component
//! values: a one-pole RC low-pass, a one-pole RC high-pass (built from the
//! low-pass), and a two-pole Sallen-Key "LED" filter with sigmoid feedback.

use core::f64::consts::PI;

/// One-pole RC filter, coefficients derived from sample rate and corner
/// frequency. Used directly for the low-pass; the high-pass subtracts its
/// output from the input.
#[derive(Clone, Copy, Debug, Default)]
pub struct RcFilter {
    pub buffer: [f64; 2],
    pub c: f64,
    pub c2: f64,
    pub g: f64,
    pub cg: f64,
}

impl RcFilter {
    pub fn with_coeffs(sample_rate: f64, hz: f64) -> RcFilter {
        let c = libm::tan((PI * hz) / sample_rate);
        let g = 1.0 / (1.0 + c);
        RcFilter {
            buffer: [0.0, 0.0],
            c,
            c2: c * 2.0,
            g,
            cg: c * g,
        }
    }

    fn lowpass_output(&self, input_0: f64, input_1: f64, buffer: f64) -> f64 {
        buffer * self.g + input_0 * self.cg + input_1 * (1.0 - self.cg)
    }

    pub fn low_pass(&mut self, input: [f64; 2]) -> [f64; 2] {
        let mut out = [0.0; 2];
        for ch in 0..2 {
            let output = self.lowpass_output(input[ch], 0.0, self.buffer[ch]);
            self.buffer[ch] += (input[ch] - output) * self.c2;
            out[ch] = output;
        }
        out
    }

    pub fn high_pass(&mut self, input: [f64; 2]) -> [f64; 2] {
        let low = self.low_pass(input);
        [input[0] - low[0], input[1] - low[1]]
    }
}

/// Two-pole Sallen-Key filter with sigmoid feedback, modeling the A500/A1200
/// "LED" filter. Only valid at the fixed cutoff/feedback it was derived for.
#[derive(Clone, Copy, Debug, Default)]
pub struct LedFilter {
    pub buffer: [f64; 4],
    pub c: f64,
    pub ci: f64,
    pub feedback: f64,
    pub bg: f64,
    pub cg: f64,
    pub c2: f64,
}

/// Small DC offset added to each stage to avoid denormal-induced slowdowns.
const DENORMAL_OFFSET: f64 = 1e-10;

fn sigmoid(x: f64, coefficient: f64) -> f64 {
    x / (x + coefficient) * (coefficient + 1.0)
}

impl LedFilter {
    pub fn with_coeffs(sample_rate: f64, hz: f64, fb: f64) -> LedFilter {
        let c = if hz < sample_rate / 2.0 {
            libm::tan((PI * hz) / sample_rate)
        } else {
            1.0
        };
        let g = 1.0 / (1.0 + c);

        let s = 0.5;
        let t = 0.5;
        let ic = if c > t { 1.0 / ((1.0 - s * t) + s * c) } else { 1.0 };
        let cg = c * g;
        let fbg = 1.0 / (1.0 + fb * cg * cg);

        LedFilter {
            buffer: [0.0; 4],
            c,
            ci: g,
            feedback: 2.0 * sigmoid(fb, 0.5),
            bg: fbg * 2.0 * sigmoid(fb, 0.5) * ic,
            cg,
            c2: c * 2.0,
        }
    }

    pub fn process(&mut self, input: [f64; 2]) -> [f64; 2] {
        let in1 = DENORMAL_OFFSET;
        let in2 = DENORMAL_OFFSET;

        let c = self.c;
        let g = self.ci;
        let cg = self.cg;
        let bg = self.bg;
        let c2 = self.c2;
        let v = &mut self.buffer;

        let estimate_l = in2 + g * (v[1] + c * (in1 + g * (v[0] + c * input[0])));
        let y0_l = v[0] * g + input[0] * cg + in1 + estimate_l * bg;
        let y1_l = v[1] * g + y0_l * cg + in2;
        v[0] += c2 * (input[0] - y0_l);
        v[1] += c2 * (y0_l - y1_l);

        let estimate_r = in2 + g * (v[3] + c * (in1 + g * (v[2] + c * input[1])));
        let y0_r = v[2] * g + input[1] * cg + in1 + estimate_r * bg;
        let y1_r = v[3] * g + y0_r * cg + in2;
        v[2] += c2 * (input[1] - y0_r);
        v[3] += c2 * (y0_r - y1_r);

        [y1_l, y1_r]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_pass_settles_to_dc_input() {
        let mut f = RcFilter::with_coeffs(48000.0, 4420.97);
        let mut out = [0.0, 0.0];
        for _ in 0..2000 {
            out = f.low_pass([1.0, 1.0]);
        }
        assert!((out[0] - 1.0).abs() < 0.01);
    }

    #[test]
    fn high_pass_blocks_dc() {
        let mut f = RcFilter::with_coeffs(48000.0, 5200.0);
        let mut out = [0.0, 0.0];
        for _ in 0..4000 {
            out = f.high_pass([1.0, 1.0]);
        }
        assert!(out[0].abs() < 0.01);
    }

    #[test]
    fn led_filter_is_stable_under_sustained_input() {
        let mut f = LedFilter::with_coeffs(48000.0, 3090.53, 0.125);
        let mut out = [0.0, 0.0];
        for _ in 0..4000 {
            out = f.process([0.5, -0.5]);
        }
        assert!(out[0].is_finite() && out[1].is_finite());
    }
}
