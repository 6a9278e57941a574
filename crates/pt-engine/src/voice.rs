//! Paula voice: one of the four hardware DMA channels being emulated.

/// One simulated Paula voice: period/volume/data/length, double-buffered
/// exactly like the hardware's pending-vs-current register pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct PaulaVoice {
    pub active: bool,
    /// Index into the module's concatenated sample byte buffer (current).
    pub data: u32,
    /// Length in bytes (current).
    pub length: i32,
    /// Pending data pointer, latched at start-dma or end-of-sample wrap.
    pub new_data: u32,
    /// Pending length, latched the same way.
    pub new_length: i32,
    pub pos: i32,
    pub d_volume: f64,
    pub d_delta: f64,
    pub d_phase: f64,
    pub d_pan_l: f64,
    pub d_pan_r: f64,
    /// 1.0 / d_delta, cached alongside it for the BLEP div-to-mul trick.
    pub d_delta_mul: f64,
    pub d_last_delta: f64,
    pub d_last_phase: f64,
    pub d_last_delta_mul: f64,
}

/// Caches the last realized period and its derived delta across *all four*
/// channels, not per-channel -- this reproduces a real quirk of the
/// reference replayer's `paulaSetPeriod`, where the cache is a single pair
/// of state variables shared process-wide. Setting the same period on two
/// different channels back to back reuses the cached delta rather than
/// recomputing it.
#[derive(Clone, Copy, Debug)]
pub struct PeriodCache {
    pub old_period: i32,
    pub d_old_voice_delta: f64,
    pub d_old_voice_delta_mul: f64,
}

impl Default for PeriodCache {
    fn default() -> Self {
        PeriodCache {
            old_period: -1,
            d_old_voice_delta: 0.0,
            d_old_voice_delta_mul: 0.0,
        }
    }
}

impl PaulaVoice {
    /// *set-data*: a null data pointer is represented by `None`, mapped by
    /// the caller onto a shared empty-sample region.
    pub fn set_data(&mut self, offset: u32) {
        self.new_data = offset;
    }

    /// *set-length*: `words` is converted to bytes (`<< 1`); the mixer
    /// works in bytes, not words.
    pub fn set_length(&mut self, words: u16) {
        self.new_length = (words as i32) << 1;
    }

    /// *set-period*: Δ = (PAULA_PAL_CLK / audioRate) / clamp(period). The
    /// realized period is clamped exactly as the hardware is observed to:
    /// 0 becomes 65536, anything below 113 clamps to 113 (required for
    /// stable BLEP synthesis).
    pub fn set_period(&mut self, cache: &mut PeriodCache, period_to_delta_div: f64, period: u16) {
        let real_period: i32 = if period == 0 {
            1 + 65535
        } else if period < 113 {
            113
        } else {
            period as i32
        };

        if real_period != cache.old_period {
            cache.old_period = real_period;
            cache.d_old_voice_delta = period_to_delta_div / real_period as f64;
            cache.d_old_voice_delta_mul = 1.0 / cache.d_old_voice_delta;
        }

        self.d_delta = cache.d_old_voice_delta;
        self.d_delta_mul = cache.d_old_voice_delta_mul;
        if self.d_last_delta == 0.0 {
            self.d_last_delta = self.d_delta;
        }
        if self.d_last_delta_mul == 0.0 {
            self.d_last_delta_mul = self.d_delta_mul;
        }
    }

    /// *set-volume*: masks to 7 bits, clamps to 64, then stores `v/64`.
    pub fn set_volume(&mut self, vol: u16) {
        let mut v = vol & 127;
        if v > 64 {
            v = 64;
        }
        self.d_volume = v as f64 * (1.0 / 64.0);
    }

    /// *start-dma*: resets phase/position to 0, latches pending data/length
    /// as current, and marks the voice active.
    pub fn start_dma(&mut self) {
        let length = if self.new_length < 2 { 2 } else { self.new_length };
        self.d_phase = 0.0;
        self.pos = 0;
        self.data = self.new_data;
        self.length = length;
        self.active = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_period_clamps_zero_to_65536() {
        let mut cache = PeriodCache::default();
        let mut voice = PaulaVoice::default();
        voice.set_period(&mut cache, 3_546_895.0, 0);
        assert_eq!(cache.old_period, 65536);
    }

    #[test]
    fn set_period_clamps_below_113() {
        let mut cache = PeriodCache::default();
        let mut voice = PaulaVoice::default();
        voice.set_period(&mut cache, 3_546_895.0, 50);
        assert_eq!(cache.old_period, 113);
    }

    #[test]
    fn shared_cache_reused_across_channels() {
        let mut cache = PeriodCache::default();
        let mut a = PaulaVoice::default();
        let mut b = PaulaVoice::default();
        a.set_period(&mut cache, 3_546_895.0, 428);
        let delta_after_a = cache.d_old_voice_delta;
        // Channel b requests the *same* period: the process-wide cache hit
        // means its delta matches a's without a fresh division.
        b.set_period(&mut cache, 3_546_895.0, 428);
        assert_eq!(b.d_delta, delta_after_a);
    }

    #[test]
    fn set_volume_masks_and_clamps() {
        let mut v = PaulaVoice::default();
        v.set_volume(200); // 200 & 127 = 72, clamped to 64
        assert_eq!(v.d_volume, 1.0);
    }
}
