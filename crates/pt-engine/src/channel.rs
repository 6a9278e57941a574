//! Per-channel replayer state: one instance per Paula voice, mutated
//! exclusively by the tick scheduler (never by the mixer).

/// Sentinel sample-data offset meaning "the shared empty/zero buffer",
/// mirroring the reference's `EmptySample` pointer.
pub const EMPTY_SAMPLE: u32 = u32::MAX;

/// Size of [`ChannelState::ks_scratch`], the private working buffer the
/// `karplus_strong` feature smooths into when a channel has no loop region
/// to persist into (see `Replayer::karplus_strong`).
pub const KS_SCRATCH_LEN: usize = 128;

#[derive(Clone, Copy, Debug)]
pub struct ChannelState {
    pub chan_index: u8,

    /// Byte offset of this channel's current sample start, or `EMPTY_SAMPLE`.
    pub n_start: u32,
    /// Byte offset of the funk/Karplus-Strong wave write cursor.
    pub n_wavestart: u32,
    /// Byte offset of the loop start, or `EMPTY_SAMPLE` if there is none.
    pub n_loopstart: u32,

    pub n_volume: i16,
    pub n_toneportdirec: i8,
    pub n_pattpos: u8,
    pub n_loopcount: u8,

    pub n_wavecontrol: u8,
    pub n_glissfunk: u8,
    pub n_sampleoffset: u8,
    pub n_toneportspeed: u8,
    pub n_vibratocmd: u8,
    pub n_tremolocmd: u8,
    pub n_finetune: u8,
    pub n_funkoffset: u8,
    pub n_vibratopos: u8,
    pub n_tremolopos: u8,

    pub n_period: u16,
    /// Raw note+sample word read from the pattern cell (`0` means none).
    pub n_note: u16,
    pub n_wantedperiod: u16,

    /// Raw command word: high byte is the effect nibble and low byte is
    /// the parameter, i.e. `(cmd_nibble << 8) | param`.
    pub n_cmd: u16,
    pub n_length: u16,
    pub n_replen: u16,

    /// Private Karplus-Strong working buffer, used only when this channel
    /// has no loop region (`n_loopstart == EMPTY_SAMPLE`) to smooth instead
    /// of the shared empty-sample buffer.
    #[cfg(feature = "karplus_strong")]
    pub ks_scratch: [i8; KS_SCRATCH_LEN],
}

impl Default for ChannelState {
    fn default() -> Self {
        ChannelState {
            chan_index: 0,
            n_start: EMPTY_SAMPLE,
            n_wavestart: EMPTY_SAMPLE,
            n_loopstart: EMPTY_SAMPLE,
            n_volume: 0,
            n_toneportdirec: 0,
            n_pattpos: 0,
            n_loopcount: 0,
            n_wavecontrol: 0,
            n_glissfunk: 0,
            n_sampleoffset: 0,
            n_toneportspeed: 0,
            n_vibratocmd: 0,
            n_tremolocmd: 0,
            n_finetune: 0,
            n_funkoffset: 0,
            n_vibratopos: 0,
            n_tremolopos: 0,
            n_period: 0,
            n_note: 0,
            n_wantedperiod: 0,
            n_cmd: 0,
            n_length: 0,
            n_replen: 0,
            #[cfg(feature = "karplus_strong")]
            ks_scratch: [0; KS_SCRATCH_LEN],
        }
    }
}

impl ChannelState {
    pub fn new(index: u8) -> ChannelState {
        ChannelState {
            chan_index: index,
            ..Default::default()
        }
    }
}
