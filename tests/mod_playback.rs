//! Integration test: build a MOD in memory, play it through `pt_engine`,
//! and check the output behaves like real playback (non-silent, bounded,
//! position advances, tempo effects change duration).

use pt_engine::{Player, TempoMode};
use pt_ir::Module;

const PATTERN_BYTES: usize = 64 * 4 * 4;

fn sample_header(buf: &mut [u8], index: usize, length_words: u16, loop_start_words: u16, loop_len_words: u16, volume: u8) {
    let off = 20 + index * 30;
    buf[off + 22..off + 24].copy_from_slice(&length_words.to_be_bytes());
    buf[off + 25] = volume;
    buf[off + 26..off + 28].copy_from_slice(&loop_start_words.to_be_bytes());
    buf[off + 28..off + 30].copy_from_slice(&loop_len_words.to_be_bytes());
}

/// One sample, one pattern: a note on row 0 of every channel, held via a
/// looped square wave for the rest of the pattern.
fn tone_module() -> Module {
    let mut buf = vec![0u8; 1084];
    buf[0..9].copy_from_slice(b"tone test");
    sample_header(&mut buf, 0, 64, 0, 64, 64);

    buf[950] = 1;
    buf[952] = 0;
    buf[1080..1084].copy_from_slice(b"M.K.");

    let mut pattern = vec![0u8; PATTERN_BYTES];
    for ch in 0..4usize {
        let off = ch * 4;
        pattern[off] = 0x01;
        pattern[off + 1] = 0xC8; // period 0xC8 -> audible mid-range note
    }
    buf.extend(pattern);

    let mut sample = vec![0u8; 128];
    for (i, b) in sample.iter_mut().enumerate() {
        *b = if i % 2 == 0 { 60 } else { 200 };
    }
    buf.extend(sample);

    pt_format::load_mod(&buf).expect("tone module should load")
}

/// Same as `tone_module`, but row 32 sets speed to 31 (an extreme slowdown)
/// via effect Fxy, so playing the whole pattern takes noticeably longer.
fn ritardando_module() -> Module {
    let mut buf = vec![0u8; 1084];
    buf[0..9].copy_from_slice(b"slow test");
    sample_header(&mut buf, 0, 64, 0, 64, 64);

    buf[950] = 1;
    buf[952] = 0;
    buf[1080..1084].copy_from_slice(b"M.K.");

    let mut pattern = vec![0u8; PATTERN_BYTES];
    let row0 = 0usize;
    pattern[row0 * 4 * 4] = 0x01;
    pattern[row0 * 4 * 4 + 1] = 0xC8;

    let row32 = 32usize;
    let off = (row32 * 4 + 0) * 4;
    pattern[off + 2] = 0x0F; // effect F
    pattern[off + 3] = 31; // speed 31 ticks/row
    buf.extend(pattern);

    let mut sample = vec![0u8; 128];
    for (i, b) in sample.iter_mut().enumerate() {
        *b = if i % 2 == 0 { 60 } else { 200 };
    }
    buf.extend(sample);

    pt_format::load_mod(&buf).expect("ritardando module should load")
}

fn has_nonsilent_samples(buf: &[i16]) -> bool {
    buf.iter().any(|&s| s != 0)
}

#[test]
fn tone_renders_nonsilent() {
    let mut player = Player::new(tone_module(), TempoMode::Cia, 44100);
    let mut buf = vec![0i16; 44100 * 2];
    player.fill_audio(&mut buf, 44100);
    assert!(has_nonsilent_samples(&buf), "expected audible output from a held note");
}

#[test]
fn zero_master_volume_silences_output() {
    let mut player = Player::new(tone_module(), TempoMode::Cia, 44100);
    player.set_master_vol(0);
    let mut buf = vec![0i16; 44100 * 2];
    player.fill_audio(&mut buf, 44100);
    assert!(!has_nonsilent_samples(&buf), "master volume 0 should mute all output");
}

#[test]
fn playback_advances_row_position() {
    let mut player = Player::new(tone_module(), TempoMode::Cia, 44100);
    let before = player.position();
    let mut buf = vec![0i16; 44100 * 2];
    player.fill_audio(&mut buf, 44100);
    let after = player.position();
    assert_ne!(before, after, "row/pattern position should advance after a second of playback");
}

/// A speed-31 row makes the back half of the pattern tick ~5x slower than
/// the default speed-6 front half, so the whole pattern should take
/// noticeably longer than 64 constant-speed rows would.
#[test]
fn set_speed_effect_slows_pattern_playback() {
    let mut slow = Player::new(ritardando_module(), TempoMode::Cia, 44100);
    let mut fast = Player::new(tone_module(), TempoMode::Cia, 44100);

    let mut buf = vec![0i16; 2];
    let mut slow_ticks = 0u32;
    let mut fast_ticks = 0u32;
    while slow.position().row < 63 && slow_ticks < 200_000 {
        slow.fill_audio(&mut buf, 1);
        slow_ticks += 1;
    }
    while fast.position().row < 63 && fast_ticks < 200_000 {
        fast.fill_audio(&mut buf, 1);
        fast_ticks += 1;
    }

    assert!(
        slow_ticks > fast_ticks * 2,
        "slow pattern ({} samples to reach row 63) should take much longer than fast pattern ({})",
        slow_ticks,
        fast_ticks
    );
}
