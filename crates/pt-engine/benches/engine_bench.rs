use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pt_engine::{Player, TempoMode};
use pt_ir::Module;

const PATTERN_BYTES: usize = 64 * 4 * 4;

/// A two-channel module: one sample, one pattern with a note on every row
/// of channels 0/1 and a vibrato effect, looping forever through a single
/// order entry -- enough sustained voice activity to make mixing cost
/// representative.
fn bench_module() -> Module {
    let mut buf = vec![0u8; 1084];
    buf[0..9].copy_from_slice(b"bench mod");

    let hdr_off = 20;
    buf[hdr_off + 22] = 0x00;
    buf[hdr_off + 23] = 64; // length = 64 words = 128 bytes
    buf[hdr_off + 25] = 64; // volume
    buf[hdr_off + 26] = 0x00;
    buf[hdr_off + 27] = 0; // loop start
    buf[hdr_off + 28] = 0x00;
    buf[hdr_off + 29] = 64; // loop length = 64 words

    buf[950] = 1; // song length
    buf[952] = 0; // order[0] = pattern 0
    buf[1080..1084].copy_from_slice(b"M.K.");

    let mut pattern = vec![0u8; PATTERN_BYTES];
    for row in 0..64usize {
        for ch in 0..2usize {
            let off = (row * 4 + ch) * 4;
            pattern[off] = 0x01; // sample 1, period hi nibble 0
            pattern[off + 1] = 0xA4; // period 0x1A4 (note A-3ish)
            pattern[off + 2] = 0x04; // effect 4 = vibrato
            pattern[off + 3] = 0x42;
        }
    }
    buf.extend(pattern);

    let mut sample = vec![0u8; 128];
    for (i, b) in sample.iter_mut().enumerate() {
        *b = if i % 2 == 0 { 64 } else { 192 }; // square wave, as u8
    }
    buf.extend(sample);

    pt_format::load_mod(&buf).expect("bench module should load")
}

fn fill_audio_benchmark(c: &mut Criterion) {
    let mut player = Player::new(bench_module(), TempoMode::Cia, 48000);
    let mut buf = [0i16; 2 * 4096];

    c.bench_function("fill_audio_4096_frames_48k", |b| {
        b.iter(|| {
            player.fill_audio(black_box(&mut buf), 4096);
        });
    });
}

criterion_group!(benches, fill_audio_benchmark);
criterion_main!(benches);
