//! Plays a MOD file through the default audio device, or writes to WAV,
//! talking directly to pt-format/pt-engine/pt-audio instead of going
//! through pt-master's `Controller`.
//!
//! Usage:
//!   cargo run --example play_mod -- path/to/file.mod
//!   cargo run --example play_mod -- path/to/file.mod --wav output.wav

use pt_audio::{AudioOutput, CpalOutput};
use pt_engine::{Player, TempoMode};
use pt_format::load_mod;
use pt_ir::Module;
use std::io::Write;
use std::{env, fs};

fn main() {
    let args: Vec<String> = env::args().collect();
    let path = args.get(1).unwrap_or_else(|| {
        eprintln!("Usage: play_mod <file.mod> [--wav output.wav]");
        std::process::exit(1);
    });

    let wav_path = args
        .iter()
        .position(|a| a == "--wav")
        .and_then(|i| args.get(i + 1))
        .cloned();

    let data = fs::read(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path, e);
        std::process::exit(1);
    });

    let module = load_mod(&data).unwrap_or_else(|e| {
        eprintln!("Failed to parse MOD: {:?}", e);
        std::process::exit(1);
    });

    println!("Title:    {}", module.title);
    println!("Patterns: {}", module.patterns.len());
    println!("Orders:   {}", module.song_length);

    let samples_with_data = module.samples.iter().filter(|s| s.length > 0).count();
    println!("Samples:  {} (with data)", samples_with_data);
    println!();

    match wav_path {
        Some(wav) => render_to_wav(module, &wav),
        None => play_audio(module),
    }
}

fn play_audio(module: Module) {
    let (mut output, consumer) = CpalOutput::new().unwrap_or_else(|e| {
        eprintln!("Failed to initialize audio: {}", e);
        std::process::exit(1);
    });

    let sample_rate = output.sample_rate();
    println!("Sample rate: {} Hz", sample_rate);

    let mut player = Player::new(module, TempoMode::Cia, sample_rate);

    output.build_stream(consumer).unwrap_or_else(|e| {
        eprintln!("Failed to start audio stream: {}", e);
        std::process::exit(1);
    });
    output.start().unwrap();

    println!("Playing... (Ctrl-C to stop)");
    println!();

    const CHUNK_FRAMES: usize = 512;
    let mut chunk = vec![0i16; CHUNK_FRAMES * 2];
    let print_interval = sample_rate as u64 / CHUNK_FRAMES as u64 / 10;
    let mut chunk_count: u64 = 0;

    loop {
        player.fill_audio(&mut chunk, CHUNK_FRAMES);
        let _ = output.write(&chunk);

        chunk_count += 1;
        if print_interval > 0 && chunk_count % print_interval == 0 {
            let pos = player.position();
            print!(
                "\rOrd: {:02X} | Pat: {:02X} | Row: {:02X}",
                pos.order_index, pos.pattern_index, pos.row
            );
            let _ = std::io::stdout().flush();
        }
    }
}

fn render_to_wav(module: Module, path: &str) {
    let sample_rate: u32 = 44100;
    let max_seconds: u32 = 300;
    let mut player = Player::new(module, TempoMode::Cia, sample_rate);

    println!("Rendering {} seconds to {} at {} Hz...", max_seconds, path, sample_rate);

    let mut samples = vec![0i16; sample_rate as usize * max_seconds as usize * 2];
    player.fill_audio(&mut samples, sample_rate as usize * max_seconds as usize);

    println!("Rendered {} frames ({}s)", samples.len() / 2, max_seconds);

    let file = fs::File::create(path).unwrap_or_else(|e| {
        eprintln!("Failed to create {}: {}", path, e);
        std::process::exit(1);
    });
    let mut writer = std::io::BufWriter::new(file);

    write_wav(&mut writer, &samples, sample_rate).unwrap_or_else(|e| {
        eprintln!("Failed to write WAV: {}", e);
        std::process::exit(1);
    });

    println!("Done.");
}

fn write_wav(w: &mut impl Write, samples: &[i16], sample_rate: u32) -> std::io::Result<()> {
    let num_channels: u16 = 2;
    let bits_per_sample: u16 = 16;
    let bytes_per_sample = bits_per_sample / 8;
    let block_align = num_channels * bytes_per_sample;
    let data_size = samples.len() as u32 * bytes_per_sample as u32;
    let file_size = 36 + data_size;

    w.write_all(b"RIFF")?;
    w.write_all(&file_size.to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&num_channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&bits_per_sample.to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for sample in samples {
        w.write_all(&sample.to_le_bytes())?;
    }

    Ok(())
}
