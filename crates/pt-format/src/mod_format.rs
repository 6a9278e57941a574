//! ProTracker 31-sample MOD parser.

use alloc::vec::Vec;
use arrayvec::{ArrayString, ArrayVec};

use pt_ir::{Cell, Module, Pattern, SampleSlot, EMPTY_SAMPLE, MAX_SAMPLES, ROWS_PER_PATTERN};

use crate::PtError;

const HEADER_LEN: usize = 1084;
const SAMPLE_HEADER_LEN: usize = 30;
const PATTERN_BYTES: usize = ROWS_PER_PATTERN * 4 * 4;
/// `MAX_SAMPLE_LEN` in bytes, halved to a word count for the loop-overflow check.
const MAX_SAMPLE_WORDS: u32 = 0xFFFF;

/// Load a 31-sample MOD file from raw bytes.
///
/// Ports `moduleInit`'s sanitization verbatim: zero loop length is forced
/// to one word, an overflowing loop either extends the sample length (if
/// it still fits) or is discarded back to a length-1 loop at offset 0, and
/// any non-looping sample has its first two bytes silenced to suppress the
/// replayer's characteristic click.
pub fn load_mod(data: &[u8]) -> Result<Module, PtError> {
    if data.len() < HEADER_LEN {
        return Err(PtError::UnexpectedEof);
    }

    let tag = &data[1080..1084];
    if !matches!(tag, b"M.K." | b"M!K!" | b"FLT4") {
        return Err(PtError::InvalidHeader);
    }

    let title = parse_string::<20>(&data[0..20]);

    let mut raw_headers: ArrayVec<(u32, u32, u32, i8, u8), MAX_SAMPLES> = ArrayVec::new();
    for i in 0..MAX_SAMPLES {
        let off = 20 + i * SAMPLE_HEADER_LEN;
        let h = &data[off..off + SAMPLE_HEADER_LEN];
        let length_words = u16::from_be_bytes([h[22], h[23]]) as u32;
        let finetune_nibble = h[24] & 0x0F;
        let finetune = if finetune_nibble > 7 {
            finetune_nibble as i8 - 16
        } else {
            finetune_nibble as i8
        };
        let volume = h[25].min(64);
        let loop_start_words = u16::from_be_bytes([h[26], h[27]]) as u32;
        let loop_len_words = u16::from_be_bytes([h[28], h[29]]) as u32;
        raw_headers.push((length_words, loop_start_words, loop_len_words, finetune, volume));
    }

    let song_length = data[950].clamp(1, 128);
    let mut order: ArrayVec<u8, 128> = ArrayVec::new();
    for i in 0..128 {
        order.push(data[952 + i]);
    }

    let num_patterns = order.iter().copied().max().unwrap_or(0) as usize + 1;
    let patterns_end = HEADER_LEN + num_patterns * PATTERN_BYTES;
    if data.len() < patterns_end {
        return Err(PtError::TruncatedData);
    }

    let mut patterns = Vec::with_capacity(num_patterns);
    for p in 0..num_patterns {
        let start = HEADER_LEN + p * PATTERN_BYTES;
        patterns.push(parse_pattern(&data[start..start + PATTERN_BYTES]));
    }

    // Sanitize loop bounds and compute each slot's (offset, length) in bytes,
    // exactly mirroring moduleInit's overflow/zero-loop handling (word units
    // throughout; converted to bytes only when stored).
    let mut samples: ArrayVec<SampleSlot, MAX_SAMPLES> = ArrayVec::new();
    let mut cursor: u32 = 0;
    let mut names: ArrayVec<ArrayString<22>, MAX_SAMPLES> = ArrayVec::new();
    for i in 0..MAX_SAMPLES {
        let name_off = 20 + i * SAMPLE_HEADER_LEN;
        names.push(parse_string::<22>(&data[name_off..name_off + 22]));
    }

    for (i, &(mut length_w, mut loop_start_w, mut loop_len_w, finetune, volume)) in
        raw_headers.iter().enumerate()
    {
        // `moduleInit` decides EmptySample from the *raw* length word, before
        // the loop-overflow sanitization below can inflate it.
        let raw_length_zero = length_w == 0;

        if loop_len_w == 0 {
            loop_len_w = 1;
        }
        if loop_len_w > 1 && loop_start_w + loop_len_w > length_w {
            let overflow = (loop_start_w + loop_len_w) - length_w;
            if length_w + overflow <= MAX_SAMPLE_WORDS {
                length_w += overflow;
            } else {
                loop_start_w = 0;
                loop_len_w = 2;
            }
        }

        let length_bytes = length_w * 2;
        let offset = if raw_length_zero { EMPTY_SAMPLE } else { cursor };
        samples.push(SampleSlot {
            name: names[i].clone(),
            offset,
            length: length_bytes,
            finetune,
            volume,
            loop_start: loop_start_w * 2,
            loop_length: loop_len_w * 2,
        });
        if !raw_length_zero {
            cursor += length_bytes;
        }
    }

    let sample_data_start = patterns_end;
    let sample_data_end = sample_data_start + cursor as usize;
    if data.len() < sample_data_end {
        return Err(PtError::TruncatedData);
    }
    let mut sample_data: Vec<i8> = data[sample_data_start..sample_data_end]
        .iter()
        .map(|&b| b as i8)
        .collect();

    for slot in &samples {
        if slot.length >= 1 && (slot.loop_start + slot.loop_length) <= 2 {
            let start = slot.offset as usize;
            if start + 1 < sample_data.len() {
                sample_data[start] = 0;
                sample_data[start + 1] = 0;
            } else if start < sample_data.len() {
                sample_data[start] = 0;
            }
        }
    }

    Ok(Module {
        title,
        samples,
        order,
        song_length,
        restart_pos: data[951],
        patterns,
        sample_data,
    })
}

fn parse_string<const N: usize>(data: &[u8]) -> ArrayString<N> {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    let mut out = ArrayString::new();
    for &b in &data[..end] {
        let c = if b.is_ascii_graphic() || b == b' ' {
            b as char
        } else {
            ' '
        };
        let _ = out.try_push(c);
    }
    out
}

fn parse_pattern(data: &[u8]) -> Pattern {
    let mut pattern = Pattern::new(ROWS_PER_PATTERN);
    for row in 0..ROWS_PER_PATTERN {
        for ch in 0..4 {
            let off = (row * 4 + ch) * 4;
            let raw = [data[off], data[off + 1], data[off + 2], data[off + 3]];
            *pattern.cell_mut(row, ch) = Cell::from_bytes(raw);
        }
    }
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_mod() -> Vec<u8> {
        let mut buf = alloc::vec![0u8; HEADER_LEN];
        buf[0..9].copy_from_slice(b"test song");
        // one sample, no loop, length 2 words
        let hdr_off = 20;
        buf[hdr_off..hdr_off + 22].copy_from_slice(b"sample one\0\0\0\0\0\0\0\0\0\0\0\0");
        buf[hdr_off + 22] = 0x00;
        buf[hdr_off + 23] = 0x02; // length = 2 words = 4 bytes
        buf[hdr_off + 25] = 64; // volume
        buf[950] = 1; // song length
        buf[952] = 0; // order[0] = pattern 0
        buf[1080..1084].copy_from_slice(b"M.K.");
        // one pattern of zeroed cells
        buf.extend(alloc::vec![0u8; PATTERN_BYTES]);
        // sample data: 4 bytes
        buf.extend([1i8 as u8, 2, 3, 4]);
        buf
    }

    #[test]
    fn loads_minimal_module() {
        let module = load_mod(&minimal_mod()).unwrap();
        assert_eq!(module.song_length, 1);
        assert_eq!(module.patterns.len(), 1);
        assert_eq!(module.samples[0].length, 4);
        // click-suppression should have zeroed the first two bytes (no loop).
        assert_eq!(module.sample_bytes(0)[0], 0);
        assert_eq!(module.sample_bytes(0)[1], 0);
        assert_eq!(module.sample_bytes(0)[2], 3);
    }

    #[test]
    fn rejects_short_buffers() {
        assert_eq!(load_mod(&[0u8; 10]), Err(PtError::UnexpectedEof));
    }

    #[test]
    fn rejects_unknown_signature() {
        let mut buf = minimal_mod();
        buf[1080..1084].copy_from_slice(b"XXXX");
        assert_eq!(load_mod(&buf), Err(PtError::InvalidHeader));
    }

    #[test]
    fn loop_overflow_extends_length_when_it_fits() {
        let mut buf = minimal_mod();
        let hdr_off = 20;
        // length 10 words, loop start 8, loop length 4 -> overflow by 2 -> extend to 12
        buf[hdr_off + 22] = 0x00;
        buf[hdr_off + 23] = 10;
        buf[hdr_off + 26] = 0x00;
        buf[hdr_off + 27] = 8;
        buf[hdr_off + 28] = 0x00;
        buf[hdr_off + 29] = 4;
        // extend the sample data region to 12 words = 24 bytes
        buf.truncate(HEADER_LEN + PATTERN_BYTES);
        buf.extend(alloc::vec![0i8 as u8; 24]);
        let module = load_mod(&buf).unwrap();
        assert_eq!(module.samples[0].length, 24);
        assert_eq!(module.samples[0].loop_start, 16);
        assert_eq!(module.samples[0].loop_length, 8);
    }

    #[test]
    fn zero_loop_length_is_forced_to_one_word() {
        let buf = minimal_mod();
        let module = load_mod(&buf).unwrap();
        assert_eq!(module.samples[0].loop_length, 2);
    }

    #[test]
    fn zero_length_sample_gets_the_empty_sentinel_offset() {
        // `minimal_mod` only fills in the header for sample slot 0; every
        // other slot (including slot 1 here) has a raw length word of 0.
        let module = load_mod(&minimal_mod()).unwrap();
        assert_eq!(module.samples[1].length, 0);
        assert_eq!(module.samples[1].offset, pt_ir::EMPTY_SAMPLE);
        // and the real sample right after it must not have been pushed
        // forward to make room for the empty one.
        assert_eq!(module.samples[0].offset, 0);
    }
}
