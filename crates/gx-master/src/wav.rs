//! WAV encoding for 16-bit stereo PCM.

use gx_engine::Frame;
use std::io::Write;

const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * (BITS_PER_SAMPLE / 8);

/// Size of the RIFF, fmt and data chunk headers.
pub const HEADER_LEN: usize = 44;

/// Canonical 44-byte header for `frames` stereo frames.
pub fn wav_header(frames: usize, sample_rate: u32) -> [u8; HEADER_LEN] {
    let data_size = frames as u32 * BLOCK_ALIGN as u32;
    let mut h = [0u8; HEADER_LEN];

    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");

    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    h[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    h[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&(sample_rate * BLOCK_ALIGN as u32).to_le_bytes());
    h[32..34].copy_from_slice(&BLOCK_ALIGN.to_le_bytes());
    h[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_size.to_le_bytes());
    h
}

pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> std::io::Result<()> {
    w.write_all(&wav_header(frames.len(), sample_rate))?;
    for frame in frames {
        w.write_all(&frame.left.to_le_bytes())?;
        w.write_all(&frame.right.to_le_bytes())?;
    }
    Ok(())
}

pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + frames.len() * BLOCK_ALIGN as usize);
    buf.extend_from_slice(&wav_header(frames.len(), sample_rate));
    for frame in frames {
        buf.extend_from_slice(&frame.left.to_le_bytes());
        buf.extend_from_slice(&frame.right.to_le_bytes());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(b: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
    }

    #[test]
    fn header_describes_stereo_16bit() {
        let h = wav_header(100, 44100);
        assert_eq!(&h[0..4], b"RIFF");
        assert_eq!(u32_at(&h, 4), 36 + 400);
        assert_eq!(u32_at(&h, 24), 44100);
        assert_eq!(u32_at(&h, 28), 44100 * 4);
        assert_eq!(u32_at(&h, 40), 400);
    }

    #[test]
    fn samples_are_interleaved_little_endian() {
        let frames = [Frame { left: 1, right: -2 }, Frame::mono(0x1234)];
        let wav = frames_to_wav(&frames, 8000);
        assert_eq!(wav.len(), HEADER_LEN + 8);
        assert_eq!(&wav[44..52], &[1, 0, 0xfe, 0xff, 0x34, 0x12, 0x34, 0x12]);

        let mut streamed = Vec::new();
        write_wav(&mut streamed, &frames, 8000).unwrap();
        assert_eq!(streamed, wav);
    }
}
