//! PCM16 little-endian helpers shared by the engines.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Bytes per mono 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Decode raw little-endian 16-bit PCM into samples.
///
/// A trailing odd byte cannot form a sample and is dropped, the same way a
/// native decoder reading `len / 2` samples would.
#[cfg_attr(not(feature = "vosk"), allow(dead_code))]
pub fn decode_pcm16(data: &[u8]) -> Vec<i16> {
    let mut cursor = Cursor::new(data);
    let mut samples = Vec::with_capacity(data.len() / BYTES_PER_SAMPLE);

    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(sample);
    }

    samples
}

/// Number of whole samples in a chunk.
pub fn sample_count(data: &[u8]) -> usize {
    data.len() / BYTES_PER_SAMPLE
}

/// Number of samples in `duration_ms` of audio at `sample_rate`.
pub fn samples_for_ms(sample_rate: u32, duration_ms: u32) -> usize {
    (duration_ms as usize * sample_rate as usize) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_little_endian() {
        let data = [0x01, 0x00, 0xff, 0x7f, 0x00, 0x80];
        assert_eq!(decode_pcm16(&data), vec![1, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_odd_trailing_byte_dropped() {
        let data = [0x02, 0x00, 0x05];
        assert_eq!(decode_pcm16(&data), vec![2]);
        assert_eq!(sample_count(&data), 1);
    }

    #[test]
    fn test_samples_for_ms() {
        // 2 seconds at 16kHz
        assert_eq!(samples_for_ms(16000, 2000), 32000);
        assert_eq!(samples_for_ms(16000, 100), 1600);
    }
}
