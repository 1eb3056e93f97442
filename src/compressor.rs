/// zlib codec applied to every outer frame payload
///
/// Stateless: each call builds its own deflate state, nothing is carried
/// between frames.

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("truncated compressed stream: consumed {consumed} of {len} bytes without reaching stream end")]
    Truncated { consumed: usize, len: usize },

    #[error("compression failed: {0}")]
    Compress(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// zlib compressor / decompressor
pub struct Compressor;

impl Compressor {
    /// Compress at the default level, producing a zlib-wrapped deflate stream
    pub fn compress(data: &[u8]) -> CodecResult<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), Compression::default());
        encoder
            .write_all(data)
            .map_err(|e| CodecError::Compress(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CodecError::Compress(e.to_string()))
    }

    /// Inverse of [`Compressor::compress`].
    ///
    /// The input must hold one complete zlib stream. Corrupt input, input
    /// that was never compressed, and streams cut short all fail.
    pub fn decompress(data: &[u8]) -> CodecResult<Vec<u8>> {
        let mut inflater = Decompress::new(true);
        let mut out = Vec::with_capacity(data.len().saturating_mul(4).max(64));

        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity());
            }

            let in_before = inflater.total_in();
            let out_before = inflater.total_out();
            let consumed = in_before as usize;

            let status = inflater
                .decompress_vec(&data[consumed..], &mut out, FlushDecompress::None)
                .map_err(|e| CodecError::Decompress(e.to_string()))?;

            match status {
                Status::StreamEnd => return Ok(out),
                Status::Ok | Status::BufError => {
                    let progressed =
                        inflater.total_in() != in_before || inflater.total_out() != out_before;
                    if !progressed {
                        return Err(CodecError::Truncated {
                            consumed: inflater.total_in() as usize,
                            len: data.len(),
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let text = b"63=FT3.0|64=101|65=74|66=10:15:00|67=TRADER|68=";
        let packed = Compressor::compress(text).unwrap();
        assert_eq!(Compressor::decompress(&packed).unwrap(), text.to_vec());
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let packed = Compressor::compress(b"").unwrap();
        assert!(!packed.is_empty());
        assert!(Compressor::decompress(&packed).unwrap().is_empty());
    }

    #[test]
    fn test_large_output_grows_buffer() {
        let text = vec![b'7'; 500_000];
        let packed = Compressor::compress(&text).unwrap();
        assert!(packed.len() < 10_000);
        assert_eq!(Compressor::decompress(&packed).unwrap(), text);
    }

    #[test]
    fn test_not_compressed() {
        let result = Compressor::decompress(b"plain text, never deflated");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(Compressor::decompress(&[]).is_err());
    }

    #[test]
    fn test_truncated_stream() {
        let text = b"1=1$7=22|1=1$7=2885|230=1".repeat(20);
        let packed = Compressor::compress(&text).unwrap();
        let cut = &packed[..packed.len() - 5];
        assert!(Compressor::decompress(cut).is_err());
    }
}
