/// Outer frame and inner sub-message codec
///
/// Outbound, a request is compressed and prefixed with a 6-byte outer header.
/// Inbound, a decompressed outer payload is split into its sub-messages.
/// Splitting borrows from the decompressed buffer, nothing is copied.

use crate::compressor::{CodecError, Compressor};
use crate::protocol::*;
use thiserror::Error;
use tracing::{trace, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload of {len} bytes exceeds the {max}-byte length field")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("empty sub-message cannot be framed")]
    EmptySubMessage,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type FrameResult<T> = Result<T, FrameError>;

/// Parsed 6-byte outer header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OuterHeader {
    pub tag: FrameTag,
    pub length: usize,
}

impl OuterHeader {
    /// Parse the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// `None` means the bytes cannot start a frame: short input, unknown tag,
    /// non-digit length or a zero length. The reassembly buffer resyncs on it.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        let tag = FrameTag::from_u8(bytes[0])?;
        let length = parse_length_digits(&bytes[1..HEADER_SIZE])?;
        if length == 0 {
            return None;
        }
        Some(OuterHeader { tag, length })
    }

    /// Render a compressed-tag header for a payload of `length` bytes
    pub fn encode(length: usize) -> FrameResult<[u8; HEADER_SIZE]> {
        let digits = write_length_digits(length).ok_or(FrameError::PayloadTooLarge {
            len: length,
            max: MAX_PAYLOAD_LEN,
        })?;
        let mut header = [0u8; HEADER_SIZE];
        header[0] = TAG_COMPRESSED;
        header[1..].copy_from_slice(&digits);
        Ok(header)
    }

    /// Header plus payload size
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.length
    }
}

/// One sub-message borrowed from a decompressed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMessage<'a> {
    /// Flag byte was the compressed tag. Informational only, the payload is
    /// already inflated by the time it is split.
    pub compressed: bool,
    pub payload: &'a [u8],
}

/// Iterator over the sub-messages of a decompressed payload
pub struct SubMessages<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for SubMessages<'a> {
    type Item = SubMessage<'a>;

    fn next(&mut self) -> Option<SubMessage<'a>> {
        let buf = self.remaining;
        if buf.len() < HEADER_SIZE {
            return None;
        }

        let length = match parse_length_digits(&buf[1..HEADER_SIZE]) {
            Some(len) if len > 0 => len,
            _ => {
                warn!(
                    discarded = buf.len(),
                    "malformed sub-message length, dropping rest of payload"
                );
                self.remaining = &[];
                return None;
            }
        };

        let available = buf.len() - HEADER_SIZE;
        let take = length.min(available);
        if take < length {
            warn!(declared = length, available, "sub-message truncated by end of payload");
        }

        let msg = SubMessage {
            compressed: buf[0] == TAG_COMPRESSED,
            payload: &buf[HEADER_SIZE..HEADER_SIZE + take],
        };
        self.remaining = &buf[HEADER_SIZE + take..];
        trace!(length = take, rest = self.remaining.len(), "sub-message");
        Some(msg)
    }
}

/// Outer frame / sub-message codec
pub struct FrameCodec;

impl FrameCodec {
    /// Compress `text` and prefix it with an outer header
    pub fn wrap(text: &[u8]) -> FrameResult<Vec<u8>> {
        let compressed = Compressor::compress(text)?;
        Self::frame_compressed(&compressed)
    }

    /// Prefix an already compressed payload with an outer header
    pub fn frame_compressed(compressed: &[u8]) -> FrameResult<Vec<u8>> {
        let header = OuterHeader::encode(compressed.len())?;
        let mut frame = Vec::with_capacity(HEADER_SIZE + compressed.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(compressed);
        Ok(frame)
    }

    /// Iterate the sub-messages of a decompressed payload in order
    pub fn sub_messages(decompressed: &[u8]) -> SubMessages<'_> {
        SubMessages {
            remaining: decompressed,
        }
    }

    /// Split a decompressed payload into sub-message payloads.
    ///
    /// Scanning stops at the first unparsable or zero length, or when fewer
    /// than [`HEADER_SIZE`] bytes remain. A final sub-message whose declared
    /// length runs past the payload is returned short.
    pub fn split(decompressed: &[u8]) -> Vec<&[u8]> {
        Self::sub_messages(decompressed).map(|m| m.payload).collect()
    }

    /// Concatenate sub-messages with their inner headers, the layout the
    /// server sends inside one outer frame.
    pub fn pack_sub_messages<T: AsRef<[u8]>>(parts: &[T]) -> FrameResult<Vec<u8>> {
        let total: usize = parts.iter().map(|p| HEADER_SIZE + p.as_ref().len()).sum();
        let mut out = Vec::with_capacity(total);
        for part in parts {
            let payload = part.as_ref();
            if payload.is_empty() {
                return Err(FrameError::EmptySubMessage);
            }
            let digits = write_length_digits(payload.len()).ok_or(FrameError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            })?;
            out.push(TAG_COMPRESSED);
            out.extend_from_slice(&digits);
            out.extend_from_slice(payload);
        }
        Ok(out)
    }

    /// Build a complete inbound outer frame carrying `parts`
    pub fn wrap_sub_messages<T: AsRef<[u8]>>(parts: &[T]) -> FrameResult<Vec<u8>> {
        let inner = Self::pack_sub_messages(parts)?;
        Self::wrap(&inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parse() {
        let hdr = OuterHeader::parse(&[5, b'0', b'0', b'1', b'2', b'3']).unwrap();
        assert_eq!(hdr.tag, FrameTag::Compressed);
        assert_eq!(hdr.length, 123);
        assert_eq!(hdr.frame_len(), 129);

        let hdr = OuterHeader::parse(&[2, b'9', b'9', b'9', b'9', b'9']).unwrap();
        assert_eq!(hdr.tag, FrameTag::Alternate);
        assert_eq!(hdr.length, MAX_PAYLOAD_LEN);
    }

    #[test]
    fn test_header_rejects() {
        assert_eq!(OuterHeader::parse(&[5, b'0', b'0', b'1']), None);
        assert_eq!(OuterHeader::parse(&[7, b'0', b'0', b'1', b'2', b'3']), None);
        assert_eq!(OuterHeader::parse(&[5, b'0', b'x', b'1', b'2', b'3']), None);
        assert_eq!(OuterHeader::parse(&[5, b'0', b'0', b'0', b'0', b'0']), None);
    }

    #[test]
    fn test_header_encode() {
        assert_eq!(OuterHeader::encode(87).unwrap(), [5, b'0', b'0', b'0', b'8', b'7']);
        assert_eq!(
            OuterHeader::encode(100_000),
            Err(FrameError::PayloadTooLarge { len: 100_000, max: 99_999 })
        );
    }

    #[test]
    fn test_wrap_layout() {
        let frame = FrameCodec::wrap(b"63=FT3.0|64=106|65=84|66=09:30:00|230=1").unwrap();
        let hdr = OuterHeader::parse(&frame).unwrap();
        assert_eq!(hdr.tag, FrameTag::Compressed);
        assert_eq!(hdr.frame_len(), frame.len());
    }

    #[test]
    fn test_split_multiple() {
        let inner = FrameCodec::pack_sub_messages(&[&b"8=100|"[..], b"8=101|", b"8=102|"]).unwrap();
        let parts = FrameCodec::split(&inner);
        assert_eq!(parts, vec![&b"8=100|"[..], b"8=101|", b"8=102|"]);
    }

    #[test]
    fn test_split_flag_byte() {
        let mut inner = vec![0u8, b'0', b'0', b'0', b'0', b'2', b'a', b'b'];
        inner.extend_from_slice(&[5, b'0', b'0', b'0', b'0', b'1', b'c']);
        let msgs: Vec<_> = FrameCodec::sub_messages(&inner).collect();
        assert_eq!(msgs.len(), 2);
        assert!(!msgs[0].compressed);
        assert_eq!(msgs[0].payload, b"ab");
        assert!(msgs[1].compressed);
        assert_eq!(msgs[1].payload, b"c");
    }

    #[test]
    fn test_split_stops_on_bad_length() {
        let mut inner = FrameCodec::pack_sub_messages(&[b"first"]).unwrap();
        inner.extend_from_slice(&[5, b'0', b'0', b'-', b'1', b'2']);
        inner.extend_from_slice(b"never reached");
        assert_eq!(FrameCodec::split(&inner), vec![&b"first"[..]]);
    }

    #[test]
    fn test_split_stops_on_zero_length() {
        let mut inner = vec![5, b'0', b'0', b'0', b'0', b'0'];
        inner.extend_from_slice(&FrameCodec::pack_sub_messages(&[b"hidden"]).unwrap());
        assert!(FrameCodec::split(&inner).is_empty());
    }

    #[test]
    fn test_split_short_tail_ignored() {
        let mut inner = FrameCodec::pack_sub_messages(&[b"only"]).unwrap();
        inner.extend_from_slice(&[5, b'0', b'0']);
        assert_eq!(FrameCodec::split(&inner), vec![&b"only"[..]]);
    }

    #[test]
    fn test_split_truncated_last() {
        let inner = [5, b'0', b'0', b'0', b'1', b'0', b'a', b'b', b'c'];
        assert_eq!(FrameCodec::split(&inner), vec![&b"abc"[..]]);
    }

    #[test]
    fn test_pack_rejects_empty() {
        assert_eq!(
            FrameCodec::pack_sub_messages(&[b"ok".to_vec(), Vec::new()]),
            Err(FrameError::EmptySubMessage)
        );
    }
}
