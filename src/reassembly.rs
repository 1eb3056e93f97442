/// Stream reassembly of outer frames
///
/// Transport reads arrive with arbitrary boundaries: a read may hold part of
/// a header, several frames back to back, or the tail of one frame and the
/// head of the next. `ReassemblyBuffer` accumulates reads and yields each
/// outer frame payload, inflated, exactly once when its last byte arrives.
///
/// Storage is a single `Vec<u8>` whose length is the write cursor. After each
/// scan the consumed prefix is dropped by moving the unconsumed tail to
/// offset 0, so storage only ever holds the current unparsed span.

use crate::compressor::{CodecError, Compressor};
use crate::frame::OuterHeader;
use crate::protocol::HEADER_SIZE;
use tracing::{debug, trace, warn};

pub const DEFAULT_CAPACITY: usize = 8192;

/// Storage is shrunk back once capacity exceeds the live span (or the initial
/// capacity) by this factor.
const SHRINK_FACTOR: usize = 4;

/// Result of one complete outer frame: the inflated payload, or the codec
/// failure for that frame alone.
pub type FrameOutcome = Result<Vec<u8>, CodecError>;

#[derive(Debug, Clone)]
pub struct ReassemblyBuffer {
    storage: Vec<u8>,
    initial_capacity: usize,
    skipped_bytes: u64,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ReassemblyBuffer {
            storage: Vec::with_capacity(capacity),
            initial_capacity: capacity,
            skipped_bytes: 0,
        }
    }

    /// Append `chunk` and return every outer frame it completes, in stream order.
    ///
    /// Bytes that cannot start a header are skipped one at a time. A frame
    /// that fails to inflate is returned as `Err` and parsing carries on
    /// with the next frame.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<FrameOutcome> {
        self.storage.extend_from_slice(chunk);

        let mut pos = 0;
        let mut frames = Vec::new();

        loop {
            let avail = &self.storage[pos..];
            if avail.len() < HEADER_SIZE {
                break;
            }

            let header = match OuterHeader::parse(avail) {
                Some(header) => header,
                None => {
                    trace!(byte = avail[0], offset = pos, "resync: skipping byte");
                    pos += 1;
                    self.skipped_bytes += 1;
                    continue;
                }
            };

            let frame_len = header.frame_len();
            if avail.len() < frame_len {
                trace!(need = frame_len, have = avail.len(), "incomplete frame");
                break;
            }

            let outcome = Compressor::decompress(&avail[HEADER_SIZE..frame_len]);
            match &outcome {
                Ok(payload) => {
                    trace!(compressed = header.length, inflated = payload.len(), "frame");
                }
                Err(e) => {
                    warn!(error = %e, length = header.length, "dropping undecodable frame");
                }
            }
            frames.push(outcome);
            pos += frame_len;
        }

        self.compact(pos);
        frames
    }

    /// Drop the first `consumed` bytes, keeping the unparsed tail at offset 0
    fn compact(&mut self, consumed: usize) {
        if consumed == 0 {
            return;
        }

        let len = self.storage.len();
        if consumed >= len {
            self.storage.clear();
        } else {
            self.storage.copy_within(consumed.., 0);
            self.storage.truncate(len - consumed);
        }

        let floor = self.storage.len().max(self.initial_capacity);
        if self.storage.capacity() > floor.saturating_mul(SHRINK_FACTOR) {
            self.storage.shrink_to(floor);
        }

        debug!(consumed, pending = self.storage.len(), "compacted reassembly buffer");
    }

    /// Bytes received but not yet part of a complete frame
    pub fn pending(&self) -> &[u8] {
        &self.storage
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Total bytes skipped while resynchronizing
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }

    /// Discard unparsed bytes. Counters are kept.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.storage.shrink_to(self.initial_capacity);
    }
}

impl Default for ReassemblyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameCodec;

    fn payloads(outcomes: Vec<FrameOutcome>) -> Vec<Vec<u8>> {
        outcomes.into_iter().map(|o| o.unwrap()).collect()
    }

    #[test]
    fn test_single_frame() {
        let mut buf = ReassemblyBuffer::new();
        let frame = FrameCodec::wrap(b"hello").unwrap();
        assert_eq!(payloads(buf.push(&frame)), vec![b"hello".to_vec()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_header_waits() {
        let mut buf = ReassemblyBuffer::new();
        let frame = FrameCodec::wrap(b"partial").unwrap();

        assert!(buf.push(&frame[..3]).is_empty());
        assert_eq!(buf.len(), 3);
        assert!(buf.push(&frame[3..HEADER_SIZE]).is_empty());
        assert_eq!(buf.len(), HEADER_SIZE);
        assert!(buf.push(&frame[HEADER_SIZE..frame.len() - 1]).is_empty());
        assert_eq!(payloads(buf.push(&frame[frame.len() - 1..])), vec![b"partial".to_vec()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_keeps_tail_after_frame() {
        let mut buf = ReassemblyBuffer::new();
        let a = FrameCodec::wrap(b"first").unwrap();
        let b = FrameCodec::wrap(b"second").unwrap();

        let mut stream = a.clone();
        stream.extend_from_slice(&b[..4]);
        assert_eq!(payloads(buf.push(&stream)), vec![b"first".to_vec()]);
        assert_eq!(buf.pending(), &b[..4]);

        assert_eq!(payloads(buf.push(&b[4..])), vec![b"second".to_vec()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_resync_skips_garbage() {
        let mut buf = ReassemblyBuffer::new();
        let mut stream = vec![0xFF, b'x', 9, 0];
        stream.extend_from_slice(&FrameCodec::wrap(b"after garbage").unwrap());

        assert_eq!(payloads(buf.push(&stream)), vec![b"after garbage".to_vec()]);
        assert_eq!(buf.skipped_bytes(), 4);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_error_does_not_poison() {
        let mut buf = ReassemblyBuffer::new();
        let mut stream = FrameCodec::frame_compressed(b"not zlib at all").unwrap();
        stream.extend_from_slice(&FrameCodec::wrap(b"still fine").unwrap());

        let outcomes = buf.push(&stream);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_err());
        assert_eq!(outcomes[1].as_deref().unwrap(), b"still fine");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_storage_shrinks_after_large_frame() {
        let mut buf = ReassemblyBuffer::with_capacity(64);
        let big: Vec<u8> = (0..90_000u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8).collect();
        let inner = FrameCodec::pack_sub_messages(&big.chunks(30_000).collect::<Vec<_>>()).unwrap();
        let frame = FrameCodec::wrap(&inner).unwrap();

        for chunk in frame.chunks(4096) {
            buf.push(chunk);
        }
        assert!(buf.is_empty());
        assert!(buf.capacity() <= 64 * SHRINK_FACTOR);
    }

    #[test]
    fn test_clear_discards_pending() {
        let mut buf = ReassemblyBuffer::new();
        let frame = FrameCodec::wrap(b"cancelled").unwrap();
        buf.push(&frame[..frame.len() - 2]);
        buf.clear();
        assert!(buf.is_empty());
        // the orphaned tail never forms a frame on its own
        assert!(buf.push(&frame[frame.len() - 2..]).is_empty());
    }
}
