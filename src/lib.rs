/// Market Feed - client-side codec for a compressed, length-prefixed
/// market data broadcast
///
/// Turns an arbitrarily chunked byte stream into discrete feed messages:
/// - Outer frame reassembly with byte-level resynchronization
/// - Per-frame zlib decompression
/// - Inner sub-message splitting (zero-copy)
/// - Binary market record decoding to `key=value|` text
/// - Request framing and composition for the outbound side
/// - Session orchestration, statistics and configuration

pub mod protocol;
pub mod compressor;
pub mod frame;
pub mod reassembly;
pub mod decoder;
pub mod request;
pub mod config;
pub mod session;
pub mod stats;
pub mod error;

pub use protocol::{FrameTag, RecordField};
pub use compressor::{CodecError, Compressor};
pub use frame::{FrameCodec, FrameError, OuterHeader, SubMessage, SubMessages};
pub use reassembly::{FrameOutcome, ReassemblyBuffer};
pub use decoder::{DecodeError, MarketDataRecord, MarketRecordDecoder};
pub use request::{Action, RequestError, TokenList, TokenRef, TouchlineMode};
pub use config::{ConfigError, SessionConfig};
pub use session::{FeedEvent, FeedHandler, FeedSession, SessionState, SharedFeedSession, Transport};
pub use stats::{FeedStats, LatencyStats};
pub use error::{FeedError, FeedResult};
