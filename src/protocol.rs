/// Wire format of the broadcast feed
///
/// Outer frame (one per transport write, zlib compressed payload):
///   - tag: u8 (1 byte) - 5 = compressed, 2 = also accepted on receipt
///   - length: 5 ASCII decimal digits - compressed payload length
///   - payload: `length` bytes
///
/// Inner sub-message (back to back inside a decompressed payload):
///   - flag: u8 (1 byte) - 5 = compressed marker, anything else = uncompressed
///   - length: 5 ASCII decimal digits - payload length
///   - payload: `length` bytes of `key=value|` text
///
/// A sub-message carrying `|50=` is followed by a 64-byte little-endian
/// market record, see [`MarketDataRecord`](crate::decoder::MarketDataRecord).

/// Size of both the outer and the inner header.
pub const HEADER_SIZE: usize = 6;

/// Number of ASCII digits carrying a length.
pub const LENGTH_DIGITS: usize = 5;

/// Largest length representable in [`LENGTH_DIGITS`] digits.
pub const MAX_PAYLOAD_LEN: usize = 99_999;

/// Tag byte for a compressed frame. Also the only value written on send.
pub const TAG_COMPRESSED: u8 = 5;

/// Second tag byte value accepted on receipt.
pub const TAG_ALTERNATE: u8 = 2;

/// Marker introducing a binary market record inside a sub-message.
pub const RECORD_MARKER: &[u8] = b"|50=";

/// Size of the binary market record following [`RECORD_MARKER`].
pub const RECORD_SIZE: usize = 64;

/// Exchange epoch for time fields: 1980-01-01T00:00:00.
pub const EPOCH_YEAR: i32 = 1980;

/// Rendering of time fields.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H%M%S";

/// Outer frame tag values
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    Compressed = TAG_COMPRESSED,
    Alternate = TAG_ALTERNATE,
}

impl FrameTag {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            TAG_COMPRESSED => Some(FrameTag::Compressed),
            TAG_ALTERNATE => Some(FrameTag::Alternate),
            _ => None,
        }
    }
}

/// Field keys used when rendering a market record, in wire order.
///
/// Each field is 4 bytes, little-endian, at `index * 4` from the start
/// of the record.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    MarketSegmentId = 1,
    Token = 7,
    LastUpdateTime = 74,
    LastTradeTime = 73,
    LastTradedPrice = 8,
    BuyQuantity = 2,
    BuyPrice = 3,
    SellQuantity = 5,
    SellPrice = 6,
    OpenPrice = 75,
    HighPrice = 77,
    LowPrice = 78,
    ClosePrice = 76,
    DecimalLocator = 399,
    PreviousClosePrice = 250,
    IndicativeClosePrice = 88,
}

impl RecordField {
    /// All fields in wire order
    pub const ALL: [RecordField; 16] = [
        RecordField::MarketSegmentId,
        RecordField::Token,
        RecordField::LastUpdateTime,
        RecordField::LastTradeTime,
        RecordField::LastTradedPrice,
        RecordField::BuyQuantity,
        RecordField::BuyPrice,
        RecordField::SellQuantity,
        RecordField::SellPrice,
        RecordField::OpenPrice,
        RecordField::HighPrice,
        RecordField::LowPrice,
        RecordField::ClosePrice,
        RecordField::DecimalLocator,
        RecordField::PreviousClosePrice,
        RecordField::IndicativeClosePrice,
    ];

    /// Feed key used in the `key=value|` rendering
    pub fn key(self) -> u16 {
        self as u16
    }

    /// Byte offset of this field inside the record
    pub fn offset(self) -> usize {
        let index = match self {
            RecordField::MarketSegmentId => 0,
            RecordField::Token => 1,
            RecordField::LastUpdateTime => 2,
            RecordField::LastTradeTime => 3,
            RecordField::LastTradedPrice => 4,
            RecordField::BuyQuantity => 5,
            RecordField::BuyPrice => 6,
            RecordField::SellQuantity => 7,
            RecordField::SellPrice => 8,
            RecordField::OpenPrice => 9,
            RecordField::HighPrice => 10,
            RecordField::LowPrice => 11,
            RecordField::ClosePrice => 12,
            RecordField::DecimalLocator => 13,
            RecordField::PreviousClosePrice => 14,
            RecordField::IndicativeClosePrice => 15,
        };
        index * 4
    }

    /// Signed seconds from the exchange epoch
    pub fn is_time(self) -> bool {
        matches!(self, RecordField::LastUpdateTime | RecordField::LastTradeTime)
    }
}

// Compile-time assertions for the record layout
const _: () = {
    assert!(RecordField::ALL.len() * 4 == RECORD_SIZE);
    assert!(HEADER_SIZE == 1 + LENGTH_DIGITS);
};

/// Parse exactly [`LENGTH_DIGITS`] ASCII decimal digits.
///
/// Returns `None` if the slice has the wrong size or contains anything other
/// than `b'0'..=b'9'`.
pub fn parse_length_digits(digits: &[u8]) -> Option<usize> {
    if digits.len() != LENGTH_DIGITS {
        return None;
    }
    digits.iter().try_fold(0usize, |acc, &b| {
        if b.is_ascii_digit() {
            Some(acc * 10 + usize::from(b - b'0'))
        } else {
            None
        }
    })
}

/// Render `len` as [`LENGTH_DIGITS`] zero-padded ASCII digits.
///
/// Returns `None` above [`MAX_PAYLOAD_LEN`].
pub fn write_length_digits(len: usize) -> Option<[u8; LENGTH_DIGITS]> {
    if len > MAX_PAYLOAD_LEN {
        return None;
    }
    let mut out = [b'0'; LENGTH_DIGITS];
    let mut rest = len;
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (rest % 10) as u8;
        rest /= 10;
    }
    Some(out)
}
