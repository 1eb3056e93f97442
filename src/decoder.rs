/// Market record decoder
///
/// Touchline responses requested in fixed-length native mode carry their
/// prices as a 64-byte binary record after a `|50=` marker. The decoder reads
/// the record straight from the sub-message bytes and re-renders the message
/// as plain `key=value|` text.

use crate::protocol::*;
use byteorder::{ByteOrder, LittleEndian};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::borrow::Cow;
use std::fmt::Write;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("market record truncated: need {need} bytes after marker, have {have}")]
    TruncatedRecord { need: usize, have: usize },

    #[error("time offset {0}s is outside the representable range")]
    InvalidTimestamp(i32),
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Decoded 64-byte market record. Prices are integers scaled by
/// `decimal_locator`, times are seconds from 1980-01-01.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarketDataRecord {
    pub market_segment_id: u32,
    pub token: u32,
    pub last_update_time: i32,
    pub last_trade_time: i32,
    pub last_traded_price: u32,
    pub buy_quantity: u32,
    pub buy_price: u32,
    pub sell_quantity: u32,
    pub sell_price: u32,
    pub open_price: u32,
    pub high_price: u32,
    pub low_price: u32,
    pub close_price: u32,
    pub decimal_locator: u32,
    pub previous_close_price: u32,
    pub indicative_close_price: u32,
}

impl MarketDataRecord {
    /// Parse the first [`RECORD_SIZE`] bytes of `buf`
    pub fn parse(buf: &[u8]) -> DecodeResult<Self> {
        if buf.len() < RECORD_SIZE {
            return Err(DecodeError::TruncatedRecord {
                need: RECORD_SIZE,
                have: buf.len(),
            });
        }

        let u = |f: RecordField| LittleEndian::read_u32(&buf[f.offset()..f.offset() + 4]);
        let i = |f: RecordField| LittleEndian::read_i32(&buf[f.offset()..f.offset() + 4]);

        Ok(MarketDataRecord {
            market_segment_id: u(RecordField::MarketSegmentId),
            token: u(RecordField::Token),
            last_update_time: i(RecordField::LastUpdateTime),
            last_trade_time: i(RecordField::LastTradeTime),
            last_traded_price: u(RecordField::LastTradedPrice),
            buy_quantity: u(RecordField::BuyQuantity),
            buy_price: u(RecordField::BuyPrice),
            sell_quantity: u(RecordField::SellQuantity),
            sell_price: u(RecordField::SellPrice),
            open_price: u(RecordField::OpenPrice),
            high_price: u(RecordField::HighPrice),
            low_price: u(RecordField::LowPrice),
            close_price: u(RecordField::ClosePrice),
            decimal_locator: u(RecordField::DecimalLocator),
            previous_close_price: u(RecordField::PreviousClosePrice),
            indicative_close_price: u(RecordField::IndicativeClosePrice),
        })
    }

    /// Wire layout of this record
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        for field in RecordField::ALL {
            let slot = &mut buf[field.offset()..field.offset() + 4];
            match field {
                RecordField::LastUpdateTime => LittleEndian::write_i32(slot, self.last_update_time),
                RecordField::LastTradeTime => LittleEndian::write_i32(slot, self.last_trade_time),
                _ => LittleEndian::write_u32(slot, self.unsigned(field)),
            }
        }
        buf
    }

    fn unsigned(&self, field: RecordField) -> u32 {
        match field {
            RecordField::MarketSegmentId => self.market_segment_id,
            RecordField::Token => self.token,
            RecordField::LastTradedPrice => self.last_traded_price,
            RecordField::BuyQuantity => self.buy_quantity,
            RecordField::BuyPrice => self.buy_price,
            RecordField::SellQuantity => self.sell_quantity,
            RecordField::SellPrice => self.sell_price,
            RecordField::OpenPrice => self.open_price,
            RecordField::HighPrice => self.high_price,
            RecordField::LowPrice => self.low_price,
            RecordField::ClosePrice => self.close_price,
            RecordField::DecimalLocator => self.decimal_locator,
            RecordField::PreviousClosePrice => self.previous_close_price,
            RecordField::IndicativeClosePrice => self.indicative_close_price,
            RecordField::LastUpdateTime => self.last_update_time as u32,
            RecordField::LastTradeTime => self.last_trade_time as u32,
        }
    }

    /// Append the `key=value|` rendering of every field, in wire order
    pub fn write_fields(&self, out: &mut String) -> DecodeResult<()> {
        for field in RecordField::ALL {
            let _ = match field {
                RecordField::LastUpdateTime => {
                    write!(out, "{}={}|", field.key(), format_feed_time(self.last_update_time)?)
                }
                RecordField::LastTradeTime => {
                    write!(out, "{}={}|", field.key(), format_feed_time(self.last_trade_time)?)
                }
                _ => write!(out, "{}={}|", field.key(), self.unsigned(field)),
            };
        }
        Ok(())
    }
}

fn feed_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(EPOCH_YEAR, 1, 1)?.and_hms_opt(0, 0, 0)
}

/// Render a seconds offset from the feed epoch as `YYYY-MM-DD HHMMSS`
pub fn format_feed_time(offset_secs: i32) -> DecodeResult<String> {
    let time = TimeDelta::try_seconds(i64::from(offset_secs))
        .and_then(|delta| feed_epoch()?.checked_add_signed(delta))
        .ok_or(DecodeError::InvalidTimestamp(offset_secs))?;
    Ok(time.format(TIME_FORMAT).to_string())
}

/// Rewrites sub-messages that embed a binary market record
#[derive(Debug, Clone, Copy)]
pub struct MarketRecordDecoder {
    marker: &'static [u8],
}

impl MarketRecordDecoder {
    pub fn new() -> Self {
        Self::with_marker(RECORD_MARKER)
    }

    pub fn with_marker(marker: &'static [u8]) -> Self {
        MarketRecordDecoder { marker }
    }

    pub fn marker(&self) -> &'static [u8] {
        self.marker
    }

    /// Byte offset of the first marker in `payload`
    pub fn find_marker(&self, payload: &[u8]) -> Option<usize> {
        if self.marker.is_empty() {
            return None;
        }
        payload
            .windows(self.marker.len())
            .position(|w| w == self.marker)
    }

    /// Decode a sub-message to text.
    ///
    /// Without a marker the payload is returned as text. With one, everything
    /// up to and including the marker's leading `|` is kept, and the rest is
    /// replaced by the rendered record. Invalid UTF-8 is dropped from the
    /// text; record offsets are taken from the raw bytes.
    pub fn decode<'a>(&self, payload: &'a [u8]) -> DecodeResult<Cow<'a, str>> {
        let Some(pos) = self.find_marker(payload) else {
            return Ok(utf8_dropping_invalid(payload));
        };

        let record_start = pos + self.marker.len();
        let record = MarketDataRecord::parse(&payload[record_start..])?;

        let mut text = utf8_dropping_invalid(&payload[..pos + 1]).into_owned();
        text.reserve(RECORD_SIZE * 3);
        record.write_fields(&mut text)?;
        Ok(Cow::Owned(text))
    }
}

/// Text of `bytes` with every invalid UTF-8 sequence removed. Borrows when
/// the input is already valid.
pub fn utf8_dropping_invalid(bytes: &[u8]) -> Cow<'_, str> {
    let mut rest = match std::str::from_utf8(bytes) {
        Ok(text) => return Cow::Borrowed(text),
        Err(_) => bytes,
    };

    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(rest) {
            Ok(text) => {
                out.push_str(text);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(bad) => rest = &after[bad..],
                    // incomplete sequence at the end
                    None => break,
                }
            }
        }
    }
    Cow::Owned(out)
}

impl Default for MarketRecordDecoder {
    fn default() -> Self {
        Self::new()
    }
}
