/// Request composition
///
/// Requests are `|`-separated `key=value` text. Every request opens with
/// `63=FT3.0|64=<code>|65=<sub code>|66=<HH:MM:SS>`. Building a request is
/// pure, the caller supplies the time stamp.

use chrono::NaiveTime;
use std::fmt::{self, Write};
use std::str::FromStr;
use thiserror::Error;

const PROTOCOL_VERSION: &str = "FT3.0";
const TIME_STAMP_FORMAT: &str = "%H:%M:%S";

const CODE_LOGIN: u16 = 101;
const CODE_PAUSE_RESUME: u16 = 106;
const CODE_BEST_FIVE: u16 = 127;
const CODE_TOUCHLINE: u16 = 206;
const CODE_LTP_TOUCHLINE: u16 = 347;

const SUB_CODE_LOGIN: u16 = 74;
const SUB_CODE_BROADCAST: u16 = 84;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Token list cannot be null or empty.")]
    EmptyTokenList,

    #[error("Invalid token format: '{0}'. Expected format: 'MarketSegmentID_Token'.")]
    InvalidToken(String),

    #[error("No valid tokens found to {0}.")]
    NoValidTokens(Action),

    #[error("Invalid MarketSegment.")]
    InvalidMarketSegment,
}

/// A scrip as `<market segment>_<token>`, e.g. `1_22`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenRef {
    pub market_segment_id: u32,
    pub token: u32,
}

impl TokenRef {
    pub fn new(market_segment_id: u32, token: u32) -> Self {
        TokenRef { market_segment_id, token }
    }
}

impl FromStr for TokenRef {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RequestError::InvalidToken(s.to_string());
        let (seg, token) = s.split_once('_').ok_or_else(invalid)?;
        if token.contains('_') {
            return Err(invalid());
        }
        Ok(TokenRef {
            market_segment_id: seg.trim().parse().map_err(|_| invalid())?,
            token: token.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Result of parsing a caller-supplied token list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenList {
    pub tokens: Vec<TokenRef>,
    /// Items that were neither blank nor valid
    pub rejected: Vec<RequestError>,
}

impl TokenList {
    /// Parse `items`, skipping blanks and collecting malformed entries
    pub fn parse<S: AsRef<str>>(items: &[S]) -> Result<Self, RequestError> {
        if items.is_empty() {
            return Err(RequestError::EmptyTokenList);
        }
        let mut list = TokenList::default();
        for item in items {
            let item = item.as_ref();
            if item.trim().is_empty() {
                continue;
            }
            match item.parse::<TokenRef>() {
                Ok(token) => list.tokens.push(token),
                Err(e) => list.rejected.push(e),
            }
        }
        Ok(list)
    }

    /// `1=<seg>$7=<token>|` per token
    fn render(&self, action: Action) -> Result<String, RequestError> {
        if self.tokens.is_empty() {
            return Err(RequestError::NoValidTokens(action));
        }
        let mut out = String::with_capacity(self.tokens.len() * 16);
        for t in &self.tokens {
            let _ = write!(out, "1={}$7={}|", t.market_segment_id, t.token);
        }
        Ok(out)
    }
}

/// Touchline response layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchlineMode {
    /// Plain text touchline
    #[default]
    Normal,
    /// Prices carried as a binary record after `|50=`
    FixedLengthNative,
}

/// Subscribe (230=1) or unsubscribe (230=2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Subscribe,
    Unsubscribe,
}

impl Action {
    fn code(self) -> u8 {
        match self {
            Action::Subscribe => 1,
            Action::Unsubscribe => 2,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Subscribe => f.write_str("subscribe"),
            Action::Unsubscribe => f.write_str("unsubscribe"),
        }
    }
}

fn header(code: u16, sub_code: u16, time: NaiveTime) -> String {
    format!(
        "63={}|64={}|65={}|66={}",
        PROTOCOL_VERSION,
        code,
        sub_code,
        time.format(TIME_STAMP_FORMAT)
    )
}

/// Login request. A blank API key is sent as an empty password.
pub fn login(user_id: &str, api_key: Option<&str>, time: NaiveTime) -> String {
    let password = match api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => format!("68={}|401=2", key),
        None => "68=".to_string(),
    };
    format!("{}|67={}|{}", header(CODE_LOGIN, SUB_CODE_LOGIN, time), user_id, password)
}

/// Touchline subscription
pub fn touchline_subscribe(
    tokens: &TokenList,
    mode: TouchlineMode,
    ltp_change_only: bool,
    time: NaiveTime,
) -> Result<String, RequestError> {
    let scrips = tokens.render(Action::Subscribe)?;
    let mut req = header(CODE_TOUCHLINE, SUB_CODE_BROADCAST, time);
    if mode == TouchlineMode::FixedLengthNative {
        req.push_str("|49=1");
    }
    let _ = write!(req, "|200={}|{}230=1", u8::from(ltp_change_only), scrips);
    Ok(req)
}

pub fn touchline_unsubscribe(tokens: &TokenList, time: NaiveTime) -> Result<String, RequestError> {
    let scrips = tokens.render(Action::Unsubscribe)?;
    Ok(format!(
        "{}|4=|{}230=2",
        header(CODE_TOUCHLINE, SUB_CODE_BROADCAST, time),
        scrips
    ))
}

/// LTP-only touchline subscribe / unsubscribe
pub fn ltp_touchline(tokens: &TokenList, action: Action, time: NaiveTime) -> Result<String, RequestError> {
    let scrips = tokens.render(action)?;
    Ok(format!(
        "{}|{}230={}",
        header(CODE_LTP_TOUCHLINE, SUB_CODE_BROADCAST, time),
        scrips,
        action.code()
    ))
}

/// Pause (230=1) or resume (230=2) the broadcast
pub fn pause_resume(pause: bool, time: NaiveTime) -> String {
    format!(
        "{}|230={}",
        header(CODE_PAUSE_RESUME, SUB_CODE_BROADCAST, time),
        if pause { 1 } else { 2 }
    )
}

/// Market depth (best five) for a single scrip
pub fn best_five(token: TokenRef, action: Action, time: NaiveTime) -> Result<String, RequestError> {
    if token.market_segment_id == 0 {
        return Err(RequestError::InvalidMarketSegment);
    }
    Ok(format!(
        "{}|1={}|7={}|230={}",
        header(CODE_BEST_FIVE, SUB_CODE_BROADCAST, time),
        token.market_segment_id,
        token.token,
        action.code()
    ))
}
