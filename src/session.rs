/// Feed session: glues the transport to the decode pipeline
///
/// Inbound, every transport chunk goes through
/// `ReassemblyBuffer::push -> FrameCodec::split -> MarketRecordDecoder::decode`
/// and each resulting message is handed to the [`FeedHandler`] in stream order.
/// Outbound, request text is framed with [`FrameCodec::wrap`] and given to the
/// [`Transport`].
///
/// A session has a single writer. When several threads feed one stream,
/// use [`SharedFeedSession`], which puts the inbound path behind one lock.

use crate::config::SessionConfig;
use crate::decoder::MarketRecordDecoder;
use crate::error::{FeedError, FeedResult};
use crate::frame::FrameCodec;
use crate::reassembly::ReassemblyBuffer;
use crate::request::{self, Action, RequestError, TokenList, TokenRef, TouchlineMode};
use crate::stats::FeedStats;
use chrono::{Local, NaiveTime};
use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Session cancelled by its owner
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Outbound half of the connection.
///
/// Implementations must serialize concurrent sends themselves.
pub trait Transport {
    fn send(&self, frame: &[u8]) -> FeedResult<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, frame: &[u8]) -> FeedResult<()> {
        (**self).send(frame)
    }
}

/// Frames are forwarded to whoever owns the receiving end, typically a
/// socket writer task.
impl Transport for Sender<Vec<u8>> {
    fn send(&self, frame: &[u8]) -> FeedResult<()> {
        Sender::send(self, frame.to_vec()).map_err(|e| FeedError::Transport(e.to_string()))
    }
}

/// Session notifications as values, for callers that drive their own loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Opened,
    Message(String),
    Error(String),
    Closed { code: u16, reason: String },
}

/// Receives session notifications
pub trait FeedHandler {
    fn on_open(&mut self) {}

    fn on_message(&mut self, message: String);

    fn on_error(&mut self, _error: String) {}

    fn on_close(&mut self, _code: u16, _reason: &str) {}
}

impl FeedHandler for Sender<FeedEvent> {
    fn on_open(&mut self) {
        let _ = self.send(FeedEvent::Opened);
    }

    fn on_message(&mut self, message: String) {
        if self.send(FeedEvent::Message(message)).is_err() {
            debug!("event receiver dropped, message discarded");
        }
    }

    fn on_error(&mut self, error: String) {
        let _ = self.send(FeedEvent::Error(error));
    }

    fn on_close(&mut self, code: u16, reason: &str) {
        let _ = self.send(FeedEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }
}

/// Collects events in order
impl FeedHandler for Vec<FeedEvent> {
    fn on_open(&mut self) {
        self.push(FeedEvent::Opened);
    }

    fn on_message(&mut self, message: String) {
        self.push(FeedEvent::Message(message));
    }

    fn on_error(&mut self, error: String) {
        self.push(FeedEvent::Error(error));
    }

    fn on_close(&mut self, code: u16, reason: &str) {
        self.push(FeedEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Open,
    Closed,
}

pub struct FeedSession<T, H> {
    config: SessionConfig,
    transport: T,
    handler: H,
    buffer: ReassemblyBuffer,
    decoder: MarketRecordDecoder,
    stats: FeedStats,
    state: SessionState,
}

impl<T: Transport, H: FeedHandler> FeedSession<T, H> {
    pub fn new(config: SessionConfig, transport: T, handler: H) -> FeedResult<Self> {
        config.validate()?;
        Ok(FeedSession {
            buffer: ReassemblyBuffer::with_capacity(config.receive_buffer_size),
            config,
            transport,
            handler,
            decoder: MarketRecordDecoder::new(),
            stats: FeedStats::new(),
            state: SessionState::Idle,
        })
    }

    /// Log in and mark the session open. `on_open` fires after the login
    /// request has been handed to the transport.
    pub fn open(&mut self) -> FeedResult<()> {
        if self.state == SessionState::Closed {
            return Err(FeedError::NotConnected);
        }
        let login = request::login(&self.config.user_id, self.config.api_key(), now());
        if let Err(e) = self.transmit(&login) {
            warn!(error = %e, url = %self.config.url(), "login failed");
            self.handler.on_error(format!("Connection failed: {}", e));
            return Err(e);
        }
        self.state = SessionState::Open;
        info!(url = %self.config.url(), user = %self.config.user_id, "feed session open");
        self.handler.on_open();
        Ok(())
    }

    /// Feed one inbound transport chunk through the pipeline.
    ///
    /// Ignored once the session is closed.
    pub fn on_chunk(&mut self, chunk: &[u8]) {
        if self.state == SessionState::Closed {
            debug!(len = chunk.len(), "chunk after close ignored");
            return;
        }

        let started = Instant::now();
        self.stats.record_chunk(chunk.len());

        let skipped_before = self.buffer.skipped_bytes();
        let frames = self.buffer.push(chunk);
        self.stats.record_resync(self.buffer.skipped_bytes() - skipped_before);
        self.stats.record_frames(frames.len());

        for frame in frames {
            let payload = match frame {
                Ok(payload) => payload,
                Err(e) => {
                    self.stats.record_codec_error();
                    self.handler.on_error(FeedError::from(e).to_string());
                    continue;
                }
            };

            for sub in FrameCodec::split(&payload) {
                match self.decoder.decode(sub) {
                    Ok(text) => {
                        self.stats.record_message();
                        self.handler.on_message(text.into_owned());
                    }
                    Err(e) => {
                        warn!(error = %e, len = sub.len(), "dropping undecodable sub-message");
                        self.stats.record_decode_error();
                        self.handler.on_error(FeedError::from(e).to_string());
                    }
                }
            }
        }

        self.stats
            .record_chunk_latency(started.elapsed().as_micros() as u64);
    }

    /// Frame `text` and send it. Failures are also reported through
    /// `on_error`.
    pub fn send_message(&mut self, text: &str) -> FeedResult<()> {
        self.transmit(text).map_err(|e| {
            self.handler.on_error(e.to_string());
            e
        })
    }

    fn transmit(&self, text: &str) -> FeedResult<()> {
        if self.state == SessionState::Closed {
            return Err(FeedError::NotConnected);
        }
        debug!(request = text, "sending");
        let frame = FrameCodec::wrap(text.as_bytes())?;
        self.transport.send(&frame)
    }

    /// Touchline subscription for `"<segment>_<token>"` items
    pub fn subscribe_touchline<S: AsRef<str>>(
        &mut self,
        items: &[S],
        mode: TouchlineMode,
        ltp_change_only: bool,
    ) -> FeedResult<()> {
        self.send_token_request(items, |tokens, time| {
            request::touchline_subscribe(tokens, mode, ltp_change_only, time)
        })
    }

    pub fn unsubscribe_touchline<S: AsRef<str>>(&mut self, items: &[S]) -> FeedResult<()> {
        self.send_token_request(items, request::touchline_unsubscribe)
    }

    pub fn ltp_touchline<S: AsRef<str>>(&mut self, items: &[S], action: Action) -> FeedResult<()> {
        self.send_token_request(items, |tokens, time| request::ltp_touchline(tokens, action, time))
    }

    pub fn pause_resume(&mut self, pause: bool) -> FeedResult<()> {
        let req = request::pause_resume(pause, now());
        self.send_message(&req)
    }

    pub fn best_five(&mut self, token: TokenRef, action: Action) -> FeedResult<()> {
        let req = request::best_five(token, action, now()).map_err(|e| self.report(e))?;
        self.send_message(&req)
    }

    /// Malformed items are reported through `on_error` and skipped; the
    /// request still goes out if at least one item is valid.
    fn send_token_request<S, F>(&mut self, items: &[S], build: F) -> FeedResult<()>
    where
        S: AsRef<str>,
        F: FnOnce(&TokenList, NaiveTime) -> Result<String, RequestError>,
    {
        let tokens = TokenList::parse(items).map_err(|e| self.report(e))?;
        for rejected in &tokens.rejected {
            self.handler.on_error(rejected.to_string());
        }
        let req = build(&tokens, now()).map_err(|e| self.report(e))?;
        self.send_message(&req)
    }

    fn report(&mut self, e: RequestError) -> FeedError {
        self.handler.on_error(e.to_string());
        FeedError::Request(e)
    }

    /// Discard unframed bytes and notify `on_close`. Idempotent.
    pub fn close(&mut self, code: u16, reason: &str) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        let discarded = self.buffer.len();
        self.buffer.clear();
        info!(code, reason, discarded, "feed session closed");
        self.stats.log_summary();
        self.handler.on_close(code, reason);
    }

    /// Drive the session from a channel of inbound chunks.
    ///
    /// Returns once `inbound` disconnects (closed with [`CLOSE_NORMAL`]) or
    /// `cancel` yields or disconnects (closed with [`CLOSE_GOING_AWAY`]).
    pub fn run(&mut self, inbound: &Receiver<Vec<u8>>, cancel: &Receiver<()>) {
        loop {
            select! {
                recv(inbound) -> chunk => match chunk {
                    Ok(chunk) => self.on_chunk(&chunk),
                    Err(_) => {
                        self.close(CLOSE_NORMAL, "transport closed");
                        return;
                    }
                },
                recv(cancel) -> _ => {
                    self.close(CLOSE_GOING_AWAY, "cancelled");
                    return;
                }
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    /// Bytes waiting for the rest of their frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

fn now() -> NaiveTime {
    Local::now().time()
}

/// A session fed from several threads.
///
/// Inbound chunks are processed under one lock so `push` never runs
/// concurrently. Outbound frames are built outside the lock and go straight to
/// the shared transport.
pub struct SharedFeedSession<T, H> {
    session: Arc<Mutex<FeedSession<Arc<T>, H>>>,
    transport: Arc<T>,
}

impl<T, H> Clone for SharedFeedSession<T, H> {
    fn clone(&self) -> Self {
        SharedFeedSession {
            session: Arc::clone(&self.session),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport, H: FeedHandler> SharedFeedSession<T, H> {
    pub fn new(config: SessionConfig, transport: T, handler: H) -> FeedResult<Self> {
        let transport = Arc::new(transport);
        let session = FeedSession::new(config, Arc::clone(&transport), handler)?;
        Ok(SharedFeedSession {
            session: Arc::new(Mutex::new(session)),
            transport,
        })
    }

    pub fn open(&self) -> FeedResult<()> {
        self.session.lock().open()
    }

    pub fn on_chunk(&self, chunk: &[u8]) {
        self.session.lock().on_chunk(chunk);
    }

    pub fn send_message(&self, text: &str) -> FeedResult<()> {
        let sent = FrameCodec::wrap(text.as_bytes())
            .map_err(FeedError::from)
            .and_then(|frame| {
                if self.session.lock().is_closed() {
                    return Err(FeedError::NotConnected);
                }
                self.transport.send(&frame)
            });
        if let Err(e) = &sent {
            self.session.lock().handler_mut().on_error(e.to_string());
        }
        sent
    }

    pub fn close(&self, code: u16, reason: &str) {
        self.session.lock().close(code, reason);
    }

    /// Run `f` with the session locked
    pub fn with<R>(&self, f: impl FnOnce(&mut FeedSession<Arc<T>, H>) -> R) -> R {
        f(&mut self.session.lock())
    }
}
