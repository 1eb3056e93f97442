/// Crate-level error type

use crate::compressor::CodecError;
use crate::config::ConfigError;
use crate::decoder::DecodeError;
use crate::frame::FrameError;
use crate::request::RequestError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("session is not connected")]
    NotConnected,
}

pub type FeedResult<T> = Result<T, FeedError>;
