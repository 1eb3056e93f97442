/// Session configuration

use crate::reassembly::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest DNS host name
const MAX_HOST_LEN: usize = 253;

const MAX_USER_ID_LEN: usize = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host cannot be empty")]
    EmptyHost,

    #[error("host exceeds maximum length of {max} characters")]
    HostTooLong { max: usize },

    #[error("port must be between 1 and 65535, got {0}")]
    InvalidPort(u16),

    #[error("user_id cannot be empty")]
    EmptyUserId,

    #[error("user_id exceeds maximum length of {max} characters")]
    UserIdTooLong { max: usize },

    #[error("receive buffer size must be non-zero")]
    ZeroBufferSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user_id: String,
    pub use_ssl: bool,
    /// Sent in the login request when set and non-blank
    pub api_key: Option<String>,
    /// Initial capacity of the reassembly buffer
    pub receive_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            host: String::new(),
            port: 4509,
            user_id: String::new(),
            use_ssl: false,
            api_key: None,
            receive_buffer_size: DEFAULT_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16, user_id: impl Into<String>) -> Self {
        SessionConfig {
            host: host.into(),
            port,
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.host.len() > MAX_HOST_LEN {
            return Err(ConfigError::HostTooLong { max: MAX_HOST_LEN });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if self.user_id.trim().is_empty() {
            return Err(ConfigError::EmptyUserId);
        }
        if self.user_id.chars().count() > MAX_USER_ID_LEN {
            return Err(ConfigError::UserIdTooLong { max: MAX_USER_ID_LEN });
        }
        if self.receive_buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        Ok(())
    }

    /// `ws://host:port`, or `wss://` with SSL
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "wss" } else { "ws" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// API key, if one is set and not blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}
