//! Chat configuration parsed from environment variables.

use std::time::Duration;

use crate::error::ConfigError;
use crate::transport::TransportKind;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000/api";
pub const DEFAULT_TRANSPORTS: &str = "websocket,polling";
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_TYPING_IDLE_MS: u64 = 2000;
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 500;
pub const DEFAULT_BANNER_TTL_MS: u64 = 5000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_WAIT_SECS: u64 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// REST base, without trailing slash.
    pub api_base_url: String,
    /// Realtime server base (http or https).
    pub realtime_url: String,
    /// Transports in preference order.
    pub transports: Vec<TransportKind>,
    pub join_timeout: Duration,
    pub typing_idle: Duration,
    /// Size of the first history page fetched on open.
    pub history_limit: u32,
    pub max_message_chars: usize,
    pub banner_ttl: Duration,
    pub connect_timeout: Duration,
    pub poll_wait: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            realtime_url: origin_of(DEFAULT_API_BASE_URL),
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            join_timeout: Duration::from_millis(DEFAULT_JOIN_TIMEOUT_MS),
            typing_idle: Duration::from_millis(DEFAULT_TYPING_IDLE_MS),
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            banner_ttl: Duration::from_millis(DEFAULT_BANNER_TTL_MS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            poll_wait: Duration::from_secs(DEFAULT_POLL_WAIT_SECS),
        }
    }
}

impl ChatConfig {
    /// Build typed chat config from environment variables.
    ///
    /// All optional:
    /// - `CHAT_API_BASE_URL`: default `http://127.0.0.1:5000/api`
    /// - `CHAT_REALTIME_URL`: default is the origin of the API base
    /// - `CHAT_TRANSPORTS`: comma list, default `websocket,polling`
    /// - `CHAT_JOIN_TIMEOUT_MS`: default 5000
    /// - `CHAT_TYPING_IDLE_MS`: default 2000
    /// - `CHAT_HISTORY_LIMIT`: default 50
    /// - `CHAT_MAX_MESSAGE_CHARS`: default 500
    /// - `CHAT_BANNER_TTL_MS`: default 5000
    /// - `CHAT_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CHAT_POLL_WAIT_SECS`: default 25
    ///
    /// Unparseable numbers fall back to their default; an unknown transport
    /// name is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ChatConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("CHAT_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let realtime_url = lookup("CHAT_REALTIME_URL")
            .map(|url| url.trim_end_matches('/').to_owned())
            .unwrap_or_else(|| origin_of(&api_base_url));
        let transports = parse_transports(lookup("CHAT_TRANSPORTS").as_deref().unwrap_or(DEFAULT_TRANSPORTS))?;

        let parse = |key: &str, default: u64| env_parse(lookup(key), default);
        Ok(Self {
            api_base_url,
            realtime_url,
            transports,
            join_timeout: Duration::from_millis(parse("CHAT_JOIN_TIMEOUT_MS", DEFAULT_JOIN_TIMEOUT_MS)),
            typing_idle: Duration::from_millis(parse("CHAT_TYPING_IDLE_MS", DEFAULT_TYPING_IDLE_MS)),
            history_limit: env_parse(lookup("CHAT_HISTORY_LIMIT"), DEFAULT_HISTORY_LIMIT),
            max_message_chars: env_parse(lookup("CHAT_MAX_MESSAGE_CHARS"), DEFAULT_MAX_MESSAGE_CHARS),
            banner_ttl: Duration::from_millis(parse("CHAT_BANNER_TTL_MS", DEFAULT_BANNER_TTL_MS)),
            connect_timeout: Duration::from_secs(parse("CHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)),
            poll_wait: Duration::from_secs(parse("CHAT_POLL_WAIT_SECS", DEFAULT_POLL_WAIT_SECS)),
        })
    }
}

fn env_parse<T>(raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr,
{
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

fn parse_transports(raw: &str) -> Result<Vec<TransportKind>, ConfigError> {
    let mut kinds = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let kind = TransportKind::parse(name)
            .ok_or_else(|| ConfigError::Invalid { key: "CHAT_TRANSPORTS", value: name.to_owned() })?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(ConfigError::Invalid { key: "CHAT_TRANSPORTS", value: raw.to_owned() });
    }
    Ok(kinds)
}

/// `scheme://host[:port]` of a URL; the input unchanged when it has no scheme.
fn origin_of(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_owned();
    };
    let rest = &url[scheme_end + 3..];
    let host_end = rest.find('/').map_or(url.len(), |i| scheme_end + 3 + i);
    url[..host_end].to_owned()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
