//! Runtime configuration
//!
//! Read from the environment once at startup.

use crate::reply::{EchoReply, PlaceholderReply, ReplyGenerator};
use crate::state_machine::{DEFAULT_MAX_REPLY_ATTEMPTS, DEFAULT_REPLY_DELAY};
use crate::view::InputSizing;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// How reply bodies are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    /// Fixed placeholder text
    #[default]
    Placeholder,
    /// Quote the last user message back
    Echo,
}

impl ReplyMode {
    pub fn generator(self) -> Arc<dyn ReplyGenerator> {
        match self {
            ReplyMode::Placeholder => Arc::new(PlaceholderReply::default()),
            ReplyMode::Echo => Arc::new(EchoReply),
        }
    }
}

impl FromStr for ReplyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "placeholder" => Ok(ReplyMode::Placeholder),
            "echo" => Ok(ReplyMode::Echo),
            other => Err(format!("unknown reply mode '{other}'")),
        }
    }
}

/// Conversation configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub reply_delay: Duration,
    pub max_reply_attempts: u32,
    pub input_sizing: InputSizing,
    pub reply_mode: ReplyMode,
    /// Capacity of the view event broadcast channel
    pub event_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reply_delay: DEFAULT_REPLY_DELAY,
            max_reply_attempts: DEFAULT_MAX_REPLY_ATTEMPTS,
            input_sizing: InputSizing::default(),
            reply_mode: ReplyMode::default(),
            event_capacity: 128,
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset variables keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let reply_delay = parse_var(&lookup, "CHAT_REPLY_DELAY_MS")?
            .map_or(defaults.reply_delay, Duration::from_millis);
        let max_reply_attempts: u32 =
            parse_var(&lookup, "CHAT_MAX_REPLY_ATTEMPTS")?.unwrap_or(defaults.max_reply_attempts);
        if max_reply_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "CHAT_MAX_REPLY_ATTEMPTS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let min_height = parse_var(&lookup, "CHAT_INPUT_MIN_HEIGHT")?
            .unwrap_or(defaults.input_sizing.min_height);
        let max_height = parse_var(&lookup, "CHAT_INPUT_MAX_HEIGHT")?
            .unwrap_or(defaults.input_sizing.max_height);
        if max_height < min_height {
            return Err(ConfigError::Invalid {
                var: "CHAT_INPUT_MAX_HEIGHT",
                value: max_height.to_string(),
                reason: format!("below minimum height {min_height}"),
            });
        }

        let reply_mode = parse_var(&lookup, "CHAT_REPLY_MODE")?.unwrap_or(defaults.reply_mode);

        Ok(Self {
            reply_delay,
            max_reply_attempts,
            input_sizing: InputSizing::new(min_height, max_height),
            reply_mode,
            event_capacity: defaults.event_capacity,
        })
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: value.clone(),
            reason: e.to_string(),
        })
}
