//! # Bot Configuration Module
//!
//! Runtime settings read from the environment (after `.env` is loaded),
//! with defaults for everything except the bot token and the database URL.

use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::localization::{DEFAULT_LANGUAGE, DEFAULT_LOCALES_DIR, SUPPORTED_LANGUAGES};

// Constants for bot configuration
pub const DEFAULT_QUESTION_SEND_DELAY_MS: u64 = 100;
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow!("Unknown LOG_FORMAT: {other}")),
        }
    }
}

/// Configuration structure for the poll bot
#[derive(Clone)]
pub struct BotConfig {
    /// Telegram Bot API token
    pub bot_token: String,
    /// PostgreSQL connection string
    pub database_url: String,
    /// Bot username used in deep links; asked from Telegram when unset
    pub bot_username: Option<String>,
    /// Directory holding `<lang>/main.ftl`
    pub locales_dir: PathBuf,
    /// Language used when the user's language is unsupported
    pub default_language: String,
    /// Pause between consecutive question messages
    pub question_send_delay: Duration,
    pub database_max_connections: u32,
    pub log_format: LogFormat,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            database_url: String::new(),
            bot_username: None,
            locales_dir: PathBuf::from(DEFAULT_LOCALES_DIR),
            default_language: DEFAULT_LANGUAGE.to_string(),
            question_send_delay: Duration::from_millis(DEFAULT_QUESTION_SEND_DELAY_MS),
            database_max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            log_format: LogFormat::Pretty,
        }
    }
}

// The token is a credential and stays out of logs
impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &"<redacted>")
            .field("database_url", &"<redacted>")
            .field("bot_username", &self.bot_username)
            .field("locales_dir", &self.locales_dir)
            .field("default_language", &self.default_language)
            .field("question_send_delay", &self.question_send_delay)
            .field("database_max_connections", &self.database_max_connections)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl BotConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let bot_token = optional("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
        let database_url = optional("DATABASE_URL").context("DATABASE_URL must be set")?;

        let default_language = match optional("DEFAULT_LANGUAGE") {
            Some(language) if SUPPORTED_LANGUAGES.contains(&language.as_str()) => language,
            Some(language) => {
                return Err(anyhow!(
                    "Unsupported DEFAULT_LANGUAGE: {language} (expected one of {SUPPORTED_LANGUAGES:?})"
                ))
            }
            None => defaults.default_language,
        };

        let question_send_delay = match optional("QUESTION_SEND_DELAY_MS") {
            Some(value) => Duration::from_millis(
                value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid QUESTION_SEND_DELAY_MS: {value}"))?,
            ),
            None => defaults.question_send_delay,
        };

        let database_max_connections = match optional("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("Invalid DATABASE_MAX_CONNECTIONS: {value}"))?,
            None => defaults.database_max_connections,
        };

        let log_format = match optional("LOG_FORMAT") {
            Some(value) => LogFormat::parse(&value)?,
            None => defaults.log_format,
        };

        Ok(Self {
            bot_token,
            database_url,
            bot_username: optional("BOT_USERNAME").map(|name| name.trim_start_matches('@').to_string()),
            locales_dir: optional("LOCALES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.locales_dir),
            default_language,
            question_send_delay,
            database_max_connections,
            log_format,
        })
    }
}
