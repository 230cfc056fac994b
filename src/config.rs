//! Runtime configuration
//!
//! Every section is read from environment variables (a `.env` file is
//! loaded first when present). The `from_lookup` constructors take an
//! arbitrary key lookup so parsing can be exercised without touching
//! the process environment.

use crate::error::{Error, Result};
use crate::folder::FolderMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How the IMAP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// TLS from the first byte (usually port 993).
    Tls,
    /// Plain TCP upgraded with `STARTTLS` (usually port 143).
    StartTls,
}

impl Security {
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Tls => 993,
            Self::StartTls => 143,
        }
    }
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tls" | "ssl" | "imaps" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            other => Err(Error::Config(format!(
                "Invalid IMAP_SECURITY '{other}' (expected tls or starttls)"
            ))),
        }
    }
}

/// IMAP connection configuration
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub security: Security,
    /// Skip certificate verification (local bridges with self-signed
    /// certificates).
    pub accept_invalid_certs: bool,
}

impl ImapConfig {
    /// Load IMAP configuration from environment variables
    ///
    /// Required variables:
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_HOST` (default: `127.0.0.1`)
    /// - `IMAP_SECURITY` (default: `tls`)
    /// - `IMAP_PORT` (default: `993` for tls, `143` for starttls)
    /// - `IMAP_ACCEPT_INVALID_CERTS` (default: `false`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(env_lookup)
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ImapConfig::from_env`].
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let security = match value(&get, "IMAP_SECURITY") {
            Some(raw) => raw.parse()?,
            None => Security::Tls,
        };

        Ok(Self {
            host: value(&get, "IMAP_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&get, "IMAP_PORT", security.default_port())?,
            username: required(&get, "IMAP_USERNAME")?,
            password: required(&get, "IMAP_PASSWORD")?,
            security,
            accept_invalid_certs: flag_or(&get, "IMAP_ACCEPT_INVALID_CERTS", false)?,
        })
    }
}

/// Settings for the Ollama generation backend
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// API root, e.g. `http://localhost:11434/api`.
    pub base_url: String,
    pub model: String,
    pub think: bool,
    pub stream: bool,
    /// Minutes the backend keeps the model loaded after a call.
    pub keep_alive: u32,
    pub timeout: Duration,
}

impl OracleConfig {
    pub const DEFAULT_MODEL: &'static str = "gemma3n:latest";

    /// Load oracle configuration from environment variables
    ///
    /// Required: `OLLAMA_BASE_URL`. Optional: `OLLAMA_MODEL`,
    /// `OLLAMA_THINK`, `OLLAMA_STREAM`, `OLLAMA_KEEP_ALIVE`,
    /// `OLLAMA_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a missing base URL or bad value.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(env_lookup)
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`OracleConfig::from_env`].
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            base_url: required(&get, "OLLAMA_BASE_URL")?,
            model: value(&get, "OLLAMA_MODEL").unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            think: flag_or(&get, "OLLAMA_THINK", false)?,
            stream: flag_or(&get, "OLLAMA_STREAM", false)?,
            keep_alive: parse_or(&get, "OLLAMA_KEEP_ALIVE", 1)?,
            timeout: Duration::from_secs(parse_or(&get, "OLLAMA_TIMEOUT_SECS", 120)?),
        })
    }
}

/// Options bundle consumed by the processing loop and orchestrator
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub folders: FolderMap,
    /// Mailboxes never scanned, in addition to the destination folders.
    pub excluded_mailboxes: Vec<String>,
    /// When non-empty, only these mailboxes are scanned.
    pub included_mailboxes: Vec<String>,
    pub cache_enabled: bool,
    pub cache_file: Option<PathBuf>,
    /// Extra passes allowed after a failed mailbox pass.
    pub max_retries: u32,
    /// Run the scam screen before importance scoring on cache misses.
    pub scam_detection: bool,
    /// Mark the message read before copying so the copy lands read.
    pub copy_as_read: bool,
}

impl TriageConfig {
    pub const DEFAULT_MAX_RETRIES: u32 = 2;

    /// Load triage options from environment variables
    ///
    /// Required: `MOST_IMPORTANT_FOLDER`, `MEDIUM_IMPORTANT_FOLDER`,
    /// `LESS_IMPORTANT_FOLDER`, and `CACHE_FILE` unless
    /// `CACHE_ENABLED=false`. Optional: `SCAM_FOLDER`,
    /// `EXCLUDED_MAILBOXES`, `INCLUDED_MAILBOXES`, `MAX_RETRIES`,
    /// `SCAM_DETECTION`, `COPY_AS_READ`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required folder or the cache
    /// path is missing, or a value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(env_lookup)
    }

    /// Build the options from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`TriageConfig::from_env`].
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let folders = FolderMap::new(
            &value(&get, "MOST_IMPORTANT_FOLDER").unwrap_or_default(),
            &value(&get, "MEDIUM_IMPORTANT_FOLDER").unwrap_or_default(),
            &value(&get, "LESS_IMPORTANT_FOLDER").unwrap_or_default(),
            value(&get, "SCAM_FOLDER").as_deref(),
        )?;

        let cache_enabled = flag_or(&get, "CACHE_ENABLED", true)?;
        let cache_file = value(&get, "CACHE_FILE").map(PathBuf::from);
        if cache_enabled && cache_file.is_none() {
            return Err(Error::Config(
                "CACHE_FILE not set (set CACHE_ENABLED=false to run without a cache)".into(),
            ));
        }

        Ok(Self {
            folders,
            excluded_mailboxes: list(&get, "EXCLUDED_MAILBOXES"),
            included_mailboxes: list(&get, "INCLUDED_MAILBOXES"),
            cache_enabled,
            cache_file,
            max_retries: parse_or(&get, "MAX_RETRIES", Self::DEFAULT_MAX_RETRIES)?,
            scam_detection: flag_or(&get, "SCAM_DETECTION", false)?,
            copy_as_read: flag_or(&get, "COPY_AS_READ", false)?,
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// A trimmed, non-empty value.
fn value(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    value(get, key).ok_or_else(|| Error::Config(format!("{key} not set")))
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value(get, key).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|e| Error::Config(format!("Invalid {key}: {e}")))
    })
}

fn flag_or(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    value(get, key).map_or(Ok(default), |raw| {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Config(format!("Invalid {key}: '{raw}' is not a boolean"))),
        }
    })
}

fn list(get: &impl Fn(&str) -> Option<String>, key: &str) -> Vec<String> {
    value(get, key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}
