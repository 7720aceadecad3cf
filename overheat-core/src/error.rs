use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the process [`Config`](crate::config::Config).
///
/// These are the only fatal errors: they abort startup before any cycle runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("asset list is empty")]
    NoAssets,

    #[error("malformed asset entry {0:?}, expected SYMBOL:id")]
    MalformedAsset(String),

    #[error("check interval must be at least one minute")]
    ZeroInterval,
}

/// Durable persistence failures. Only writes produce these; unreadable state is
/// treated as a cold start by the reader.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialise {key}: {source}")]
    Serialise {
        key: String,
        source: serde_json::Error,
    },
}

/// Outbound data fetch failures. Never escape a data collaborator: they are
/// folded into a degraded reading.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("response missing field {0}")]
    MissingField(&'static str),

    #[error("no data returned")]
    Empty,

    #[error("non-finite value {0}")]
    NonFinite(f64),
}

impl FetchError {
    /// Determine if the failure was caused by the outbound call timing out.
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Request(error) => error.is_timeout(),
            _ => false,
        }
    }
}

/// Delivery failures on a single notification channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address {0:?}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("channel rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for NotifyError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for NotifyError {
    fn from(value: lettre::transport::smtp::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

/// Failure that ends a check cycle after all per-asset work has been done.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to persist last-run snapshot: {0}")]
    Snapshot(#[from] StoreError),

    #[error("another check cycle is in progress")]
    Busy,

    #[error("failed to lock check cycle: {0}")]
    Lock(std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("scheduler already started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        struct TestCase {
            input: ConfigError,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: invalid numeric value names the key and the raw input
                input: ConfigError::InvalidValue {
                    key: "OVERHEAT_THRESHOLD",
                    value: "hot".to_string(),
                    reason: "invalid float literal".to_string(),
                },
                expected: "invalid value for OVERHEAT_THRESHOLD: \"hot\" (invalid float literal)",
            },
            TestCase {
                // TC1: empty asset list
                input: ConfigError::NoAssets,
                expected: "asset list is empty",
            },
            TestCase {
                // TC2: malformed asset entry
                input: ConfigError::MalformedAsset("BTC".to_string()),
                expected: "malformed asset entry \"BTC\", expected SYMBOL:id",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.to_string(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_fetch_error_is_not_timeout_for_status() {
        let error = FetchError::Status(reqwest::StatusCode::TOO_MANY_REQUESTS);
        assert!(!error.is_timeout());
        assert_eq!(error.to_string(), "unexpected HTTP status 429 Too Many Requests");
    }
}
