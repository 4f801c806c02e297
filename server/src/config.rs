//! Configuration for the quiz server
//!
//! Every tunable has one getter reading its environment variable and
//! falling back to a compile-time default. Command-line flags, when given,
//! take precedence over these (see `main`).
//!
//! Data directory precedence:
//! 1. QUIZ_DATA_DIR environment variable
//! 2. the platform data directory (e.g. ~/.local/share/quiz-arena)
//! 3. ./data (fallback for development)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;

const DEV_DATA_DIR: &str = "./data";
const DEFAULT_LISTEN_ADDR: &str = "[::1]:50052";
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_BACKOFF_MS: u64 = 500;
const DEFAULT_LINGER_SECS: u64 = 600;

/// Which Progress Store implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Json,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown store backend: {other} (expected sqlite or json)")),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a value, falling back to the default when missing or malformed.
fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable setting");
            default
        }),
        None => default,
    }
}

/// Get the data directory for persistence.
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = env_var("QUIZ_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(dirs) = ProjectDirs::from("", "", "quiz-arena") {
        return dirs.data_dir().to_path_buf();
    }

    PathBuf::from(DEV_DATA_DIR)
}

/// Catalog file to load instead of the built-in one.
pub fn get_catalog_path() -> Option<PathBuf> {
    env_var("QUIZ_CATALOG_PATH").map(PathBuf::from)
}

pub fn get_listen_addr() -> String {
    env_var("QUIZ_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
}

pub fn get_store_backend() -> StoreBackend {
    parse_or(
        "QUIZ_STORE_BACKEND",
        env_var("QUIZ_STORE_BACKEND"),
        StoreBackend::default(),
    )
}

/// Directory for rolling log files. Logs go to stdout only when unset.
pub fn get_log_dir() -> Option<PathBuf> {
    env_var("QUIZ_LOG_DIR").map(PathBuf::from)
}

pub fn get_reconcile_max_retries() -> u32 {
    parse_or(
        "QUIZ_RECONCILE_MAX_RETRIES",
        env_var("QUIZ_RECONCILE_MAX_RETRIES"),
        DEFAULT_MAX_RETRIES,
    )
}

pub fn get_reconcile_backoff() -> Duration {
    Duration::from_millis(parse_or(
        "QUIZ_RECONCILE_BACKOFF_MS",
        env_var("QUIZ_RECONCILE_BACKOFF_MS"),
        DEFAULT_BACKOFF_MS,
    ))
}

/// How long a finished session stays queryable before its actor exits.
pub fn get_session_linger() -> Duration {
    Duration::from_secs(parse_or(
        "QUIZ_SESSION_LINGER_SECS",
        env_var("QUIZ_SESSION_LINGER_SECS"),
        DEFAULT_LINGER_SECS,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir_fallback() {
        // Depends on the environment; only check that something usable comes back.
        let dir = get_data_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_parse_or_falls_back() {
        assert_eq!(parse_or("K", Some("7".into()), 3u32), 7);
        assert_eq!(parse_or("K", Some(" 9 ".into()), 3u32), 9);
        assert_eq!(parse_or("K", Some("seven".into()), 3u32), 3);
        assert_eq!(parse_or("K", Some("-1".into()), 3u32), 3);
        assert_eq!(parse_or::<u64>("K", None, 500), 500);
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("sqlite".parse::<StoreBackend>(), Ok(StoreBackend::Sqlite));
        assert_eq!(" JSON ".parse::<StoreBackend>(), Ok(StoreBackend::Json));
        assert!("postgres".parse::<StoreBackend>().is_err());
        assert_eq!(
            parse_or("K", Some("mongo".into()), StoreBackend::default()),
            StoreBackend::Sqlite
        );
    }
}
