use quarry_common::error::{QuarryError, QuarryResult};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// When set, checkpoints are kept in Postgres instead of under `data_dir`.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    /// Default `EnvFilter` directive; `RUST_LOG` overrides it.
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present; every variable has a default.
    pub fn from_env() -> QuarryResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            data_dir: PathBuf::from(get_var_or("DATA_DIR", "data")),
            database_url: env::var("DATABASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            host: get_var_or("HOST", "0.0.0.0"),
            port: parse_var_or("PORT", 8080)?,
            log_level: get_var_or("LOG_LEVEL", "info"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.data_dir.join("checkpoints")
    }

    pub fn raw_page_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }
}

pub fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse `key` into `T`, using `default` when unset. A set but unparsable
/// value is a configuration error rather than a silent fallback.
pub fn parse_var_or<T>(key: &str, default: T) -> QuarryResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| QuarryError::Config(format!("invalid {key}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Accepts `true/false`, `1/0`, `yes/no`, `on/off` (case-insensitive).
pub fn parse_bool_var_or(key: &str, default: bool) -> QuarryResult<bool> {
    let raw = match env::var(key) {
        Ok(v) => v,
        Err(_) => return Ok(default),
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(QuarryError::Config(format!(
            "invalid {key}={raw:?}: expected a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn config_from_env_uses_defaults() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        env::remove_var("DATA_DIR");
        env::remove_var("DATABASE_URL");
        env::remove_var("PORT");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.checkpoint_dir(), PathBuf::from("data/checkpoints"));
        assert_eq!(cfg.raw_page_dir(), PathBuf::from("data/raw"));
    }

    #[test]
    fn config_from_env_reads_database_url() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        env::set_var("DATABASE_URL", "postgres://localhost/quarry_test");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(
            cfg.database_url.as_deref(),
            Some("postgres://localhost/quarry_test")
        );

        env::remove_var("DATABASE_URL");
    }

    #[test]
    fn config_from_env_rejects_bad_port() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        env::set_var("PORT", "eighty");

        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"), "got: {err}");

        env::remove_var("PORT");
    }

    #[test]
    fn bind_addr_formats_correctly() {
        let cfg = AppConfig {
            data_dir: PathBuf::from("data"),
            database_url: None,
            host: "127.0.0.1".to_owned(),
            port: 3000,
            log_level: "debug".to_owned(),
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn parse_var_or_falls_back_when_unset() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        env::remove_var("_QUARRY_TEST_NUM");
        assert_eq!(parse_var_or("_QUARRY_TEST_NUM", 50u32).unwrap(), 50);

        env::set_var("_QUARRY_TEST_NUM", " 25 ");
        assert_eq!(parse_var_or("_QUARRY_TEST_NUM", 50u32).unwrap(), 25);
        env::remove_var("_QUARRY_TEST_NUM");
    }

    #[test]
    fn parse_bool_var_accepts_common_spellings() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        for (raw, expected) in [("true", true), ("YES", true), ("0", false), ("off", false)] {
            env::set_var("_QUARRY_TEST_BOOL", raw);
            assert_eq!(
                parse_bool_var_or("_QUARRY_TEST_BOOL", !expected).unwrap(),
                expected
            );
        }
        env::set_var("_QUARRY_TEST_BOOL", "maybe");
        assert!(parse_bool_var_or("_QUARRY_TEST_BOOL", false).is_err());
        env::remove_var("_QUARRY_TEST_BOOL");
    }

    #[test]
    fn config_from_env_reads_log_level() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        env::remove_var("LOG_LEVEL");
        assert_eq!(AppConfig::from_env().unwrap().log_level, "info");

        env::set_var("LOG_LEVEL", "quarry_ingest=debug,info");
        assert_eq!(
            AppConfig::from_env().unwrap().log_level,
            "quarry_ingest=debug,info"
        );
        env::remove_var("LOG_LEVEL");
    }
}
