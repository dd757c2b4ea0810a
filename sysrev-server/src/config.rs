use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::DATABASE_FILE;

/// Where study reviews are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// Lost on restart. Useful for demos and local testing.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown storage backend '{}' (expected sqlite or memory)", other),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    pub storage_backend: StorageBackend,
    /// Optional bearer token for the `/api/v1` routes.
    /// If set, requests must include `Authorization: Bearer <token>`.
    pub api_auth_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value
                .parse::<StorageBackend>()
                .context("STORAGE_BACKEND must be 'sqlite' or 'memory'")?,
            Err(_) => StorageBackend::default(),
        };

        let api_auth_token = parse_api_auth_token(env::var("API_AUTH_TOKEN").ok());

        Ok(Config {
            port,
            state_dir,
            storage_backend,
            api_auth_token,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join(DATABASE_FILE)
    }
}

/// Parse API_AUTH_TOKEN from an optional string value.
///
/// Returns None if the value is missing, empty, or contains only whitespace,
/// so an empty token can never match an empty `Bearer ` header.
pub fn parse_api_auth_token(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_auth_token_none() {
        assert_eq!(parse_api_auth_token(None), None);
    }

    #[test]
    fn test_parse_api_auth_token_empty_or_whitespace() {
        assert_eq!(parse_api_auth_token(Some("".to_string())), None);
        assert_eq!(parse_api_auth_token(Some("   ".to_string())), None);
        assert_eq!(parse_api_auth_token(Some("\t\n".to_string())), None);
    }

    #[test]
    fn test_parse_api_auth_token_valid() {
        assert_eq!(
            parse_api_auth_token(Some("secret-token".to_string())),
            Some("secret-token".to_string())
        );
        // Surrounding whitespace is preserved, not trimmed
        assert_eq!(
            parse_api_auth_token(Some("  token  ".to_string())),
            Some("  token  ".to_string())
        );
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!("sqlite".parse::<StorageBackend>().unwrap(), StorageBackend::Sqlite);
        assert_eq!(" Memory ".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("postgres".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_database_path_is_inside_state_dir() {
        let config = Config {
            port: 3000,
            state_dir: PathBuf::from("/var/lib/sysrev"),
            storage_backend: StorageBackend::Sqlite,
            api_auth_token: None,
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/sysrev/sysrev-state.db")
        );
    }
}
