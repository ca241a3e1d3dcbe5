use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_SELECTION_LIMIT: i64 = 150;
pub const MAX_SELECTION_LIMIT: i64 = 1000;
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    pub bind: String,
    pub default_selection_limit: i64,
    pub session_ttl_hours: i64,
    pub review_url: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            default_selection_limit: DEFAULT_SELECTION_LIMIT,
            session_ttl_hours: 24 * 7,
            review_url: None,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl PortalConfig {
    /// Reads `PORTAL_*` environment variables, falling back to the defaults above.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            bind: load_or("PORTAL_BIND", defaults.bind)?,
            default_selection_limit: load_or(
                "PORTAL_DEFAULT_SELECTION_LIMIT",
                defaults.default_selection_limit,
            )?,
            session_ttl_hours: load_or("PORTAL_SESSION_TTL_HOURS", defaults.session_ttl_hours)?,
            review_url: optional("PORTAL_REVIEW_URL"),
            admin_email: optional("PORTAL_ADMIN_EMAIL"),
            admin_password: optional("PORTAL_ADMIN_PASSWORD"),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_SELECTION_LIMIT).contains(&self.default_selection_limit) {
            return Err(Error::Init(format!(
                "PORTAL_DEFAULT_SELECTION_LIMIT must be between 1 and {MAX_SELECTION_LIMIT}"
            )));
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            return Err(Error::Init(format!(
                "PORTAL_SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}"
            )));
        }
        Ok(())
    }

    pub fn session_ttl_secs(&self) -> i64 {
        self.session_ttl_hours * 60 * 60
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn load_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match optional(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Init(format!("Invalid {key} value {raw:?}: {e}"))),
        None => {
            log::info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppPaths {
    pub root: PathBuf,
    pub db_path: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let root = optional("PORTAL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        Self::at(root)
    }

    pub fn at(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        let db_path = root.join("portal.db");
        Ok(Self { root, db_path })
    }
}
