use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("PLEDGE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PLEDGE_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let db_path: PathBuf = lookup("PLEDGE_DB_PATH")
            .unwrap_or_else(|| "pledge.db".into())
            .into();
        let host = lookup("PLEDGE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("PLEDGE_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("PLEDGE_PORT is not a valid port")?;

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
        })
    }
}
