use std::env;

use anyhow::Context;

pub const DEFAULT_SENDER: &str = "noreply@learningplatform.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub sender: String,
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            sender: env::var("LEARNTRACK_SENDER")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            database_url: env::var("DATABASE_URL").ok(),
        }
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance (or pass --data-dir)")
    }
}
