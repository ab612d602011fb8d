use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::commands::invite_members::{InviteSettings, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub from_email: String,
    pub invite_batch_size: usize,
    pub invite_concurrency: usize,
    pub log_filter: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            from_email: env::var("FROM_EMAIL").context("FROM_EMAIL must be set")?,
            invite_batch_size: parse_or("INVITE_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            invite_concurrency: parse_or("INVITE_CONCURRENCY", DEFAULT_CONCURRENCY)?,
            log_filter: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn invite_settings(&self) -> InviteSettings {
        InviteSettings {
            from: self.from_email.clone(),
            batch_size: self.invite_batch_size,
            concurrency: self.invite_concurrency,
        }
    }
}

fn parse_or(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a positive number")),
        Err(_) => Ok(default),
    }
}
