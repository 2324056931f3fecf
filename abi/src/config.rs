use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::PricingPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub pricing: PricingPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    pub filename: String,
    #[serde(default = "default_pool_size")]
    pub max_connections: u32,
}

fn default_pool_size() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn load(filename: &str) -> Result<Self> {
        let config = fs::read_to_string(filename)
            .with_context(|| format!("failed to read config file {filename}"))?;
        serde_yaml::from_str(&config).context("failed to parse config file")
    }
}

impl DbConfig {
    pub fn to_url(&self) -> String {
        // rwc so a fresh deployment creates the database file
        format!("sqlite://{}?mode=rwc", self.filename)
    }
}
