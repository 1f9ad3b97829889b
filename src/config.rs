use crate::payments::fees::FeeConditions;
use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

pub const DEFAULT_SOFORT_API_URL: &str = "https://api.sofort.com/api/xml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sofort: SofortSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// Take the client address from `X-Forwarded-For` (only behind a proxy)
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SofortSettings {
    /// `customer_id:project_id:api_key` as shown in the Sofort merchant backend
    pub config_key: String,
    /// Secret the shop id is encrypted with in notification URLs
    pub encryption_key: String,
    /// Default currency for payments that do not name one
    pub currency: String,
    pub api_url: String,
    /// Public URL of the notify endpoint, as reachable by Sofort
    pub notify_url: String,
    pub timeout_secs: u64,
    pub conditions: Option<FeeConditions>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = ServerConfig {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("PORT")
                .context("PORT not set")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: var("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            trust_proxy: var("TRUST_PROXY")
                .map(|v| v.trim().parse::<bool>())
                .transpose()
                .context("TRUST_PROXY must be true or false")?
                .unwrap_or(false),
        };

        let database = DatabaseConfig {
            url: var("DATABASE_URL").context("DATABASE_URL not set")?,
            max_connections: var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|| "20".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
        };

        let fee = parse_decimal(&var, "SOFORT_CONDITIONS_FEE")?;
        let fee_relative = parse_decimal(&var, "SOFORT_CONDITIONS_FEE_RELATIVE")?;
        let conditions = if fee.is_none() && fee_relative.is_none() {
            None
        } else {
            Some(FeeConditions { fee, fee_relative })
        };

        let sofort = SofortSettings {
            config_key: var("SOFORT_CONFIG_KEY").context("SOFORT_CONFIG_KEY not set")?,
            encryption_key: var("SOFORT_ENCRYPTION_KEY")
                .context("SOFORT_ENCRYPTION_KEY not set")?,
            currency: var("SOFORT_CURRENCY").unwrap_or_else(|| "EUR".to_string()),
            api_url: var("SOFORT_API_URL").unwrap_or_else(|| DEFAULT_SOFORT_API_URL.to_string()),
            notify_url: var("SOFORT_NOTIFY_URL").context("SOFORT_NOTIFY_URL not set")?,
            timeout_secs: var("SOFORT_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .context("SOFORT_TIMEOUT_SECS must be a valid number")?,
            conditions,
        };

        let config = Config {
            server,
            database,
            sofort,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.sofort.config_key.split(':').filter(|p| !p.is_empty()).count() != 3 {
            return Err(anyhow!(
                "SOFORT_CONFIG_KEY must have the form customer_id:project_id:api_key"
            ));
        }

        if self.sofort.encryption_key.trim().is_empty() {
            return Err(anyhow!("SOFORT_ENCRYPTION_KEY cannot be empty"));
        }

        let currency = &self.sofort.currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(anyhow!(
                "SOFORT_CURRENCY must be a three-letter ISO code, got {}",
                currency
            ));
        }

        for (name, value) in [
            ("SOFORT_API_URL", &self.sofort.api_url),
            ("SOFORT_NOTIFY_URL", &self.sofort.notify_url),
        ] {
            let url = reqwest::Url::parse(value)
                .with_context(|| format!("{} is not a valid URL", name))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(anyhow!("{} must be an http(s) URL, got {}", name, value));
            }
        }

        Ok(())
    }
}

fn parse_decimal<F>(var: &F, key: &str) -> Result<Option<Decimal>>
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| {
            Decimal::from_str(raw.trim())
                .with_context(|| format!("{} must be a decimal number", key))
        })
        .transpose()
}
