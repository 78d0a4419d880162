use std::env;

use anyhow::{anyhow, Context, Result};

use crate::state::DEFAULT_MAX_BODY_BYTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(anyhow!("APP_ENV must be one of: development, production")),
        }
    }

    pub fn exposes_fault_detail(self) -> bool {
        self == Self::Development
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite { url: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: StoreBackend,
    pub db_max_connections: u32,
    pub environment: Environment,
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("APP_PORT")
            .or_else(|| lookup("PORT"))
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid u16")?;

        let backend = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            None => StoreBackend::Memory,
            Some(url) if url.starts_with("sqlite:") => StoreBackend::Sqlite { url },
            Some(url) => return Err(anyhow!("DATABASE_URL must be a sqlite: URL, got {url:?}")),
        };

        let db_max_connections = lookup("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "5".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid u32")?;

        let environment = match lookup("APP_ENV") {
            Some(raw) => Environment::parse(&raw)?,
            None => Environment::Production,
        };

        let max_body_bytes = match lookup("MAX_BODY_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .context("MAX_BODY_BYTES must be a valid usize")?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Self {
            host,
            port,
            backend,
            db_max_connections,
            environment,
            max_body_bytes,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_in_memory_production() {
        let config = load(&[]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:3000");
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn port_falls_back_to_plain_port_variable() {
        let config = load(&[("PORT", "8081")]).unwrap();
        assert_eq!(config.port, 8081);
        let config = load(&[("PORT", "8081"), ("APP_PORT", "9000")]).unwrap();
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn sqlite_url_selects_sqlite_backend() {
        let config = load(&[("DATABASE_URL", "sqlite://items.db")]).unwrap();
        assert_eq!(
            config.backend,
            StoreBackend::Sqlite {
                url: "sqlite://items.db".to_string()
            }
        );
    }

    #[test]
    fn rejects_non_sqlite_url() {
        assert!(load(&[("DATABASE_URL", "postgres://localhost/items")]).is_err());
    }

    #[test]
    fn parses_environment() {
        let config = load(&[("APP_ENV", "Development")]).unwrap();
        assert!(config.environment.exposes_fault_detail());
        assert!(load(&[("APP_ENV", "staging")]).is_err());
    }

    #[test]
    fn invalid_port_is_an_error() {
        assert!(load(&[("APP_PORT", "not-a-port")]).is_err());
    }
}
