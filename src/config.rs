use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::Context;
use serde::Deserialize;

/// Which `UserStore` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(Self::Mongo),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown store backend `{other}` (expected `mongo` or `memory`)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub mongo: MongoConfig,
    pub templates_dir: PathBuf,
    pub template_cache: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mongo = MongoConfig {
            uri: env_or("MONGODB_URI", "mongodb://localhost:27017"),
            database: env_or("MONGODB_DATABASE", "housing"),
            collection: env_or("MONGODB_COLLECTION", "users"),
        };
        Ok(Self {
            host: env_or("APP_HOST", "0.0.0.0"),
            port: env_or("APP_PORT", "8080")
                .parse()
                .context("APP_PORT must be a port number")?,
            store: env_or("STORE_BACKEND", "mongo").parse()?,
            mongo,
            templates_dir: PathBuf::from(env_or("TEMPLATES_DIR", "templates")),
            template_cache: parse_bool(&env_or("TEMPLATE_CACHE", "false"))
                .context("TEMPLATE_CACHE must be a boolean")?,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn parse_bool(v: &str) -> anyhow::Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("not a boolean: `{other}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_known_names() {
        assert_eq!("mongo".parse::<StoreBackend>().unwrap(), StoreBackend::Mongo);
        assert_eq!("MongoDB".parse::<StoreBackend>().unwrap(), StoreBackend::Mongo);
        assert_eq!(" memory ".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(!parse_bool("").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn addr_combines_host_and_port() {
        let cfg = AppConfig {
            host: "127.0.0.1".into(),
            port: 9090,
            store: StoreBackend::Memory,
            mongo: MongoConfig {
                uri: "mongodb://localhost:27017".into(),
                database: "housing".into(),
                collection: "users".into(),
            },
            templates_dir: "templates".into(),
            template_cache: false,
        };
        assert_eq!(cfg.addr().unwrap().to_string(), "127.0.0.1:9090");
    }
}
