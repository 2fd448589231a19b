//! Process configuration read from the environment.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use secrecy::Secret;
use url::Url;

use crate::api::common::rate_limit::RateLimitConfig;

const DEFAULT_PORT: u16 = 3001;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} is not a valid URL: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("the dev panel cannot be enabled in production")]
    PanelInProduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Optional layer mounted next to the procedures. At most one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOn {
    None,
    RateLimit,
    Panel,
}

pub enum StorageConfig {
    Supabase {
        url: Url,
        service_key: Secret<String>,
    },
    Postgres {
        database_url: String,
    },
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageConfig::Supabase { url, .. } => f
                .debug_struct("Supabase")
                .field("url", &url.as_str())
                .field("service_key", &"[REDACTED]")
                .finish(),
            StorageConfig::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[REDACTED]")
                .finish(),
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub environment: Environment,
    pub port: u16,
    pub add_on: AddOn,
    pub rate_limit: RateLimitConfig,
    pub storage: StorageConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let environment = match var("NODE_ENV").or_else(|| var("ENVIRONMENT")) {
            Some(value) if value.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        };

        // `0` asks the OS for an ephemeral port.
        let port = match var("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        let add_on = match var("SERVER_ADDON").as_deref().map(str::trim) {
            None if environment.is_production() => AddOn::RateLimit,
            None => AddOn::Panel,
            Some("rate-limit") => AddOn::RateLimit,
            Some("panel") => AddOn::Panel,
            Some("none") => AddOn::None,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "SERVER_ADDON",
                    value: other.to_string(),
                })
            }
        };
        if add_on == AddOn::Panel && environment.is_production() {
            return Err(ConfigError::PanelInProduction);
        }

        let mut rate_limit = RateLimitConfig::default();
        if let Some(max) = var("RATE_LIMIT_MAX") {
            rate_limit.max_requests = parse_positive("RATE_LIMIT_MAX", &max)?;
        }
        if let Some(secs) = var("RATE_LIMIT_WINDOW_SECS") {
            rate_limit.window =
                Duration::from_secs(parse_positive("RATE_LIMIT_WINDOW_SECS", &secs)?.into());
        }

        let storage = match var("DATABASE_URL") {
            Some(database_url) => StorageConfig::Postgres { database_url },
            None => {
                let raw_url = var("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?;
                let service_key = var("SUPABASE_SERVICE_ROLE_KEY")
                    .ok_or(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?;
                StorageConfig::Supabase {
                    url: parse_base_url("SUPABASE_URL", &raw_url)?,
                    service_key: Secret::new(service_key),
                }
            }
        };

        Ok(Self {
            environment,
            port,
            add_on,
            rate_limit,
            storage,
        })
    }

    pub fn host(&self) -> IpAddr {
        match self.environment {
            Environment::Production => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            Environment::Development => IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host(), self.port)
    }
}

fn parse_positive(name: &'static str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
}

/// Parses a base URL, forcing a trailing slash so relative joins append.
fn parse_base_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(value.trim()).map_err(|source| ConfigError::InvalidUrl { name, source })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
