use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::passport::config::{
    LifecycleConfig, RequirementSpec, DEFAULT_MAX_DOCUMENT_BYTES, DEFAULT_NUMBER_ATTEMPTS,
    DEFAULT_VALIDITY_YEARS,
};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub lifecycle: LifecycleConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            lifecycle: load_lifecycle()?,
        })
    }
}

fn load_lifecycle() -> Result<LifecycleConfig, ConfigError> {
    let requirements = match env::var("PASSPORT_REQUIRED_DOCUMENTS") {
        Ok(raw) => parse_requirements(&raw)?,
        Err(_) => LifecycleConfig::default().requirements,
    };

    let max_document_bytes = parse_number(
        "PASSPORT_MAX_DOCUMENT_BYTES",
        DEFAULT_MAX_DOCUMENT_BYTES,
    )?;
    let validity_years = parse_number("PASSPORT_VALIDITY_YEARS", DEFAULT_VALIDITY_YEARS)?;
    let number_attempts = parse_number("PASSPORT_NUMBER_ATTEMPTS", DEFAULT_NUMBER_ATTEMPTS)?;

    Ok(LifecycleConfig {
        requirements,
        max_document_bytes,
        validity_years,
        number_attempts,
    })
}

/// Comma separated `Name` or `Name:optional` entries.
pub fn parse_requirements(raw: &str) -> Result<Vec<RequirementSpec>, ConfigError> {
    let mut requirements: Vec<RequirementSpec> = Vec::new();

    for item in raw.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let spec = match item.rsplit_once(':') {
            Some((name, flag)) => match flag.trim().to_ascii_lowercase().as_str() {
                "optional" => RequirementSpec::optional(name.trim()),
                "required" => RequirementSpec::required(name.trim()),
                _ => {
                    return Err(ConfigError::InvalidRequirement {
                        entry: item.to_string(),
                    })
                }
            },
            None => RequirementSpec::required(item),
        };

        if spec.kind.as_str().is_empty()
            || requirements.iter().any(|existing| existing.kind == spec.kind)
        {
            return Err(ConfigError::InvalidRequirement {
                entry: item.to_string(),
            });
        }
        requirements.push(spec);
    }

    if !requirements.iter().any(|spec| spec.required) {
        return Err(ConfigError::NoRequiredDocuments);
    }
    Ok(requirements)
}

fn parse_number<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + From<u8>,
{
    let value = match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name })?,
        Err(_) => default,
    };
    if value < T::from(1) {
        return Err(ConfigError::InvalidNumber { name });
    }
    Ok(value)
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str },
    InvalidRequirement { entry: String },
    NoRequiredDocuments,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name } => {
                write!(f, "{} must be a positive integer", name)
            }
            ConfigError::InvalidRequirement { entry } => write!(
                f,
                "PASSPORT_REQUIRED_DOCUMENTS entry '{}' must be `Name` or `Name:optional` and unique",
                entry
            ),
            ConfigError::NoRequiredDocuments => write!(
                f,
                "PASSPORT_REQUIRED_DOCUMENTS must name at least one required document"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidRequirement { .. }
            | ConfigError::NoRequiredDocuments => None,
        }
    }
}
