use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::enrollment::{JobCapacityMode, LifecyclePolicy, ReviewerApprovalMode};

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
    pub lifecycle: LifecyclePolicy,
    pub admin: AdminConfig,
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
        let format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidValue {
                variable: "APP_LOG_FORMAT",
                value: raw,
            })?,
            Err(_) => LogFormat::Compact,
        };

        let lifecycle = load_lifecycle_policy()?;

        let admin = AdminConfig {
            id: env::var("APP_ADMIN_ID").unwrap_or_else(|_| "admin".to_string()),
            email: env::var("APP_ADMIN_EMAIL").unwrap_or_else(|_| "admin@campus.local".to_string()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            lifecycle,
            admin,
        })
    }
}

fn load_lifecycle_policy() -> Result<LifecyclePolicy, ConfigError> {
    let defaults = LifecyclePolicy::default();

    let max_course_applications_per_institution =
        match env::var("APP_MAX_APPLICATIONS_PER_INSTITUTION") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(value) if value >= 1 => value,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        variable: "APP_MAX_APPLICATIONS_PER_INSTITUTION",
                        value: raw,
                    })
                }
            },
            Err(_) => defaults.max_course_applications_per_institution,
        };

    let job_capacity = match env::var("APP_JOB_CAPACITY") {
        Ok(raw) => JobCapacityMode::parse(&raw).ok_or(ConfigError::InvalidValue {
            variable: "APP_JOB_CAPACITY",
            value: raw,
        })?,
        Err(_) => defaults.job_capacity,
    };

    let reviewer_approval = match env::var("APP_REVIEWER_APPROVAL") {
        Ok(raw) => ReviewerApprovalMode::parse(&raw).ok_or(ConfigError::InvalidValue {
            variable: "APP_REVIEWER_APPROVAL",
            value: raw,
        })?,
        Err(_) => defaults.reviewer_approval,
    };

    Ok(LifecyclePolicy {
        max_course_applications_per_institution,
        job_capacity,
        reviewer_approval,
    })
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
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Administrator account registered when the service boots.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub id: String,
    pub email: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { variable: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { variable, value } => {
                write!(f, "{variable} has unsupported value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
