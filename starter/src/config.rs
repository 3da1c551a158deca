//! Environment-sourced configuration, mirroring the settings groups of the
//! service this starter reimplements: one struct per `*_` env prefix, a
//! duration grammar of `\d+[smhd]`, and a "every Optional must be filled in
//! production" check run once everything else has parsed.

use once_cell::sync::Lazy;
use regex::Regex;
use starter_pod::PodOutputSaveMode;
use starter_resources::{cpu_from_str, ram_from_str};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable '{0}'")]
    Missing(String),
    #[error("variable '{0}': empty string not allowed")]
    Empty(String),
    #[error("variable '{0}': invalid duration '{1}', usage: 30s, 5m, 2h, 1d")]
    InvalidDuration(String, String),
    #[error("variable '{0}': {1}")]
    InvalidResource(String, starter_resources::ResourceParseError),
    #[error("variable '{0}': invalid value '{1}'")]
    InvalidValue(String, String),
    #[error("variables must be set in production mode: {0:?}")]
    MissingInProduction(Vec<String>),
}

fn required(key: &str) -> Result<String, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::Empty(key.to_string()));
    }
    Ok(value)
}

fn optional(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.is_empty() => Err(ConfigError::Empty(key.to_string())),
        Ok(value) => Ok(Some(value)),
        Err(_) => Ok(None),
    }
}

static DURATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([smhd])$").unwrap());

fn duration_seconds(key: &str, raw: &str) -> Result<i64, ConfigError> {
    let caps = DURATION_RE
        .captures(raw)
        .ok_or_else(|| ConfigError::InvalidDuration(key.to_string(), raw.to_string()))?;
    let value: i64 = caps[1].parse().map_err(|_| ConfigError::InvalidDuration(key.to_string(), raw.to_string()))?;
    let unit_seconds = match &caps[2] {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        _ => unreachable!(),
    };
    Ok(value * unit_seconds)
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub engine: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub name: String,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let engine = required("DB_ENGINE")?;
        if engine != "arangodb" {
            return Err(ConfigError::InvalidValue("DB_ENGINE".to_string(), engine));
        }
        Ok(Self {
            engine,
            url: required("DB_URL")?,
            username: required("DB_USERNAME")?,
            password: required("DB_PASSWORD")?,
            name: required("DB_NAME")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentSettings {
    pub name: String,
    pub shutdown_timeout: i64,
    pub service_name: Option<String>,
    pub service_version: Option<String>,
    pub commit_id: Option<String>,
    pub build_date: Option<String>,
    pub commit_date: Option<String>,
    pub git_branch: Option<String>,
}

impl EnvironmentSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let name = required("ENVIRONMENT")?;
        if !matches!(name.as_str(), "dev" | "prod" | "test") {
            return Err(ConfigError::InvalidValue("ENVIRONMENT".to_string(), name));
        }

        let shutdown_timeout_raw = required("SHUTDOWN_TIMEOUT")?;
        let shutdown_timeout = duration_seconds("SHUTDOWN_TIMEOUT", &shutdown_timeout_raw)?;

        let settings = Self {
            shutdown_timeout,
            service_name: optional("SERVICE_NAME")?,
            service_version: optional("SERVICE_VERSION")?,
            commit_id: optional("COMMIT_ID")?,
            build_date: optional("BUILD_DATE")?,
            commit_date: optional("COMMIT_DATE")?,
            git_branch: optional("GIT_BRANCH")?,
            name,
        };

        if settings.name == "prod" {
            let mut missing = Vec::new();
            for (var, value) in [
                ("SERVICE_NAME", &settings.service_name),
                ("SERVICE_VERSION", &settings.service_version),
                ("COMMIT_ID", &settings.commit_id),
                ("BUILD_DATE", &settings.build_date),
                ("COMMIT_DATE", &settings.commit_date),
                ("GIT_BRANCH", &settings.git_branch),
            ] {
                if value.is_none() {
                    missing.push(var.to_string());
                }
            }
            if !missing.is_empty() {
                return Err(ConfigError::MissingInProduction(missing));
            }
        }

        Ok(settings)
    }
}

#[derive(Debug, Clone)]
pub struct FuzzerPodSettings {
    /// Minimum seconds a displaced pod keeps running before deletion.
    pub min_work_time: i64,
    pub namespace: String,
    pub test_run_image: String,
    pub agent_cpu_m: i64,
    pub agent_ram_mi: i64,
    pub output_save_mode: PodOutputSaveMode,
    pub launch_info_retention_period: i64,
    pub launch_info_cleanup_interval: i64,
}

impl FuzzerPodSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let agent_cpu_raw = required("POD_AGENT_CPU")?;
        let agent_ram_raw = required("POD_AGENT_RAM")?;
        let output_save_mode_raw = required("POD_OUTPUT_SAVE_MODE")?;

        Ok(Self {
            min_work_time: duration_seconds("POD_MIN_WORK_TIME", &required("POD_MIN_WORK_TIME")?)?,
            namespace: required("POD_NAMESPACE")?,
            test_run_image: required("POD_TEST_RUN_IMAGE")?,
            agent_cpu_m: cpu_from_str(&agent_cpu_raw).map_err(|e| ConfigError::InvalidResource("POD_AGENT_CPU".to_string(), e))?,
            agent_ram_mi: ram_from_str(&agent_ram_raw).map_err(|e| ConfigError::InvalidResource("POD_AGENT_RAM".to_string(), e))?,
            output_save_mode: output_save_mode_raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("POD_OUTPUT_SAVE_MODE".to_string(), output_save_mode_raw))?,
            launch_info_retention_period: duration_seconds(
                "POD_LAUNCH_INFO_RETENTION_PERIOD",
                &required("POD_LAUNCH_INFO_RETENTION_PERIOD")?,
            )?,
            launch_info_cleanup_interval: duration_seconds(
                "POD_LAUNCH_INFO_CLEANUP_INTERVAL",
                &required("POD_LAUNCH_INFO_CLEANUP_INTERVAL")?,
            )?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ContainerRegistrySettings {
    pub url: String,
}

impl ContainerRegistrySettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self { url: required("CONTAINER_REGISTRY_URL")? })
    }
}

#[derive(Debug, Clone)]
pub struct MessageQueueSettings {
    pub username: String,
    pub password: String,
    pub region: String,
    pub url: Option<String>,
    pub scheduler_queue: String,
    pub broker: String,
}

impl MessageQueueSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let broker = required("MQ_BROKER")?;
        if broker != "sqs" {
            return Err(ConfigError::InvalidValue("MQ_BROKER".to_string(), broker));
        }
        Ok(Self {
            username: required("MQ_USERNAME")?,
            password: required("MQ_PASSWORD")?,
            region: required("MQ_REGION")?,
            url: optional("MQ_URL")?,
            scheduler_queue: required("MQ_QUEUE_SCHEDULER")?,
            broker,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub pool_manager: String,
}

impl ApiEndpoints {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self { pool_manager: required("API_URL_POOL_MANAGER")? })
    }
}

/// Aggregates every settings group, each parsed from its own env prefix.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseSettings,
    pub registry: ContainerRegistrySettings,
    pub fuzzer_pod: FuzzerPodSettings,
    pub environment: EnvironmentSettings,
    pub message_queue: MessageQueueSettings,
    pub api_endpoints: ApiEndpoints,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database: DatabaseSettings::from_env()?,
            registry: ContainerRegistrySettings::from_env()?,
            fuzzer_pod: FuzzerPodSettings::from_env()?,
            environment: EnvironmentSettings::from_env()?,
            message_queue: MessageQueueSettings::from_env()?,
            api_endpoints: ApiEndpoints::from_env()?,
        })
    }
}
