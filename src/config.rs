//! Pipeline configuration file support
//!
//! Handles parsing of `dwh.toml` configuration files and environment
//! variable overrides. Sections and keys mirror the classic `dwh.cfg`
//! layout:
//!
//! ```toml
//! [IAM_ROLE]
//! ARN = "arn:aws:iam::123456789012:role/dwhRole"
//!
//! [S3]
//! LOG_DATA = "s3://udacity-dend/log_data"
//! LOG_JSONPATH = "s3://udacity-dend/log_json_path.json"
//! SONG_DATA = "s3://udacity-dend/song_data"
//!
//! [CLUSTER]
//! HOST = "dwhcluster.example.us-west-2.redshift.amazonaws.com"
//! DB_NAME = "dwh"
//! DB_USER = "dwhuser"
//! DB_PASSWORD = "..."
//! DB_PORT = 5439
//! ```
//!
//! The file is read once at startup into a [`DwhConfig`]; the values the
//! statement catalog needs are then resolved into [`LoadSettings`], and the
//! connection values into [`ClusterSettings`]. Both are plain structs passed
//! by reference.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalog::Dialect;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "dwh.toml";

/// Default Redshift port
pub const DEFAULT_PORT: u16 = 5439;

pub const KEY_ARN: &str = "IAM_ROLE.ARN";
pub const KEY_LOG_DATA: &str = "S3.LOG_DATA";
pub const KEY_LOG_JSONPATH: &str = "S3.LOG_JSONPATH";
pub const KEY_SONG_DATA: &str = "S3.SONG_DATA";
pub const KEY_HOST: &str = "CLUSTER.HOST";
pub const KEY_DB_NAME: &str = "CLUSTER.DB_NAME";
pub const KEY_DB_USER: &str = "CLUSTER.DB_USER";
pub const KEY_DB_PASSWORD: &str = "CLUSTER.DB_PASSWORD";

pub const ENV_ARN: &str = "DWH_IAM_ROLE_ARN";
pub const ENV_LOG_DATA: &str = "DWH_S3_LOG_DATA";
pub const ENV_LOG_JSONPATH: &str = "DWH_S3_LOG_JSONPATH";
pub const ENV_SONG_DATA: &str = "DWH_S3_SONG_DATA";
pub const ENV_HOST: &str = "DWH_CLUSTER_HOST";
pub const ENV_DB_NAME: &str = "DWH_CLUSTER_DB_NAME";
pub const ENV_DB_USER: &str = "DWH_CLUSTER_DB_USER";
pub const ENV_DB_PASSWORD: &str = "DWH_CLUSTER_DB_PASSWORD";
pub const ENV_DB_PORT: &str = "DWH_CLUSTER_DB_PORT";
pub const ENV_DIALECT: &str = "DWH_CLUSTER_DIALECT";

/// Error type for configuration handling
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file does not exist
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// A required key is absent
    #[error("Missing required configuration key: {0}")]
    MissingKey(&'static str),

    /// File could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// `[IAM_ROLE]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IamRoleSection {
    /// Role the warehouse assumes to read S3
    #[serde(rename = "ARN", default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

/// `[S3]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Section {
    /// Prefix of the listening-event log files
    #[serde(rename = "LOG_DATA", default, skip_serializing_if = "Option::is_none")]
    pub log_data: Option<String>,

    /// JSON-path descriptor mapping event keys to `stg_events` columns
    #[serde(
        rename = "LOG_JSONPATH",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub log_jsonpath: Option<String>,

    /// Prefix of the song catalog files
    #[serde(rename = "SONG_DATA", default, skip_serializing_if = "Option::is_none")]
    pub song_data: Option<String>,
}

/// `[CLUSTER]` section
#[derive(Clone, Serialize, Deserialize)]
pub struct ClusterSection {
    #[serde(rename = "HOST", default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(rename = "DB_NAME", default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    #[serde(rename = "DB_USER", default, skip_serializing_if = "Option::is_none")]
    pub db_user: Option<String>,

    #[serde(
        rename = "DB_PASSWORD",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub db_password: Option<String>,

    #[serde(rename = "DB_PORT", default = "default_port")]
    pub db_port: u16,

    /// SQL dialect of the target warehouse
    #[serde(rename = "DIALECT", default)]
    pub dialect: Dialect,

    /// Connection pool size
    #[serde(rename = "POOL_SIZE", default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_pool_size() -> usize {
    1
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            host: None,
            db_name: None,
            db_user: None,
            db_password: None,
            db_port: default_port(),
            dialect: Dialect::default(),
            pool_size: default_pool_size(),
        }
    }
}

impl std::fmt::Debug for ClusterSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSection")
            .field("host", &self.host)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &self.db_password.as_ref().map(|_| "****"))
            .field("db_port", &self.db_port)
            .field("dialect", &self.dialect)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

/// Main configuration structure
///
/// Represents the `dwh.toml` configuration file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DwhConfig {
    #[serde(rename = "IAM_ROLE", default)]
    pub iam_role: IamRoleSection,

    #[serde(rename = "S3", default)]
    pub s3: S3Section,

    #[serde(rename = "CLUSTER", default)]
    pub cluster: ClusterSection,
}

/// Values substituted into the COPY statements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSettings {
    pub arn: String,
    pub log_data: String,
    pub log_jsonpath: String,
    pub song_data: String,
}

impl LoadSettings {
    pub fn new(
        arn: impl Into<String>,
        log_data: impl Into<String>,
        log_jsonpath: impl Into<String>,
        song_data: impl Into<String>,
    ) -> Self {
        Self {
            arn: arn.into(),
            log_data: log_data.into(),
            log_jsonpath: log_jsonpath.into(),
            song_data: song_data.into(),
        }
    }
}

/// Resolved warehouse connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    pub host: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub port: u16,
    pub dialect: Dialect,
    pub pool_size: usize,
}

impl ClusterSettings {
    /// Connection endpoint with the password masked, for logs
    pub fn endpoint_masked(&self) -> String {
        format!(
            "postgresql://{}:****@{}:{}/{}",
            self.db_user, self.host, self.port, self.db_name
        )
    }
}

impl std::fmt::Debug for ClusterSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSettings")
            .field("endpoint", &self.endpoint_masked())
            .field("dialect", &self.dialect)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

fn required(value: &Option<String>, key: &'static str) -> ConfigResult<String> {
    value.clone().ok_or(ConfigError::MissingKey(key))
}

impl DwhConfig {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file, then apply environment overrides
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut config = Self::parse(&content)?;
        config.apply_env_overrides();

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut Option<String>); 8] = [
            (ENV_ARN, &mut self.iam_role.arn),
            (ENV_LOG_DATA, &mut self.s3.log_data),
            (ENV_LOG_JSONPATH, &mut self.s3.log_jsonpath),
            (ENV_SONG_DATA, &mut self.s3.song_data),
            (ENV_HOST, &mut self.cluster.host),
            (ENV_DB_NAME, &mut self.cluster.db_name),
            (ENV_DB_USER, &mut self.cluster.db_user),
            (ENV_DB_PASSWORD, &mut self.cluster.db_password),
        ];
        for (key, slot) in targets {
            if let Some(value) = lookup(key) {
                *slot = Some(value);
            }
        }

        if let Some(port) = lookup(ENV_DB_PORT) {
            match port.parse() {
                Ok(port) => self.cluster.db_port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid {}", ENV_DB_PORT),
            }
        }

        if let Some(dialect) = lookup(ENV_DIALECT) {
            match dialect.parse() {
                Ok(dialect) => self.cluster.dialect = dialect,
                Err(e) => tracing::warn!("Ignoring {}: {}", ENV_DIALECT, e),
            }
        }
    }

    /// Resolve the values the statement catalog substitutes
    ///
    /// Fails on the first absent key. Values are not validated.
    pub fn load_settings(&self) -> ConfigResult<LoadSettings> {
        Ok(LoadSettings {
            arn: required(&self.iam_role.arn, KEY_ARN)?,
            log_data: required(&self.s3.log_data, KEY_LOG_DATA)?,
            log_jsonpath: required(&self.s3.log_jsonpath, KEY_LOG_JSONPATH)?,
            song_data: required(&self.s3.song_data, KEY_SONG_DATA)?,
        })
    }

    /// Resolve the warehouse connection values
    pub fn cluster_settings(&self) -> ConfigResult<ClusterSettings> {
        Ok(ClusterSettings {
            host: required(&self.cluster.host, KEY_HOST)?,
            db_name: required(&self.cluster.db_name, KEY_DB_NAME)?,
            db_user: required(&self.cluster.db_user, KEY_DB_USER)?,
            db_password: required(&self.cluster.db_password, KEY_DB_PASSWORD)?,
            port: self.cluster.db_port,
            dialect: self.cluster.dialect,
            pool_size: self.cluster.pool_size.max(1),
        })
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Warehouse ETL configuration

[IAM_ROLE]
# Role the cluster assumes to read the source bucket
ARN = "arn:aws:iam::123456789012:role/dwhRole"

[S3]
LOG_DATA = "s3://udacity-dend/log_data"
LOG_JSONPATH = "s3://udacity-dend/log_json_path.json"
SONG_DATA = "s3://udacity-dend/song_data"

[CLUSTER]
HOST = "dwhcluster.example.us-west-2.redshift.amazonaws.com"
DB_NAME = "dwh"
DB_USER = "dwhuser"
DB_PASSWORD = "change-me"
DB_PORT = 5439
# "redshift" (default) or "postgres"
DIALECT = "redshift"
POOL_SIZE = 1
"#
}
