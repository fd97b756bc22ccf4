use crate::constants::*;
use crate::errors::{AppError, AppResult};
use crate::models::FailurePolicy;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// Everything a pipeline run needs, resolved up front and handed to each
/// component when it is built.
///
/// Can be read from the environment ([`PipelineConfig::from_env`]) or from a
/// TOML file ([`PipelineConfig::from_toml_file`]). The TOML loader rejects
/// unknown keys to catch typos.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Connection identity of the blob service
    pub blob_connection: String,
    /// Connection identity of the table service
    pub table_connection: String,
    /// Container holding the source document
    pub container: String,
    /// Name of the source document blob
    pub blob_name: String,
    /// Table receiving one summary row per sale event
    pub table_name: String,
    /// Container receiving the archived fragments (defaults to `container`)
    #[serde(default)]
    pub archive_container: Option<String>,
    /// Publisher behaviour on a failed write
    #[serde(default)]
    pub on_error: FailurePolicy,
    /// Timeout applied to each storage request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl PipelineConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a required variable is missing or empty, or
    /// an optional one cannot be parsed.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup using the environment
    /// variable names.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    AppError::InvalidConfig(format!("environment variable {key} is not set"))
                })
        };
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let on_error = match optional(ENV_ON_ERROR) {
            Some(value) => value.parse()?,
            None => FailurePolicy::default(),
        };
        let request_timeout_secs = match optional(ENV_REQUEST_TIMEOUT_SECS) {
            Some(value) => value.trim().parse().map_err(|e| {
                AppError::InvalidConfig(format!("{ENV_REQUEST_TIMEOUT_SECS}='{value}': {e}"))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let config = Self {
            blob_connection: required(ENV_BLOB_CONNECTION)?,
            table_connection: required(ENV_TABLE_CONNECTION)?,
            container: required(ENV_CONTAINER)?,
            blob_name: required(ENV_BLOB_NAME)?,
            table_name: required(ENV_TABLE_NAME)?,
            archive_container: optional(ENV_ARCHIVE_CONTAINER),
            on_error,
            request_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the TOML is malformed, required fields are
    /// missing or empty, or unknown keys are present.
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            AppError::InvalidConfig(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        let config: PipelineConfig = toml::from_str(contents)
            .map_err(|e| AppError::InvalidConfig(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every required value is present.
    pub fn validate(&self) -> AppResult<()> {
        let fields = [
            ("blob_connection", &self.blob_connection),
            ("table_connection", &self.table_connection),
            ("container", &self.container),
            ("blob_name", &self.blob_name),
            ("table_name", &self.table_name),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AppError::InvalidConfig(format!("{name} must not be empty")));
        }
        if self
            .archive_container
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            return Err(AppError::InvalidConfig(
                "archive_container must not be empty when set".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Container the raw fragments are archived to.
    pub fn archive_container(&self) -> &str {
        self.archive_container.as_deref().unwrap_or(&self.container)
    }
}

// Connection strings carry credentials and are left out of debug output
impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("blob_connection", &"<redacted>")
            .field("table_connection", &"<redacted>")
            .field("container", &self.container)
            .field("blob_name", &self.blob_name)
            .field("table_name", &self.table_name)
            .field("archive_container", &self.archive_container)
            .field("on_error", &self.on_error)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
