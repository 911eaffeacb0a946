use std::env;
use std::fs::File;
use std::io::Error as IoError;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_yaml::Error as SerdeYamlError;
use thiserror::Error;
use tracing::debug;

/// env var holding path of the operator config file
pub const CONFIG_ENV: &str = "CANARY_OPERATOR_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    #[error("Yaml error: {0}")]
    SerdeError(#[from] SerdeYamlError),
    #[error("invalid requeue delays: base {base_ms}ms, max {max_ms}ms")]
    InvalidRequeue { base_ms: u64, max_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorConfig {
    /// only reconcile objects in this namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_namespace: Option<String>,
    pub controllers: ControllersConfig,
    pub requeue: RequeueConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllersConfig {
    pub app: bool,
    pub micro_service: bool,
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            app: true,
            micro_service: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequeueConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 5,
            max_delay_ms: 1000 * 1000,
        }
    }
}

impl RequeueConfig {
    /// exponential backoff: base doubled per failure, capped at max
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 1u64.checked_shl(failures.saturating_sub(1)).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

impl OperatorConfig {
    /// load from file named by `CANARY_OPERATOR_CONFIG`, defaults if unset
    pub fn load() -> Result<Self, ConfigError> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(path),
            None => {
                debug!("{} not set, using default config", CONFIG_ENV);
                Ok(Self::default())
            }
        }
    }

    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        debug!(path = %path.as_ref().display(), "loading operator config");
        let file = File::open(path)?;
        let config: Self = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let requeue = &self.requeue;
        if requeue.base_delay_ms == 0 || requeue.base_delay_ms > requeue.max_delay_ms {
            return Err(ConfigError::InvalidRequeue {
                base_ms: requeue.base_delay_ms,
                max_ms: requeue.max_delay_ms,
            });
        }
        Ok(())
    }

    /// true if objects in `namespace` are handled by this operator
    pub fn watches(&self, namespace: &str) -> bool {
        match &self.watch_namespace {
            Some(watched) => watched == namespace,
            None => true,
        }
    }
}
