#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use privlog_kernel_contracts::policy::DEFAULT_POLICY_WINDOW_MINUTES;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_CONFIG_PATH: &str = "PRIVLOG_CONFIG_PATH";
pub const ENV_POLICY_WINDOW_MINUTES: &str = "PRIVLOG_POLICY_WINDOW_MINUTES";
pub const ENV_REDACTION_CHUNK_SIZE: &str = "PRIVLOG_REDACTION_CHUNK_SIZE";

pub const DEFAULT_REDACTION_CHUNK_SIZE: usize = 256;
const MAX_POLICY_WINDOW_MINUTES: i64 = 24 * 60;
const MAX_REDACTION_CHUNK_SIZE: usize = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrivlogConfig {
    /// Length of the validity window of every grant the gateway creates.
    pub policy_window_minutes: i64,
    /// Keys per transaction in batched redaction.
    pub redaction_chunk_size: usize,
}

impl Default for PrivlogConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

impl PrivlogConfig {
    pub fn mvp_v1() -> Self {
        Self {
            policy_window_minutes: DEFAULT_POLICY_WINDOW_MINUTES,
            redaction_chunk_size: DEFAULT_REDACTION_CHUNK_SIZE,
        }
    }

    /// Defaults, then the JSON file (explicit path or `PRIVLOG_CONFIG_PATH`),
    /// then individual environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => Self::from_json_file(&p)?,
            None => Self::mvp_v1(),
        };
        config.apply_overrides(|k| std::env::var(k).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup(ENV_POLICY_WINDOW_MINUTES) {
            self.policy_window_minutes =
                raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    field: "policy_window_minutes",
                    reason: format!("'{raw}' is not an integer"),
                })?;
        }
        if let Some(raw) = lookup(ENV_REDACTION_CHUNK_SIZE) {
            self.redaction_chunk_size =
                raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    field: "redaction_chunk_size",
                    reason: format!("'{raw}' is not an unsigned integer"),
                })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_POLICY_WINDOW_MINUTES).contains(&self.policy_window_minutes) {
            return Err(ConfigError::Invalid {
                field: "policy_window_minutes",
                reason: format!("must be within 1..={MAX_POLICY_WINDOW_MINUTES}"),
            });
        }
        if !(1..=MAX_REDACTION_CHUNK_SIZE).contains(&self.redaction_chunk_size) {
            return Err(ConfigError::Invalid {
                field: "redaction_chunk_size",
                reason: format!("must be within 1..={MAX_REDACTION_CHUNK_SIZE}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;

    #[test]
    fn defaults_are_five_minutes_and_256() {
        let c = PrivlogConfig::mvp_v1();
        assert_eq!(c.policy_window_minutes, 5);
        assert_eq!(c.redaction_chunk_size, 256);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn overrides_apply_and_are_checked() {
        let env = BTreeMap::from([
            (ENV_POLICY_WINDOW_MINUTES, "15".to_string()),
            (ENV_REDACTION_CHUNK_SIZE, "8".to_string()),
        ]);
        let mut c = PrivlogConfig::mvp_v1();
        c.apply_overrides(|k| env.get(k).cloned()).unwrap();
        assert_eq!(c.policy_window_minutes, 15);
        assert_eq!(c.redaction_chunk_size, 8);

        let bad = BTreeMap::from([(ENV_REDACTION_CHUNK_SIZE, "lots".to_string())]);
        let mut c = PrivlogConfig::mvp_v1();
        assert!(matches!(
            c.apply_overrides(|k| bad.get(k).cloned()),
            Err(ConfigError::Invalid { .. })
        ));

        let zero = PrivlogConfig {
            redaction_chunk_size: 0,
            ..PrivlogConfig::mvp_v1()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn json_file_fills_missing_fields_with_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"redaction_chunk_size": 3}}"#).unwrap();
        let c = PrivlogConfig::from_json_file(f.path()).unwrap();
        assert_eq!(c.redaction_chunk_size, 3);
        assert_eq!(c.policy_window_minutes, 5);

        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"window": 3}}"#).unwrap();
        assert!(matches!(
            PrivlogConfig::from_json_file(f.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
