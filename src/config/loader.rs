//! Reading node configuration from disk and the environment

use std::path::Path;
use tracing::debug;

use super::error::{ConfigError, ConfigResult};
use super::NodeConfig;
use crate::registry::RepositoryConfig;

pub const ENV_REGISTRY_TYPE: &str = "SHARDCORE_REGISTRY_TYPE";
pub const ENV_REGISTRY_NAMESPACE: &str = "SHARDCORE_REGISTRY_NAMESPACE";
pub const ENV_INSTANCE_ID: &str = "SHARDCORE_INSTANCE_ID";
pub const ENV_LOG_LEVEL: &str = "SHARDCORE_LOG_LEVEL";

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Json => "json",
        }
    }
}

impl NodeConfig {
    /// Read a configuration file, picking the parser by extension.
    ///
    /// Environment overrides and validation are separate steps.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loading {} configuration from {}", format.name(), path.display());
        Self::parse(&content, format)
    }

    pub fn parse(content: &str, format: ConfigFormat) -> ConfigResult<Self> {
        let parse_error = |message: String| ConfigError::Parse {
            format: format.name(),
            message,
        };

        // An empty YAML document is `null`, which is not a map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))
            }
        }
    }

    /// Apply `SHARDCORE_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(repository_type) = lookup(ENV_REGISTRY_TYPE) {
            self.mode
                .repository
                .get_or_insert_with(RepositoryConfig::default)
                .repository_type = repository_type;
        }
        if let Some(namespace) = lookup(ENV_REGISTRY_NAMESPACE) {
            self.mode
                .repository
                .get_or_insert_with(RepositoryConfig::default)
                .namespace = namespace;
        }
        if let Some(id) = lookup(ENV_INSTANCE_ID) {
            self.instance.id = id;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_by_extension() {
        let dir = TempDir::new().unwrap();

        let toml_path = dir.path().join("node.toml");
        std::fs::write(
            &toml_path,
            r#"
[mode.repository]
type = "memory"
namespace = "orders"
lease_ttl = "5s"

[executor]
max_concurrency = 4
"#,
        )
        .unwrap();
        let config = NodeConfig::load(&toml_path).unwrap();
        let repository = config.mode.repository.unwrap();
        assert_eq!(repository.namespace, "orders");
        assert_eq!(repository.lease_ttl, Duration::from_secs(5));
        assert_eq!(config.executor.max_concurrency, 4);

        let yaml_path = dir.path().join("node.yml");
        std::fs::write(
            &yaml_path,
            "instance:\n  id: node-7\n  instance_type: jdbc\nworker_id:\n  max_worker_id: 15\n",
        )
        .unwrap();
        let config = NodeConfig::load(&yaml_path).unwrap();
        assert_eq!(config.instance.id, "node-7");
        assert_eq!(config.worker_id.max_worker_id, 15);

        let json_path = dir.path().join("node.json");
        std::fs::write(&json_path, r#"{"log": {"level": "debug"}}"#).unwrap();
        assert_eq!(NodeConfig::load(&json_path).unwrap().log.level, "debug");
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();

        assert!(matches!(
            NodeConfig::load(dir.path().join("missing.yaml")),
            Err(ConfigError::NotFound(_))
        ));
        assert!(matches!(
            NodeConfig::load(dir.path().join("node.ini")),
            Err(ConfigError::UnsupportedFormat(_))
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[mode\n").unwrap();
        assert!(matches!(
            NodeConfig::load(&broken),
            Err(ConfigError::Parse { format: "toml", .. })
        ));
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = NodeConfig::parse("  \n", ConfigFormat::Yaml).unwrap();
        assert!(config.mode.repository.is_none());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_REGISTRY_NAMESPACE, "staging"),
            (ENV_INSTANCE_ID, "node-9"),
            (ENV_LOG_LEVEL, "trace"),
        ]
        .into_iter()
        .collect();

        let mut config = NodeConfig::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        let repository = config.mode.repository.unwrap();
        assert_eq!(repository.repository_type, "memory");
        assert_eq!(repository.namespace, "staging");
        assert_eq!(config.instance.id, "node-9");
        assert_eq!(config.log.level, "trace");
    }
}
