//! Configuration Loader
//!
//! Builds a [`KiorgaConfig`] from layered sources with the `config` crate.
//! The environment is passed in as a map so tests never touch process
//! globals.

use super::error::{ConfigResult, ConfigurationError};
use super::KiorgaConfig;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Variable naming an explicit configuration file
pub const CONFIG_PATH_VAR: &str = "KIORGA_CONFIG";

/// File picked up when [`CONFIG_PATH_VAR`] is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/kiorga.toml";

const ENV_PREFIX: &str = "KIORGA";
const ENV_SEPARATOR: &str = "__";

/// Deployment variable names and the prefixed keys they stand for
const LEGACY_VARIABLES: &[(&str, &[&str])] = &[
    ("TOPIC_LDA_TASKS", &["KIORGA__PRODUCER__TASK_TOPIC"]),
    ("TOPIC_SDA_BE_TASKS", &["KIORGA__DISPATCHER__DELEGATION_TOPIC"]),
    (
        "AGENT_ID_SDA_BE",
        &[
            "KIORGA__DISPATCHER__ASSIGNED_AGENT_ID",
            "KIORGA__WORKER__AGENT_ID",
        ],
    ),
    ("TOPIC_REPORTS", &["KIORGA__WORKER__REPORTS_TOPIC"]),
    ("DATABASE_URL", &["KIORGA__BACKEND__DATABASE_URL"]),
];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the process environment and the configured file
    pub fn load() -> ConfigResult<KiorgaConfig> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let file = Self::config_file(&env)?;
        Self::load_with(file.as_deref(), &env)
    }

    /// Load from an optional TOML file and an explicit environment map
    pub fn load_with(
        file: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> ConfigResult<KiorgaConfig> {
        let mut builder = Config::builder().add_source(Config::try_from(&KiorgaConfig::default())?);

        if let Some(path) = file {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(Some(Self::environment_overrides(env)?)),
        );

        let config: KiorgaConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            backend = ?config.backend.kind,
            delegation_topic = %config.dispatcher.delegation_topic,
            reports_topic = %config.worker.reports_topic,
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    /// Translate legacy names into prefixed keys; explicit prefixed
    /// variables take precedence over translated ones
    fn environment_overrides(
        env: &HashMap<String, String>,
    ) -> ConfigResult<HashMap<String, String>> {
        let mut overrides = HashMap::new();

        for (variable, keys) in LEGACY_VARIABLES {
            if let Some(value) = env.get(*variable).filter(|v| !v.is_empty()) {
                for key in *keys {
                    overrides.insert(key.to_string(), value.clone());
                }
            }
        }
        if let Some(port) = env.get("PORT").filter(|v| !v.is_empty()) {
            let port: u16 = port.parse().map_err(|_| {
                ConfigurationError::invalid_value("PORT", port.as_str(), "not a valid port number")
            })?;
            overrides.insert(
                "KIORGA__SERVER__BIND_ADDRESS".to_string(),
                format!("0.0.0.0:{port}"),
            );
        }

        let prefix = format!("{ENV_PREFIX}{ENV_SEPARATOR}");
        overrides.extend(
            env.iter()
                .filter(|(key, _)| key.starts_with(&prefix))
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        Ok(overrides)
    }

    /// File named by `KIORGA_CONFIG` (must exist), else the default path if present
    fn config_file(env: &HashMap<String, String>) -> ConfigResult<Option<PathBuf>> {
        match env.get(CONFIG_PATH_VAR).filter(|v| !v.is_empty()) {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(ConfigurationError::config_file_not_found(path));
                }
                Ok(Some(path))
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                Ok(path.exists().then_some(path))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = ConfigLoader::load_with(None, &HashMap::new()).unwrap();
        assert_eq!(config, KiorgaConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = toml_file(
            r#"
            [worker]
            reports_topic = "reports-from-file"
            simulated_work_ms = 10

            [messaging]
            publish_timeout_seconds = 5
            "#,
        );

        let config = ConfigLoader::load_with(Some(file.path()), &HashMap::new()).unwrap();
        assert_eq!(config.worker.reports_topic, "reports-from-file");
        assert_eq!(config.worker.simulated_work_ms, 10);
        assert_eq!(config.messaging.publish_timeout_seconds, 5);
        assert_eq!(config.dispatcher.delegation_topic, "sda-be-tasks");
    }

    #[test]
    fn test_legacy_variables_apply() {
        let config = ConfigLoader::load_with(
            None,
            &env(&[
                ("TOPIC_SDA_BE_TASKS", "delegations"),
                ("AGENT_ID_SDA_BE", "sda-7"),
                ("TOPIC_REPORTS", "reports"),
                ("PORT", "9090"),
            ]),
        )
        .unwrap();

        assert_eq!(config.dispatcher.delegation_topic, "delegations");
        assert_eq!(config.dispatcher.assigned_agent_id, "sda-7");
        assert_eq!(config.worker.agent_id, "sda-7");
        assert_eq!(config.worker.reports_topic, "reports");
        assert_eq!(config.server.bind_address, "0.0.0.0:9090");
    }

    #[test]
    fn test_prefixed_variables_win() {
        let file = toml_file("[worker]\nvalidate_tasks = true\n");
        let config = ConfigLoader::load_with(
            Some(file.path()),
            &env(&[
                ("TOPIC_REPORTS", "legacy-reports"),
                ("KIORGA__WORKER__REPORTS_TOPIC", "prefixed-reports"),
                ("KIORGA__WORKER__VALIDATE_TASKS", "false"),
                ("KIORGA__BACKEND__KIND", "postgres"),
                ("DATABASE_URL", "postgres://localhost/kiorga"),
            ]),
        )
        .unwrap();

        assert_eq!(config.worker.reports_topic, "prefixed-reports");
        assert!(!config.worker.validate_tasks);
        assert_eq!(config.backend.kind, BackendKind::Postgres);
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let err = ConfigLoader::load_with(None, &env(&[("PORT", "not-a-port")])).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));

        let err = ConfigLoader::load_with(None, &env(&[("KIORGA__BACKEND__KIND", "postgres")]))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingRequiredField { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = ConfigLoader::config_file(&env(&[(CONFIG_PATH_VAR, "/nonexistent/kiorga.toml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ConfigFileNotFound { .. }));
    }
}
