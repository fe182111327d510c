use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::secrets::SecretRef;

/// Default config file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "stackctl.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project name, used as the prefix for every namespace and cloud resource
    pub project: String,
    pub provider: ProviderConfig,
    pub database: DatabaseConfig,
    pub app: AppConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Cloud provider key: "aws", "gcp" or "azure"
    pub name: String,
    pub region: String,
    #[serde(default = "default_node_count")]
    pub node_count: u32,
    #[serde(default = "default_machine_type")]
    pub machine_type: String,
    /// Directory holding the infrastructure definitions (default: "infra")
    #[serde(default = "default_infra_dir")]
    pub infra_dir: String,
}

fn default_node_count() -> u32 {
    3
}

fn default_machine_type() -> String {
    "medium".to_string()
}

fn default_infra_dir() -> String {
    "infra".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_engine")]
    pub engine: String,
    pub name: String,
    #[serde(default = "default_db_user")]
    pub username: String,
    /// Optional password source; a random password is generated when absent
    #[serde(default)]
    pub password: Option<SecretRef>,
    #[serde(default = "default_db_storage")]
    pub storage_gb: u32,
    /// Image run once per deploy to apply schema migrations
    #[serde(default)]
    pub migration_image: Option<String>,
}

fn default_db_engine() -> String {
    "postgres".to_string()
}

fn default_db_user() -> String {
    "app".to_string()
}

fn default_db_storage() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub image: String,
    pub version: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default = "default_app_port")]
    pub port: u16,
    /// Public hostname; required when TLS is enabled
    #[serde(default)]
    pub domain: Option<String>,
}

fn default_replicas() -> u32 {
    2
}

fn default_app_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretRef>,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub monitoring: bool,
    #[serde(default)]
    pub logging: bool,
    #[serde(default)]
    pub tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_monitoring_provider")]
    pub provider: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_monitoring_provider() -> String {
    "prometheus".to_string()
}

fn default_retention_days() -> u32 {
    15
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            provider: default_monitoring_provider(),
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Load configuration from an explicit path or `stackctl.yaml` in the
    /// working directory.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = path.unwrap_or(DEFAULT_CONFIG_FILE);
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: Config =
            serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            anyhow::bail!("project name must not be empty");
        }
        if self.provider.node_count == 0 {
            anyhow::bail!("provider.node_count must be at least 1");
        }
        if self.app.replicas == 0 {
            anyhow::bail!("app.replicas must be at least 1");
        }
        if self.features.tls && self.app.domain.is_none() {
            anyhow::bail!("features.tls requires app.domain to be set");
        }
        Ok(())
    }

    /// Directory holding persisted state and logs.
    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(".stackctl")
    }

    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }

    /// All secret references declared in the config, keyed by the name the
    /// resolved value is stored under in the deploy context.
    pub fn secret_refs(&self) -> Vec<(&'static str, &SecretRef)> {
        let mut refs = Vec::new();
        if let Some(ref pw) = self.database.password {
            refs.push(("database_password", pw));
        }
        if let Some(ref pw) = self.email.password {
            refs.push(("smtp_password", pw));
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r"
project: acme
provider:
  name: aws
  region: us-east-1
database:
  name: acme_db
app:
  image: ghcr.io/acme/app
  version: 1.4.0
"
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.project, "acme");
        assert_eq!(config.provider.node_count, 3);
        assert_eq!(config.database.engine, "postgres");
        assert_eq!(config.database.username, "app");
        assert_eq!(config.app.replicas, 2);
        assert!(!config.features.monitoring);
        assert!(!config.features.logging);
        assert!(!config.features.tls);
        config.validate().unwrap();
    }

    #[test]
    fn test_tls_requires_domain() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.features.tls = true;
        assert!(config.validate().is_err());

        config.app.domain = Some("app.acme.io".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_project_rejected() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.project = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_replicas_rejected() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.app.replicas = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_refs_collected() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert!(config.secret_refs().is_empty());

        config.database.password = Some("env:DB_PASSWORD".parse().unwrap());
        config.email.password = Some("plain:hunter2".parse().unwrap());
        let refs = config.secret_refs();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].0, "database_password");
        assert_eq!(refs[1].0, "smtp_password");
    }
}
