//! Persisted deployment state.
//!
//! One JSON document at `.stackctl/state.json` records everything the tool
//! has accomplished so far. There is no completed-steps ledger: completion is
//! inferred from the state content itself (a recorded cluster endpoint means
//! the infrastructure step is done), which is what makes interrupted runs
//! resumable. Single-writer, no locking; concurrent runs against the same
//! directory are unsupported.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentState {
    pub project: String,
    /// stackctl version that wrote this document
    pub version: String,
    pub deployment_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub infrastructure: InfraState,
    #[serde(default)]
    pub database: DatabaseState,
    #[serde(default)]
    pub app: AppState,
    #[serde(default)]
    pub monitoring: MonitoringState,
    /// Externally reachable endpoint, recorded by endpoint verification
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfraState {
    pub provider: String,
    pub region: String,
    pub cluster_name: String,
    /// Non-empty endpoint is the completion signal for infrastructure
    pub endpoint: String,
    pub node_count: u32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseState {
    pub engine: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppState {
    pub deployed: bool,
    pub version: String,
    pub url: String,
    pub replicas: u32,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringState {
    pub enabled: bool,
    pub provider: String,
    pub dashboard_url: String,
    pub admin_password: String,
}

impl DeploymentState {
    pub fn new(project: &str) -> Self {
        let now = Utc::now();
        Self {
            project: project.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            deployment_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            infrastructure: InfraState::default(),
            database: DatabaseState::default(),
            app: AppState::default(),
            monitoring: MonitoringState::default(),
            endpoint: None,
        }
    }

    /// Completion signals, inferred structurally from state content.
    pub fn infrastructure_ready(&self) -> bool {
        !self.infrastructure.endpoint.is_empty()
    }

    pub fn database_ready(&self) -> bool {
        !self.database.host.is_empty()
    }

    pub fn app_deployed(&self) -> bool {
        self.app.deployed
    }

    pub fn monitoring_ready(&self) -> bool {
        self.monitoring.enabled && !self.monitoring.dashboard_url.is_empty()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Load/save access to the state file. Whole-file overwrite on save, no
/// merge semantics.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_path(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    /// Load the persisted state, or `None` when no deployment exists yet.
    pub fn load(&self) -> Result<Option<DeploymentState>> {
        let path = self.file_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        let state = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state file {}", path.display()))?;
        Ok(Some(state))
    }

    pub fn save(&self, state: &DeploymentState) -> Result<()> {
        fs::create_dir_all(&self.dir).context("Failed to create state directory")?;
        let contents = serde_json::to_string_pretty(state)?;
        fs::write(self.file_path(), contents).context("Failed to write state file")?;
        Ok(())
    }

    /// Remove local state artifacts. Idempotent.
    pub fn remove(&self) -> Result<()> {
        let path = self.file_path();
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove state file {}", path.display()))?;
        }
        Ok(())
    }
}
