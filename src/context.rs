//! The deployment context.
//!
//! One mutable bundle of config, resolved secrets, collaborator handles and
//! in-progress state, exclusively owned by the running engine and passed by
//! mutable borrow to every step. Nothing outside this struct is shared
//! between steps.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::ops::cluster::ClusterOps;
use crate::ops::datatier::{DataTierOps, DatabaseSpec};
use crate::ops::infra::{InfraSpec, Provisioner};
use crate::progress::ProgressReporter;
use crate::state::{DeploymentState, StateStore};

pub struct DeployContext {
    pub config: Config,
    /// Secrets resolved during pre-flight, keyed by config-defined names
    pub secrets: HashMap<String, String>,
    pub state: DeploymentState,
    pub store: StateStore,
    pub provisioner: Arc<dyn Provisioner>,
    pub cluster: Arc<dyn ClusterOps>,
    pub datatier: Arc<dyn DataTierOps>,
    pub reporter: Arc<dyn ProgressReporter>,
    cancelled: Arc<AtomicBool>,
}

impl DeployContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        state: DeploymentState,
        store: StateStore,
        provisioner: Arc<dyn Provisioner>,
        cluster: Arc<dyn ClusterOps>,
        datatier: Arc<dyn DataTierOps>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            config,
            secrets: HashMap::new(),
            state,
            store,
            provisioner,
            cluster,
            datatier,
            reporter,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn secret(&self, name: &str) -> Option<&str> {
        self.secrets.get(name).map(String::as_str)
    }

    pub fn infra_spec(&self) -> InfraSpec {
        InfraSpec {
            project: self.config.project.clone(),
            provider: self.config.provider.name.clone(),
            region: self.config.provider.region.clone(),
            node_count: self.config.provider.node_count,
            machine_type: self.config.provider.machine_type.clone(),
            infra_dir: self.config.provider.infra_dir.clone(),
        }
    }

    /// Database password: the resolved secret if one was configured, the
    /// already-recorded password on re-runs, otherwise freshly generated.
    pub fn database_password(&self) -> String {
        if let Some(pw) = self.secret("database_password") {
            return pw.to_string();
        }
        if !self.state.database.password.is_empty() {
            return self.state.database.password.clone();
        }
        generate_password()
    }

    pub fn database_spec(&self) -> DatabaseSpec {
        DatabaseSpec {
            project: self.config.project.clone(),
            engine: self.config.database.engine.clone(),
            name: self.config.database.name.clone(),
            username: self.config.database.username.clone(),
            password: self.database_password(),
            storage_gb: self.config.database.storage_gb,
            migration_image: self.config.database.migration_image.clone(),
        }
    }
}

/// Random credential for generated database/dashboard passwords.
pub fn generate_password() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::mock::{MockClusterOps, MockDataTierOps, MockProvisioner};
    use crate::progress::RecordingReporter;
    use tempfile::TempDir;

    fn test_context(dir: &TempDir) -> DeployContext {
        let config: Config = serde_yaml::from_str(
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
",
        )
        .unwrap();
        let state = DeploymentState::new(&config.project);
        let store = StateStore::new(dir.path());
        DeployContext::new(
            config,
            state,
            store,
            Arc::new(MockProvisioner::new()),
            Arc::new(MockClusterOps::new()),
            Arc::new(MockDataTierOps::new()),
            Arc::new(RecordingReporter::new()),
        )
    }

    #[test]
    fn test_database_password_prefers_secret() {
        let dir = TempDir::new().unwrap();
        let mut ctx = test_context(&dir);
        ctx.state.database.password = "recorded".to_string();
        ctx.secrets
            .insert("database_password".to_string(), "from-secret".to_string());
        assert_eq!(ctx.database_password(), "from-secret");
    }

    #[test]
    fn test_database_password_reuses_recorded() {
        let dir = TempDir::new().unwrap();
        let mut ctx = test_context(&dir);
        ctx.state.database.password = "recorded".to_string();
        assert_eq!(ctx.database_password(), "recorded");
    }

    #[test]
    fn test_database_password_generated_once_recorded() {
        let dir = TempDir::new().unwrap();
        let ctx = test_context(&dir);
        let generated = ctx.database_password();
        assert_eq!(generated.len(), 32);
    }

    #[test]
    fn test_cancel_flag_shared() {
        let dir = TempDir::new().unwrap();
        let ctx = test_context(&dir);
        assert!(!ctx.is_cancelled());
        ctx.cancel_flag()
            .store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(ctx.is_cancelled());
    }
}
