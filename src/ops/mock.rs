//! Mock collaborators for testing.
//!
//! Each mock records the calls made against it and can be scripted to fail,
//! so engine tests can assert ordering, fail-stop and rollback behavior
//! without touching real infrastructure.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::cluster::{ClusterOps, Workload};
use super::datatier::{DataTierOps, DatabaseEndpoint, DatabaseSpec};
use super::infra::{InfraOutputs, InfraSpec, Provisioner};
use super::OpsError;

fn mock_failure(what: &str) -> OpsError {
    OpsError::CommandFailed {
        tool: "mock".to_string(),
        detail: format!("scripted failure: {what}"),
    }
}

/// Mock provisioner.
#[derive(Default)]
pub struct MockProvisioner {
    /// Record of operations executed
    pub call_log: Arc<Mutex<Vec<String>>>,
    /// Endpoint reported by provision
    pub endpoint: Arc<Mutex<String>>,
    /// Scripted failures by operation name
    pub fail: Arc<Mutex<HashSet<String>>>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        let mock = Self::default();
        *mock.endpoint.lock().unwrap() = "https://10.0.0.1:6443".to_string();
        mock
    }

    pub fn fail_on(&self, operation: &str) {
        self.fail.lock().unwrap().insert(operation.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }

    fn record(&self, operation: &str) -> Result<(), OpsError> {
        self.call_log.lock().unwrap().push(operation.to_string());
        if self.fail.lock().unwrap().contains(operation) {
            Err(mock_failure(operation))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn provision(&self, spec: &InfraSpec) -> Result<InfraOutputs, OpsError> {
        self.record("provision")?;
        Ok(InfraOutputs {
            cluster_name: format!("{}-cluster", spec.project),
            endpoint: self.endpoint.lock().unwrap().clone(),
        })
    }

    async fn deprovision(&self, _spec: &InfraSpec) -> Result<(), OpsError> {
        self.record("deprovision")
    }

    async fn await_ready(&self, _spec: &InfraSpec, _timeout: Duration) -> Result<(), OpsError> {
        self.record("await_ready")
    }

    async fn check_credentials(&self, _spec: &InfraSpec) -> Result<(), OpsError> {
        self.record("check_credentials")
    }
}

/// Mock cluster operations.
#[derive(Default)]
pub struct MockClusterOps {
    /// Record of operations executed
    pub call_log: Arc<Mutex<Vec<String>>>,
    /// Namespaces the mock cluster "has"
    pub namespaces: Arc<Mutex<Vec<String>>>,
    /// Namespaces whose deletion fails
    pub fail_delete: Arc<Mutex<HashSet<String>>>,
    /// Whether namespace listing fails
    pub fail_list: Arc<Mutex<bool>>,
    /// Namespaces that stay in Terminating after deletion
    pub stuck: Arc<Mutex<HashSet<String>>>,
    /// Workloads whose install fails
    pub fail_install: Arc<Mutex<HashSet<Workload>>>,
    /// Reported service endpoint
    pub endpoint: Arc<Mutex<String>>,
}

impl MockClusterOps {
    pub fn new() -> Self {
        let mock = Self::default();
        *mock.endpoint.lock().unwrap() = "203.0.113.9".to_string();
        mock
    }

    pub fn with_namespaces(namespaces: &[&str]) -> Self {
        let mock = Self::new();
        *mock.namespaces.lock().unwrap() =
            namespaces.iter().map(ToString::to_string).collect();
        mock
    }

    pub fn fail_delete_of(&self, namespace: &str) {
        self.fail_delete.lock().unwrap().insert(namespace.to_string());
    }

    pub fn fail_listing(&self) {
        *self.fail_list.lock().unwrap() = true;
    }

    pub fn mark_stuck(&self, namespace: &str) {
        self.stuck.lock().unwrap().insert(namespace.to_string());
    }

    pub fn fail_install_of(&self, workload: Workload) {
        self.fail_install.lock().unwrap().insert(workload);
    }

    pub fn calls(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }

    fn record(&self, operation: String) {
        self.call_log.lock().unwrap().push(operation);
    }
}

#[async_trait]
impl ClusterOps for MockClusterOps {
    async fn install(
        &self,
        _project: &str,
        workload: Workload,
        _values: &[(String, String)],
    ) -> Result<(), OpsError> {
        self.record(format!("install:{}", workload.release()));
        if self.fail_install.lock().unwrap().contains(&workload) {
            return Err(mock_failure(workload.release()));
        }
        Ok(())
    }

    async fn uninstall(&self, _project: &str, workload: Workload) -> Result<(), OpsError> {
        self.record(format!("uninstall:{}", workload.release()));
        Ok(())
    }

    async fn list_namespaces(&self, prefix: &str) -> Result<Vec<String>, OpsError> {
        self.record(format!("list_namespaces:{prefix}"));
        if *self.fail_list.lock().unwrap() {
            return Err(mock_failure("list_namespaces"));
        }
        Ok(self
            .namespaces
            .lock()
            .unwrap()
            .iter()
            .filter(|ns| ns.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), OpsError> {
        self.record(format!("delete_namespace:{name}"));
        if self.fail_delete.lock().unwrap().contains(name) {
            return Err(mock_failure(name));
        }
        if !self.stuck.lock().unwrap().contains(name) {
            self.namespaces.lock().unwrap().retain(|ns| ns != name);
        }
        Ok(())
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, OpsError> {
        self.record(format!("namespace_exists:{name}"));
        Ok(self.namespaces.lock().unwrap().iter().any(|ns| ns == name))
    }

    async fn force_finalize(&self, name: &str) -> Result<(), OpsError> {
        self.record(format!("force_finalize:{name}"));
        self.stuck.lock().unwrap().remove(name);
        self.namespaces.lock().unwrap().retain(|ns| ns != name);
        Ok(())
    }

    async fn delete_cluster_resources(&self, project: &str) -> Result<(), OpsError> {
        self.record(format!("delete_cluster_resources:{project}"));
        Ok(())
    }

    async fn apply_manifest(&self, _manifest: &str) -> Result<(), OpsError> {
        self.record("apply_manifest".to_string());
        Ok(())
    }

    async fn apply_secret(
        &self,
        namespace: &str,
        name: &str,
        _data: &[(String, String)],
    ) -> Result<(), OpsError> {
        self.record(format!("apply_secret:{namespace}/{name}"));
        Ok(())
    }

    async fn service_endpoint(&self, namespace: &str, service: &str) -> Result<String, OpsError> {
        self.record(format!("service_endpoint:{namespace}/{service}"));
        Ok(self.endpoint.lock().unwrap().clone())
    }
}

/// Mock data-tier operations.
#[derive(Default)]
pub struct MockDataTierOps {
    /// Record of operations executed
    pub call_log: Arc<Mutex<Vec<String>>>,
    /// Scripted failures by operation name
    pub fail: Arc<Mutex<HashSet<String>>>,
    /// Migration count reported by migrate
    pub applied_migrations: Arc<Mutex<u32>>,
}

impl MockDataTierOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, operation: &str) {
        self.fail.lock().unwrap().insert(operation.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }

    fn record(&self, operation: &str) -> Result<(), OpsError> {
        self.call_log.lock().unwrap().push(operation.to_string());
        if self.fail.lock().unwrap().contains(operation) {
            Err(mock_failure(operation))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DataTierOps for MockDataTierOps {
    async fn deploy(&self, spec: &DatabaseSpec) -> Result<DatabaseEndpoint, OpsError> {
        self.record("deploy")?;
        Ok(DatabaseEndpoint {
            host: format!("data-tier-postgresql.{}-data.svc.cluster.local", spec.project),
            port: 5432,
        })
    }

    async fn migrate(&self, _spec: &DatabaseSpec) -> Result<u32, OpsError> {
        self.record("migrate")?;
        Ok(*self.applied_migrations.lock().unwrap())
    }
}
