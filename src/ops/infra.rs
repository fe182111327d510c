//! Infrastructure provisioning collaborator.

use async_trait::async_trait;
use std::time::Duration;

use super::{run_tool_checked, OpsError};

/// Inputs for provisioning, derived from config.
#[derive(Debug, Clone)]
pub struct InfraSpec {
    pub project: String,
    pub provider: String,
    pub region: String,
    pub node_count: u32,
    pub machine_type: String,
    /// Working directory holding the infrastructure definitions
    pub infra_dir: String,
}

/// What provisioning produced.
#[derive(Debug, Clone)]
pub struct InfraOutputs {
    pub cluster_name: String,
    pub endpoint: String,
}

/// Contract for creating and destroying the cluster. Operations are
/// idempotent: provisioning an existing cluster converges, destroying a
/// missing one succeeds.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self, spec: &InfraSpec) -> Result<InfraOutputs, OpsError>;

    async fn deprovision(&self, spec: &InfraSpec) -> Result<(), OpsError>;

    /// Poll until the cluster answers, or time out.
    async fn await_ready(&self, spec: &InfraSpec, timeout: Duration) -> Result<(), OpsError>;

    /// Verify cloud credentials before anything is mutated.
    async fn check_credentials(&self, spec: &InfraSpec) -> Result<(), OpsError>;
}

/// Real implementation shelling out to `terraform` (and `kubectl` for the
/// readiness poll).
pub struct TerraformProvisioner;

const READY_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[async_trait]
impl Provisioner for TerraformProvisioner {
    async fn provision(&self, spec: &InfraSpec) -> Result<InfraOutputs, OpsError> {
        let chdir = format!("-chdir={}", spec.infra_dir);
        run_tool_checked("terraform", &[&chdir, "init", "-input=false", "-no-color"]).await?;

        let node_count = format!("node_count={}", spec.node_count);
        let region = format!("region={}", spec.region);
        let machine_type = format!("machine_type={}", spec.machine_type);
        let project = format!("project={}", spec.project);
        run_tool_checked(
            "terraform",
            &[
                &chdir,
                "apply",
                "-auto-approve",
                "-input=false",
                "-no-color",
                "-var",
                &project,
                "-var",
                &region,
                "-var",
                &node_count,
                "-var",
                &machine_type,
            ],
        )
        .await?;

        let endpoint =
            run_tool_checked("terraform", &[&chdir, "output", "-raw", "cluster_endpoint"]).await?;
        let cluster_name =
            run_tool_checked("terraform", &[&chdir, "output", "-raw", "cluster_name"]).await?;
        Ok(InfraOutputs {
            cluster_name,
            endpoint,
        })
    }

    async fn deprovision(&self, spec: &InfraSpec) -> Result<(), OpsError> {
        let chdir = format!("-chdir={}", spec.infra_dir);
        let project = format!("project={}", spec.project);
        let region = format!("region={}", spec.region);
        run_tool_checked(
            "terraform",
            &[
                &chdir,
                "destroy",
                "-auto-approve",
                "-input=false",
                "-no-color",
                "-var",
                &project,
                "-var",
                &region,
            ],
        )
        .await?;
        Ok(())
    }

    async fn await_ready(&self, _spec: &InfraSpec, timeout: Duration) -> Result<(), OpsError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if run_tool_checked("kubectl", &["get", "nodes", "--no-headers"])
                .await
                .is_ok()
            {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(OpsError::Timeout("cluster readiness".to_string()));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn check_credentials(&self, spec: &InfraSpec) -> Result<(), OpsError> {
        match spec.provider.as_str() {
            "aws" => {
                run_tool_checked("aws", &["sts", "get-caller-identity", "--output", "json"])
                    .await?;
            }
            "gcp" => {
                run_tool_checked("gcloud", &["auth", "print-access-token", "--quiet"]).await?;
            }
            "azure" => {
                run_tool_checked("az", &["account", "show", "--output", "json"]).await?;
            }
            other => {
                tracing::debug!(provider = other, "no credential check for provider");
            }
        }
        Ok(())
    }
}
