use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use super::Step;
use crate::context::DeployContext;
use crate::state::InfraState;

/// Provisions the cluster. Only planned when no cluster endpoint is recorded
/// in state yet.
pub struct InfrastructureStep;

/// How long to wait for the provisioned cluster to answer.
const READY_TIMEOUT: Duration = Duration::from_secs(600);

#[async_trait]
impl Step for InfrastructureStep {
    fn name(&self) -> &'static str {
        "infrastructure"
    }

    fn description(&self) -> &'static str {
        "Provision the Kubernetes cluster"
    }

    fn reversible(&self) -> bool {
        true
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(600)
    }

    async fn apply(&self, ctx: &mut DeployContext) -> Result<()> {
        let spec = ctx.infra_spec();
        let outputs = ctx.provisioner.provision(&spec).await?;
        ctx.provisioner.await_ready(&spec, READY_TIMEOUT).await?;

        ctx.state.infrastructure = InfraState {
            provider: spec.provider,
            region: spec.region,
            cluster_name: outputs.cluster_name,
            endpoint: outputs.endpoint,
            node_count: spec.node_count,
            created_at: Some(Utc::now()),
        };
        Ok(())
    }

    async fn compensate(&self, ctx: &mut DeployContext) -> Result<()> {
        let spec = ctx.infra_spec();
        ctx.provisioner.deprovision(&spec).await?;
        ctx.state.infrastructure = InfraState::default();
        Ok(())
    }
}
