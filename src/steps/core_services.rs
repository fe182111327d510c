use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::Step;
use crate::context::DeployContext;
use crate::ops::cluster::Workload;

/// Installs the ingress controller and the cluster autoscaler. Both installs
/// converge, so re-running this step on an existing deployment is a no-op.
pub struct CoreServicesStep;

#[async_trait]
impl Step for CoreServicesStep {
    fn name(&self) -> &'static str {
        "core-services"
    }

    fn description(&self) -> &'static str {
        "Install ingress controller and autoscaler"
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(180)
    }

    async fn apply(&self, ctx: &mut DeployContext) -> Result<()> {
        let project = ctx.config.project.clone();
        ctx.cluster.install(&project, Workload::Ingress, &[]).await?;

        let autoscaler_values = vec![(
            "autoDiscovery.clusterName".to_string(),
            ctx.state.infrastructure.cluster_name.clone(),
        )];
        ctx.cluster
            .install(&project, Workload::Autoscaler, &autoscaler_values)
            .await?;
        Ok(())
    }
}
