use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::Step;
use crate::context::DeployContext;
use crate::ops::cluster::Workload;

/// Installs the log aggregation stack. Optional, gated by `features.logging`.
/// Leaves no trace in state; the install itself is convergent.
pub struct LoggingStep;

#[async_trait]
impl Step for LoggingStep {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn description(&self) -> &'static str {
        "Install the log aggregation stack"
    }

    fn required(&self) -> bool {
        false
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(180)
    }

    async fn apply(&self, ctx: &mut DeployContext) -> Result<()> {
        let project = ctx.config.project.clone();
        ctx.cluster.install(&project, Workload::Logging, &[]).await?;
        Ok(())
    }
}
