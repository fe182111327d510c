use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::Step;
use crate::context::DeployContext;
use crate::ops::cluster::Workload;
use crate::state::DatabaseState;

/// Deploys the database and records its endpoint and credentials in state.
pub struct DataTierStep;

#[async_trait]
impl Step for DataTierStep {
    fn name(&self) -> &'static str {
        "data-tier"
    }

    fn description(&self) -> &'static str {
        "Deploy the database"
    }

    fn reversible(&self) -> bool {
        true
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(240)
    }

    async fn apply(&self, ctx: &mut DeployContext) -> Result<()> {
        let spec = ctx.database_spec();
        let endpoint = ctx.datatier.deploy(&spec).await?;

        ctx.state.database = DatabaseState {
            engine: spec.engine,
            host: endpoint.host,
            port: endpoint.port,
            name: spec.name,
            username: spec.username,
            password: spec.password,
        };
        Ok(())
    }

    async fn compensate(&self, ctx: &mut DeployContext) -> Result<()> {
        let project = ctx.config.project.clone();
        ctx.cluster.uninstall(&project, Workload::DataTier).await?;
        ctx.state.database = DatabaseState::default();
        Ok(())
    }
}

/// Runs schema migrations against the deployed database.
pub struct MigrationStep;

#[async_trait]
impl Step for MigrationStep {
    fn name(&self) -> &'static str {
        "migrations"
    }

    fn description(&self) -> &'static str {
        "Apply database schema migrations"
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn apply(&self, ctx: &mut DeployContext) -> Result<()> {
        let spec = ctx.database_spec();
        let applied = ctx.datatier.migrate(&spec).await?;
        tracing::info!(applied, "schema migrations applied");
        Ok(())
    }
}
