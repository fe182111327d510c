use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::Step;
use crate::context::DeployContext;
use crate::ops::cluster::Workload;
use crate::state::AppState;

/// Deploys the application workload and records version, URL and replica
/// count in state.
pub struct AppDeployStep;

#[async_trait]
impl Step for AppDeployStep {
    fn name(&self) -> &'static str {
        "application"
    }

    fn description(&self) -> &'static str {
        "Deploy the application"
    }

    fn reversible(&self) -> bool {
        true
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(180)
    }

    async fn apply(&self, ctx: &mut DeployContext) -> Result<()> {
        let project = ctx.config.project.clone();
        let app = &ctx.config.app;

        let mut values = vec![
            ("image.repository".to_string(), app.image.clone()),
            ("image.tag".to_string(), app.version.clone()),
            ("replicaCount".to_string(), app.replicas.to_string()),
            ("service.port".to_string(), app.port.to_string()),
        ];
        if let Some(ref domain) = app.domain {
            values.push(("ingress.host".to_string(), domain.clone()));
        }
        ctx.cluster
            .install(&project, Workload::Application, &values)
            .await?;

        let url = match app.domain {
            Some(ref domain) if ctx.config.features.tls => format!("https://{domain}"),
            Some(ref domain) => format!("http://{domain}"),
            None => String::new(), // filled in by endpoint verification
        };
        let endpoints = if url.is_empty() {
            Vec::new()
        } else {
            vec![format!("{url}/api"), format!("{url}/healthz")]
        };

        ctx.state.app = AppState {
            deployed: true,
            version: app.version.clone(),
            url,
            replicas: app.replicas,
            endpoints,
        };
        Ok(())
    }

    async fn compensate(&self, ctx: &mut DeployContext) -> Result<()> {
        let project = ctx.config.project.clone();
        ctx.cluster.uninstall(&project, Workload::Application).await?;
        ctx.state.app = AppState::default();
        Ok(())
    }
}
