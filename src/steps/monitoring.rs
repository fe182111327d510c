use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::Step;
use crate::context::{generate_password, DeployContext};
use crate::ops::cluster::Workload;
use crate::state::{DeploymentState, MonitoringState};

/// Installs the monitoring stack and records the dashboard location plus a
/// generated admin password. Optional, gated by `features.monitoring`.
pub struct MonitoringStep;

#[async_trait]
impl Step for MonitoringStep {
    fn name(&self) -> &'static str {
        "monitoring"
    }

    fn description(&self) -> &'static str {
        "Install the monitoring stack"
    }

    fn required(&self) -> bool {
        false
    }

    fn reversible(&self) -> bool {
        true
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(300)
    }

    fn completed_in(&self, state: &DeploymentState) -> bool {
        state.monitoring_ready()
    }

    async fn apply(&self, ctx: &mut DeployContext) -> Result<()> {
        let project = ctx.config.project.clone();
        // Keep the recorded password stable across re-runs
        let admin_password = if ctx.state.monitoring.admin_password.is_empty() {
            generate_password()
        } else {
            ctx.state.monitoring.admin_password.clone()
        };

        let values = vec![
            (
                "grafana.adminPassword".to_string(),
                admin_password.clone(),
            ),
            (
                "prometheus.prometheusSpec.retention".to_string(),
                format!("{}d", ctx.config.monitoring.retention_days),
            ),
        ];
        ctx.cluster
            .install(&project, Workload::Monitoring, &values)
            .await?;

        let dashboard_url = match ctx.config.app.domain {
            Some(ref domain) => format!("https://grafana.{domain}"),
            None => {
                let namespace = Workload::Monitoring.namespace(&project);
                let host = ctx
                    .cluster
                    .service_endpoint(&namespace, "monitoring-grafana")
                    .await?;
                format!("http://{host}")
            }
        };

        ctx.state.monitoring = MonitoringState {
            enabled: true,
            provider: ctx.config.monitoring.provider.clone(),
            dashboard_url,
            admin_password,
        };
        Ok(())
    }

    async fn compensate(&self, ctx: &mut DeployContext) -> Result<()> {
        let project = ctx.config.project.clone();
        ctx.cluster.uninstall(&project, Workload::Monitoring).await?;
        ctx.state.monitoring = MonitoringState::default();
        Ok(())
    }
}
