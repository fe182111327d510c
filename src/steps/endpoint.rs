use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::Step;
use crate::context::DeployContext;
use crate::ops::cluster::Workload;

/// Resolves the ingress controller's external endpoint, records it in state
/// and checks that the configured domain resolves.
pub struct EndpointStep;

#[async_trait]
impl Step for EndpointStep {
    fn name(&self) -> &'static str {
        "endpoint"
    }

    fn description(&self) -> &'static str {
        "Verify the public endpoint"
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn apply(&self, ctx: &mut DeployContext) -> Result<()> {
        let project = ctx.config.project.clone();
        let namespace = Workload::Ingress.namespace(&project);
        let endpoint = ctx
            .cluster
            .service_endpoint(&namespace, "ingress-nginx-controller")
            .await?;

        if let Some(ref domain) = ctx.config.app.domain {
            // DNS propagation can lag the load balancer, so an unresolvable
            // domain is a warning rather than a failure
            match tokio::net::lookup_host((domain.as_str(), 443u16)).await {
                Ok(_) => tracing::info!(domain, "domain resolves"),
                Err(e) => {
                    tracing::warn!(domain, error = %e, "domain does not resolve yet; point DNS at {endpoint}");
                }
            }
        }

        if ctx.state.app.url.is_empty() {
            ctx.state.app.url = format!("http://{endpoint}");
        }
        ctx.state.endpoint = Some(endpoint);
        Ok(())
    }
}
