use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::Step;
use crate::context::DeployContext;
use crate::ops::cluster::Workload;

/// Materializes SMTP settings as a cluster secret in the application
/// namespace. A no-op when no SMTP host is configured.
pub struct EmailConfigStep;

#[async_trait]
impl Step for EmailConfigStep {
    fn name(&self) -> &'static str {
        "email-config"
    }

    fn description(&self) -> &'static str {
        "Configure outbound email credentials"
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn apply(&self, ctx: &mut DeployContext) -> Result<()> {
        let Some(smtp_host) = ctx.config.email.smtp_host.clone() else {
            tracing::debug!("no SMTP host configured, skipping email configuration");
            return Ok(());
        };

        let mut data = vec![
            ("SMTP_HOST".to_string(), smtp_host),
            ("SMTP_PORT".to_string(), ctx.config.email.smtp_port.to_string()),
        ];
        if let Some(ref from) = ctx.config.email.from_address {
            data.push(("SMTP_FROM".to_string(), from.clone()));
        }
        if let Some(ref user) = ctx.config.email.username {
            data.push(("SMTP_USER".to_string(), user.clone()));
        }
        if let Some(password) = ctx.secret("smtp_password") {
            data.push(("SMTP_PASSWORD".to_string(), password.to_string()));
        }

        let project = ctx.config.project.clone();
        let namespace = Workload::Application.namespace(&project);
        let secret_name = format!("{project}-smtp");
        ctx.cluster
            .apply_secret(&namespace, &secret_name, &data)
            .await?;
        Ok(())
    }
}
