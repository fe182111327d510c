use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::Step;
use crate::context::DeployContext;
use crate::ops::cluster::Workload;

/// Installs cert-manager and requests a certificate for the configured
/// domain. Optional, gated by `features.tls`, and always ordered last:
/// issuance requires the ingress and every routable hostname to exist.
pub struct TlsStep;

#[async_trait]
impl Step for TlsStep {
    fn name(&self) -> &'static str {
        "tls"
    }

    fn description(&self) -> &'static str {
        "Issue TLS certificates"
    }

    fn required(&self) -> bool {
        false
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(120)
    }

    async fn apply(&self, ctx: &mut DeployContext) -> Result<()> {
        let project = ctx.config.project.clone();
        let domain = ctx
            .config
            .app
            .domain
            .clone()
            .context("TLS requires app.domain")?;

        ctx.cluster
            .install(&project, Workload::CertManager, &[])
            .await?;

        let app_namespace = Workload::Application.namespace(&project);
        let manifest = certificate_manifest(&project, &app_namespace, &domain);
        ctx.cluster.apply_manifest(&manifest).await?;
        Ok(())
    }
}

fn certificate_manifest(project: &str, namespace: &str, domain: &str) -> String {
    format!(
        r"apiVersion: cert-manager.io/v1
kind: ClusterIssuer
metadata:
  name: {project}-letsencrypt
spec:
  acme:
    server: https://acme-v02.api.letsencrypt.org/directory
    privateKeySecretRef:
      name: {project}-letsencrypt-key
    solvers:
      - http01:
          ingress:
            class: nginx
---
apiVersion: cert-manager.io/v1
kind: Certificate
metadata:
  name: {project}-tls
  namespace: {namespace}
spec:
  secretName: {project}-tls
  issuerRef:
    name: {project}-letsencrypt
    kind: ClusterIssuer
  dnsNames:
    - {domain}
    - grafana.{domain}
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_manifest_names_domain() {
        let manifest = certificate_manifest("acme", "acme", "app.acme.io");
        assert!(manifest.contains("- app.acme.io"));
        assert!(manifest.contains("- grafana.app.acme.io"));
        assert!(manifest.contains("name: acme-tls"));
        assert!(manifest.contains("namespace: acme"));
    }
}
