//! Cluster operations collaborator.

use async_trait::async_trait;

use super::{run_tool, run_tool_checked, OpsError};

/// The named workloads stackctl installs into the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workload {
    Ingress,
    Autoscaler,
    DataTier,
    Logging,
    Monitoring,
    Application,
    CertManager,
}

impl Workload {
    /// Helm release name.
    pub fn release(self) -> &'static str {
        match self {
            Self::Ingress => "ingress-nginx",
            Self::Autoscaler => "autoscaler",
            Self::DataTier => "data-tier",
            Self::Logging => "logging",
            Self::Monitoring => "monitoring",
            Self::Application => "app",
            Self::CertManager => "cert-manager",
        }
    }

    /// Chart reference installed for this workload.
    pub fn chart(self) -> &'static str {
        match self {
            Self::Ingress => "ingress-nginx/ingress-nginx",
            Self::Autoscaler => "autoscaler/cluster-autoscaler",
            Self::DataTier => "bitnami/postgresql",
            Self::Logging => "grafana/loki-stack",
            Self::Monitoring => "prometheus-community/kube-prometheus-stack",
            Self::Application => "./charts/app",
            Self::CertManager => "jetstack/cert-manager",
        }
    }

    /// Namespace the workload lives in, prefixed with the project name.
    pub fn namespace(self, project: &str) -> String {
        match self {
            Self::Ingress | Self::Autoscaler => format!("{project}-system"),
            Self::DataTier => format!("{project}-data"),
            Self::Logging => format!("{project}-logging"),
            Self::Monitoring => format!("{project}-monitoring"),
            Self::Application => project.to_string(),
            Self::CertManager => format!("{project}-certs"),
        }
    }
}

/// Contract for installing workloads and cleaning up cluster resources.
/// Install and uninstall are idempotent per workload.
#[async_trait]
pub trait ClusterOps: Send + Sync {
    async fn install(
        &self,
        project: &str,
        workload: Workload,
        values: &[(String, String)],
    ) -> Result<(), OpsError>;

    async fn uninstall(&self, project: &str, workload: Workload) -> Result<(), OpsError>;

    async fn list_namespaces(&self, prefix: &str) -> Result<Vec<String>, OpsError>;

    async fn delete_namespace(&self, name: &str) -> Result<(), OpsError>;

    async fn namespace_exists(&self, name: &str) -> Result<bool, OpsError>;

    /// Strip finalizers from a namespace stuck in Terminating.
    async fn force_finalize(&self, name: &str) -> Result<(), OpsError>;

    /// Delete project-scoped cluster-wide objects (CRDs, PVs, cluster roles).
    async fn delete_cluster_resources(&self, project: &str) -> Result<(), OpsError>;

    /// Apply a raw manifest.
    async fn apply_manifest(&self, manifest: &str) -> Result<(), OpsError>;

    /// Create or update an opaque secret in a namespace.
    async fn apply_secret(
        &self,
        namespace: &str,
        name: &str,
        data: &[(String, String)],
    ) -> Result<(), OpsError>;

    /// External endpoint of a service (load balancer IP or hostname).
    async fn service_endpoint(&self, namespace: &str, service: &str) -> Result<String, OpsError>;
}

/// Real implementation shelling out to `helm` and `kubectl`.
pub struct HelmClusterOps;

#[async_trait]
impl ClusterOps for HelmClusterOps {
    async fn install(
        &self,
        project: &str,
        workload: Workload,
        values: &[(String, String)],
    ) -> Result<(), OpsError> {
        let namespace = workload.namespace(project);
        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            workload.release().to_string(),
            workload.chart().to_string(),
            "--namespace".to_string(),
            namespace,
            "--create-namespace".to_string(),
            "--wait".to_string(),
        ];
        for (key, value) in values {
            args.push("--set".to_string());
            args.push(format!("{key}={value}"));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_tool_checked("helm", &arg_refs).await?;
        Ok(())
    }

    async fn uninstall(&self, project: &str, workload: Workload) -> Result<(), OpsError> {
        let namespace = workload.namespace(project);
        let output = run_tool(
            "helm",
            &["uninstall", workload.release(), "--namespace", &namespace],
        )
        .await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Uninstalling a release that was never installed is a no-op
        if stderr.contains("not found") {
            return Ok(());
        }
        Err(OpsError::CommandFailed {
            tool: "helm".to_string(),
            detail: stderr.trim().to_string(),
        })
    }

    async fn list_namespaces(&self, prefix: &str) -> Result<Vec<String>, OpsError> {
        let stdout = run_tool_checked("kubectl", &["get", "namespaces", "-o", "name"]).await?;
        Ok(stdout
            .lines()
            .filter_map(|line| line.strip_prefix("namespace/"))
            .filter(|name| name.starts_with(prefix))
            .map(ToString::to_string)
            .collect())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), OpsError> {
        run_tool_checked(
            "kubectl",
            &["delete", "namespace", name, "--ignore-not-found", "--wait=false"],
        )
        .await?;
        Ok(())
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, OpsError> {
        let output = run_tool("kubectl", &["get", "namespace", name, "-o", "name"]).await?;
        Ok(output.status.success())
    }

    async fn force_finalize(&self, name: &str) -> Result<(), OpsError> {
        run_tool_checked(
            "kubectl",
            &[
                "patch",
                "namespace",
                name,
                "--type=merge",
                "-p",
                r#"{"metadata":{"finalizers":[]}}"#,
            ],
        )
        .await?;
        Ok(())
    }

    async fn delete_cluster_resources(&self, project: &str) -> Result<(), OpsError> {
        let selector = format!("app.kubernetes.io/part-of={project}");
        run_tool_checked(
            "kubectl",
            &[
                "delete",
                "crd,pv,clusterrole,clusterrolebinding",
                "-l",
                &selector,
                "--ignore-not-found",
            ],
        )
        .await?;
        Ok(())
    }

    async fn apply_manifest(&self, manifest: &str) -> Result<(), OpsError> {
        use tokio::io::AsyncWriteExt;

        let mut child = tokio::process::Command::new("kubectl")
            .args(["apply", "-f", "-"])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OpsError::ToolMissing("kubectl".to_string())
                } else {
                    OpsError::CommandFailed {
                        tool: "kubectl".to_string(),
                        detail: e.to_string(),
                    }
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(manifest.as_bytes())
                .await
                .map_err(|e| OpsError::CommandFailed {
                    tool: "kubectl".to_string(),
                    detail: e.to_string(),
                })?;
        }

        let output = child.wait_with_output().await.map_err(|e| OpsError::CommandFailed {
            tool: "kubectl".to_string(),
            detail: e.to_string(),
        })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(OpsError::CommandFailed {
                tool: "kubectl".to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn apply_secret(
        &self,
        namespace: &str,
        name: &str,
        data: &[(String, String)],
    ) -> Result<(), OpsError> {
        let mut args = vec![
            "create".to_string(),
            "secret".to_string(),
            "generic".to_string(),
            name.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--dry-run=client".to_string(),
            "-o".to_string(),
            "yaml".to_string(),
        ];
        for (key, value) in data {
            args.push(format!("--from-literal={key}={value}"));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        // create --dry-run | apply makes the operation an upsert
        let manifest = run_tool_checked("kubectl", &arg_refs).await?;
        self.apply_manifest(&manifest).await
    }

    async fn service_endpoint(&self, namespace: &str, service: &str) -> Result<String, OpsError> {
        let jsonpath = "{.status.loadBalancer.ingress[0].ip}{.status.loadBalancer.ingress[0].hostname}";
        let output = run_tool_checked(
            "kubectl",
            &[
                "get",
                "service",
                service,
                "--namespace",
                namespace,
                "-o",
                &format!("jsonpath={jsonpath}"),
            ],
        )
        .await?;
        if output.is_empty() {
            Err(OpsError::NotFound(format!("{namespace}/{service} endpoint")))
        } else {
            Ok(output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_namespaces_share_project_prefix() {
        for workload in [
            Workload::Ingress,
            Workload::Autoscaler,
            Workload::DataTier,
            Workload::Logging,
            Workload::Monitoring,
            Workload::Application,
            Workload::CertManager,
        ] {
            assert!(
                workload.namespace("acme").starts_with("acme"),
                "{workload:?} namespace not project-prefixed"
            );
        }
    }

    #[test]
    fn test_workload_releases_are_distinct() {
        let releases = [
            Workload::Ingress.release(),
            Workload::Autoscaler.release(),
            Workload::DataTier.release(),
            Workload::Logging.release(),
            Workload::Monitoring.release(),
            Workload::Application.release(),
            Workload::CertManager.release(),
        ];
        let unique: std::collections::HashSet<_> = releases.iter().collect();
        assert_eq!(unique.len(), releases.len());
    }
}
