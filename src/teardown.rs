//! Teardown engine.
//!
//! The reverse path has a genuinely different shape from deployment: four
//! ordered phases instead of a flat step list. Phase 1 uninstalls workloads
//! and phase 2 deletes their namespaces with bounded parallel fan-out, both
//! best-effort. Phase 3 sweeps project-scoped cluster resources, also
//! best-effort. Phase 4 destroys the infrastructure, only when explicitly
//! requested, and a failure there is fatal: leftover clusters cost money.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Config;
use crate::deploy::confirm;
use crate::ops::cluster::{ClusterOps, Workload};
use crate::ops::infra::{InfraSpec, Provisioner};
use crate::ops::OpsError;
use crate::progress::ProgressReporter;
use crate::state::StateStore;

/// Upper bound on concurrent namespace deletions.
const MAX_PARALLEL_DELETES: usize = 4;

/// How long to let namespace deletions settle before escalating to
/// finalizer removal.
const SETTLE_DELAY: Duration = Duration::from_secs(30);

/// Uninstall order for phase 1: application first, infrastructure-adjacent
/// services last.
const UNINSTALL_ORDER: [Workload; 7] = [
    Workload::Application,
    Workload::Monitoring,
    Workload::Logging,
    Workload::DataTier,
    Workload::CertManager,
    Workload::Autoscaler,
    Workload::Ingress,
];

#[derive(Debug, Clone, Copy, Default)]
pub struct TeardownOptions {
    /// Also destroy the cluster infrastructure (phase 4)
    pub destroy_cluster: bool,
    /// Skip confirmation prompts
    pub force: bool,
}

pub struct Teardown {
    cluster: Arc<dyn ClusterOps>,
    provisioner: Arc<dyn Provisioner>,
    store: StateStore,
    reporter: Arc<dyn ProgressReporter>,
    settle_delay: Duration,
}

impl Teardown {
    pub fn new(
        cluster: Arc<dyn ClusterOps>,
        provisioner: Arc<dyn Provisioner>,
        store: StateStore,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            cluster,
            provisioner,
            store,
            reporter,
            settle_delay: SETTLE_DELAY,
        }
    }

    /// Override the settle delay (tests).
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub async fn run(&self, config: &Config, options: TeardownOptions) -> Result<()> {
        let project = &config.project;

        self.reporter.phase("Phase 1/4: removing workloads");
        for workload in UNINSTALL_ORDER {
            if let Err(err) = self.cluster.uninstall(project, workload).await {
                warn!(workload = workload.release(), error = %err, "uninstall failed, continuing");
            }
        }

        self.reporter.phase("Phase 2/4: deleting namespaces");
        self.cleanup_namespaces(project).await;

        self.reporter.phase("Phase 3/4: deleting cluster-scoped resources");
        if let Err(err) = self.cluster.delete_cluster_resources(project).await {
            warn!(error = %err, "cluster resource cleanup failed, continuing");
        }

        if options.destroy_cluster {
            self.reporter.phase("Phase 4/4: destroying infrastructure");
            if !options.force
                && !confirm("Destroy the cluster infrastructure? This cannot be undone.")?
            {
                self.reporter.phase("Infrastructure left in place");
                return Ok(());
            }
            let spec = infra_spec(config);
            self.provisioner
                .deprovision(&spec)
                .await
                .context("infrastructure destroy failed")?;
        } else {
            self.reporter.phase("Phase 4/4: skipped (infrastructure kept)");
        }

        self.store.remove().context("failed to remove local state")?;
        self.reporter.phase("Teardown complete");
        Ok(())
    }

    /// Phase 2: delete all project namespaces with bounded fan-out, then
    /// escalate to finalizer removal for anything still terminating after
    /// the settle window. Best-effort like the other cleanup phases: a
    /// listing failure skips the namespace work but never aborts the run.
    async fn cleanup_namespaces(&self, project: &str) {
        let namespaces = match self.cluster.list_namespaces(project).await {
            Ok(namespaces) => namespaces,
            Err(err) => {
                warn!(error = %err, "namespace listing failed, skipping namespace cleanup");
                return;
            }
        };
        if namespaces.is_empty() {
            return;
        }

        let failures = delete_namespaces(&self.cluster, &namespaces).await;
        for (namespace, err) in &failures {
            warn!(namespace, error = %err, "namespace deletion failed");
        }

        // Kubernetes deletes namespaces asynchronously; give them one settle
        // window before treating them as stuck
        tokio::time::sleep(self.settle_delay).await;

        // Force-deletion is invasive, so stuck namespaces are handled one at
        // a time
        for namespace in &namespaces {
            match self.cluster.namespace_exists(namespace).await {
                Ok(true) => {
                    info!(namespace, "namespace stuck in terminating, removing finalizers");
                    if let Err(err) = self.cluster.force_finalize(namespace).await {
                        warn!(namespace, error = %err, "force finalize failed");
                    }
                }
                Ok(false) => {}
                Err(err) => warn!(namespace, error = %err, "namespace re-check failed"),
            }
        }
    }
}

/// Delete namespaces concurrently, one task each, bounded by a semaphore.
/// Per-namespace failures are aggregated over a channel; no deletion blocks
/// on a sibling's outcome.
pub(crate) async fn delete_namespaces(
    cluster: &Arc<dyn ClusterOps>,
    namespaces: &[String],
) -> Vec<(String, OpsError)> {
    let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_DELETES));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut tasks = JoinSet::new();

    for namespace in namespaces {
        let cluster = Arc::clone(cluster);
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();
        let namespace = namespace.clone();
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            if let Err(err) = cluster.delete_namespace(&namespace).await {
                let _ = tx.send((namespace, err));
            }
        });
    }
    drop(tx);

    // join barrier
    while tasks.join_next().await.is_some() {}

    let mut failures = Vec::new();
    while let Ok(failure) = rx.try_recv() {
        failures.push(failure);
    }
    failures
}

fn infra_spec(config: &Config) -> InfraSpec {
    InfraSpec {
        project: config.project.clone(),
        provider: config.provider.name.clone(),
        region: config.provider.region.clone(),
        node_count: config.provider.node_count,
        machine_type: config.provider.machine_type.clone(),
        infra_dir: config.provider.infra_dir.clone(),
    }
}
