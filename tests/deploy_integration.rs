//! Integration tests for the deployment engine.
//!
//! These drive the real plan builder and real steps end-to-end against mock
//! collaborators, verifying:
//! - A full deploy records every sub-state and persists it
//! - Re-running resumes (infrastructure omitted, satisfied optionals skipped)
//! - A mid-run failure stops the run, rolls back only the failed step, and
//!   keeps prior progress on disk
//! - Teardown removes everything and the local state

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use stackctl::config::Config;
use stackctl::context::DeployContext;
use stackctl::deploy::{Deployer, Outcome};
use stackctl::ops::cluster::Workload;
use stackctl::ops::mock::{MockClusterOps, MockDataTierOps, MockProvisioner};
use stackctl::plan::build_plan;
use stackctl::progress::RecordingReporter;
use stackctl::state::{DeploymentState, StateStore};
use stackctl::teardown::{Teardown, TeardownOptions};

fn full_config() -> Config {
    let config: Config = serde_yaml::from_str(
        r"
project: acme
provider:
  name: aws
  region: us-east-1
database:
  name: acme_db
app:
  image: ghcr.io/acme/app
  version: 1.4.0
  domain: app.acme.io
email:
  smtp_host: smtp.acme.io
  from_address: noreply@acme.io
features:
  monitoring: true
  logging: false
  tls: true
",
    )
    .unwrap();
    config.validate().unwrap();
    config
}

struct Harness {
    ctx: DeployContext,
    reporter: RecordingReporter,
    provisioner: Arc<MockProvisioner>,
    cluster: Arc<MockClusterOps>,
    datatier: Arc<MockDataTierOps>,
}

fn harness(dir: &TempDir, config: Config, state: DeploymentState) -> Harness {
    let provisioner = Arc::new(MockProvisioner::new());
    let cluster = Arc::new(MockClusterOps::new());
    let datatier = Arc::new(MockDataTierOps::new());
    let reporter = RecordingReporter::new();

    let ctx = DeployContext::new(
        config,
        state,
        StateStore::new(dir.path()),
        Arc::clone(&provisioner) as _,
        Arc::clone(&cluster) as _,
        Arc::clone(&datatier) as _,
        Arc::new(reporter.clone()),
    );
    Harness {
        ctx,
        reporter,
        provisioner,
        cluster,
        datatier,
    }
}

#[tokio::test]
async fn test_full_deploy_records_and_persists_all_substates() {
    let dir = TempDir::new().unwrap();
    let config = full_config();
    let plan = build_plan(&config, &DeploymentState::new("acme"));
    assert_eq!(
        plan.names(),
        vec![
            "infrastructure",
            "core-services",
            "data-tier",
            "email-config",
            "monitoring",
            "migrations",
            "application",
            "endpoint",
            "tls",
        ]
    );

    let mut h = harness(&dir, config, DeploymentState::new("acme"));
    let mut deployer = Deployer::new(true).without_tool_checks();
    let outcome = deployer.execute(&plan, &mut h.ctx).await.unwrap();
    assert_eq!(outcome, Outcome::Completed);

    // credentials were checked before any mutation
    assert_eq!(h.provisioner.calls()[0], "check_credentials");

    let state = h.ctx.store.load().unwrap().unwrap();
    assert!(state.infrastructure_ready());
    assert_eq!(state.infrastructure.endpoint, "https://10.0.0.1:6443");
    assert!(state.database_ready());
    assert!(!state.database.password.is_empty());
    assert!(state.app_deployed());
    assert_eq!(state.app.version, "1.4.0");
    assert_eq!(state.app.url, "https://app.acme.io");
    assert!(state.monitoring_ready());
    assert_eq!(state.monitoring.dashboard_url, "https://grafana.app.acme.io");
    assert_eq!(state.endpoint.as_deref(), Some("203.0.113.9"));

    // email secret landed in the application namespace
    assert!(h
        .cluster
        .calls()
        .contains(&"apply_secret:acme/acme-smtp".to_string()));
    // migrations ran
    assert!(h.datatier.calls().contains(&"migrate".to_string()));
}

#[tokio::test]
async fn test_rerun_resumes_and_skips_satisfied_steps() {
    let dir = TempDir::new().unwrap();
    let config = full_config();

    let mut h = harness(&dir, config.clone(), DeploymentState::new("acme"));
    let plan = build_plan(&config, &h.ctx.state);
    let mut deployer = Deployer::new(true).without_tool_checks();
    deployer.execute(&plan, &mut h.ctx).await.unwrap();

    let persisted = h.ctx.store.load().unwrap().unwrap();
    let recorded_password = persisted.database.password.clone();

    // second run against the persisted state
    let plan = build_plan(&config, &persisted);
    assert!(!plan.contains("infrastructure"));

    let dir2_state = persisted;
    let mut h2 = harness(&dir, config, dir2_state);
    let mut deployer = Deployer::new(true).without_tool_checks();
    deployer.execute(&plan, &mut h2.ctx).await.unwrap();

    // no provisioning on resume, monitoring skipped as already satisfied
    assert!(!h2.provisioner.calls().contains(&"provision".to_string()));
    assert!(h2
        .reporter
        .events()
        .contains(&"skipped:monitoring".to_string()));

    // generated database password is stable across runs
    let state = h2.ctx.store.load().unwrap().unwrap();
    assert_eq!(state.database.password, recorded_password);
}

#[tokio::test]
async fn test_midrun_failure_stops_rolls_back_failed_step_and_keeps_progress() {
    let dir = TempDir::new().unwrap();
    let config = full_config();

    let mut h = harness(&dir, config.clone(), DeploymentState::new("acme"));
    h.cluster.fail_install_of(Workload::Application);

    let plan = build_plan(&config, &h.ctx.state);
    let mut deployer = Deployer::new(true).without_tool_checks();
    let err = deployer.execute(&plan, &mut h.ctx).await.unwrap_err();
    assert!(err.to_string().contains("application"));

    let events = h.reporter.events();
    assert!(events.contains(&"failed:application".to_string()));
    // later steps never started
    assert!(!events.iter().any(|e| e.starts_with("started:endpoint")));
    assert!(!events.iter().any(|e| e.starts_with("started:tls")));

    // only the failed step was rolled back
    let calls = h.cluster.calls();
    assert!(calls.contains(&"uninstall:app".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("uninstall:data-tier")));
    assert!(!h.provisioner.calls().contains(&"deprovision".to_string()));

    // prior progress survives on disk
    let state = h.ctx.store.load().unwrap().unwrap();
    assert!(state.infrastructure_ready());
    assert!(state.database_ready());
    assert!(!state.app_deployed());
}

#[tokio::test]
async fn test_teardown_after_deploy_removes_state() {
    let dir = TempDir::new().unwrap();
    let config = full_config();

    let mut h = harness(&dir, config.clone(), DeploymentState::new("acme"));
    let plan = build_plan(&config, &h.ctx.state);
    let mut deployer = Deployer::new(true).without_tool_checks();
    deployer.execute(&plan, &mut h.ctx).await.unwrap();

    let cluster = Arc::new(MockClusterOps::with_namespaces(&[
        "acme",
        "acme-data",
        "acme-monitoring",
    ]));
    let provisioner = Arc::new(MockProvisioner::new());
    let store = StateStore::new(dir.path());
    let teardown = Teardown::new(
        Arc::clone(&cluster) as _,
        Arc::clone(&provisioner) as _,
        store.clone(),
        Arc::new(RecordingReporter::new()),
    )
    .with_settle_delay(Duration::ZERO);

    let options = TeardownOptions {
        destroy_cluster: true,
        force: true,
    };
    teardown.run(&config, options).await.unwrap();

    let calls = cluster.calls();
    assert!(calls.contains(&"uninstall:app".to_string()));
    assert!(calls.contains(&"delete_namespace:acme-data".to_string()));
    assert!(calls.contains(&"delete_cluster_resources:acme".to_string()));
    assert!(provisioner.calls().contains(&"deprovision".to_string()));
    assert!(store.load().unwrap().is_none());
}
