//! Plan builder.
//!
//! Turns config plus current state into the ordered list of steps for one
//! run. The plan is a total order, not a DAG: the only real dependencies in
//! this domain are "infrastructure before everything" and "TLS after
//! everything", so anything more elaborate would be machinery without a
//! payoff. Built fresh every run, immutable once built.

use crate::config::Config;
use crate::progress::PlanEntry;
use crate::state::DeploymentState;
use crate::steps::{
    AppDeployStep, CoreServicesStep, DataTierStep, EmailConfigStep, EndpointStep,
    InfrastructureStep, LoggingStep, MigrationStep, MonitoringStep, Step, TlsStep,
};

pub struct Plan {
    steps: Vec<Box<dyn Step>>,
}

impl Plan {
    pub fn from_steps(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn entries(&self) -> Vec<PlanEntry> {
        self.steps
            .iter()
            .map(|s| PlanEntry {
                name: s.name(),
                description: s.description(),
                estimate: s.estimate(),
            })
            .collect()
    }
}

/// Build the plan for one run.
pub fn build_plan(config: &Config, state: &DeploymentState) -> Plan {
    let mut steps: Vec<Box<dyn Step>> = Vec::new();

    // Already-provisioned infrastructure is the resumability case: the
    // recorded endpoint is the completion signal, so the step is omitted
    // entirely rather than skipped at execution time.
    if !state.infrastructure_ready() {
        steps.push(Box::new(InfrastructureStep));
    }

    steps.push(Box::new(CoreServicesStep));
    steps.push(Box::new(DataTierStep));
    steps.push(Box::new(EmailConfigStep));

    if config.features.monitoring {
        steps.push(Box::new(MonitoringStep));
    }
    if config.features.logging {
        steps.push(Box::new(LoggingStep));
    }

    steps.push(Box::new(MigrationStep));
    steps.push(Box::new(AppDeployStep));
    steps.push(Box::new(EndpointStep));

    // TLS last: certificate issuance depends on the ingress and every other
    // routable hostname already existing
    if config.features.tls {
        steps.push(Box::new(TlsStep));
    }

    Plan::from_steps(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        serde_yaml::from_str(
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
",
        )
        .unwrap()
    }

    #[test]
    fn test_full_plan_with_monitoring_and_tls() {
        let mut config = test_config();
        config.features.monitoring = true;
        config.features.tls = true;
        let state = DeploymentState::new("acme");

        let plan = build_plan(&config, &state);
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
    }

    #[test]
    fn test_infrastructure_omitted_when_endpoint_recorded() {
        let mut config = test_config();
        config.features.monitoring = true;
        config.features.tls = true;
        let mut state = DeploymentState::new("acme");
        state.infrastructure.endpoint = "https://10.0.0.1:6443".to_string();

        let plan = build_plan(&config, &state);
        assert!(!plan.contains("infrastructure"));
        assert_eq!(
            plan.names(),
            vec![
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
    }

    #[test]
    fn test_monitoring_gated_by_feature() {
        let config = test_config();
        let state = DeploymentState::new("acme");
        let plan = build_plan(&config, &state);
        assert!(!plan.contains("monitoring"));

        let mut config = test_config();
        config.features.monitoring = true;
        let plan = build_plan(&config, &state);
        let names = plan.names();
        assert_eq!(names.iter().filter(|n| **n == "monitoring").count(), 1);
    }

    #[test]
    fn test_logging_gated_by_feature() {
        let mut config = test_config();
        config.features.logging = true;
        let state = DeploymentState::new("acme");
        assert!(build_plan(&config, &state).contains("logging"));

        config.features.logging = false;
        assert!(!build_plan(&config, &state).contains("logging"));
    }

    #[test]
    fn test_tls_is_always_last() {
        let mut config = test_config();
        config.features.monitoring = true;
        config.features.logging = true;
        config.features.tls = true;
        let state = DeploymentState::new("acme");

        let plan = build_plan(&config, &state);
        assert_eq!(*plan.names().last().unwrap(), "tls");
    }

    #[test]
    fn test_monitoring_before_tls() {
        let mut config = test_config();
        config.features.monitoring = true;
        config.features.tls = true;
        let state = DeploymentState::new("acme");

        let plan = build_plan(&config, &state);
        let names = plan.names();
        let monitoring = names.iter().position(|n| *n == "monitoring").unwrap();
        let tls = names.iter().position(|n| *n == "tls").unwrap();
        assert!(monitoring < tls);
    }

    #[test]
    fn test_plan_entries_expose_metadata() {
        let config = test_config();
        let state = DeploymentState::new("acme");
        let plan = build_plan(&config, &state);

        let entries = plan.entries();
        assert_eq!(entries.len(), plan.len());
        assert!(entries.iter().all(|e| !e.description.is_empty()));
    }
}
