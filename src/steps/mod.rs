//! Step contract and the concrete deployment steps.
//!
//! A step is one named unit of deployment work with a forward operation
//! (`apply`) and, when `reversible`, a compensating one (`compensate`).
//! Steps are constructed fresh for every run by the plan builder and hold no
//! data of their own; everything flows through the [`DeployContext`].

mod application;
mod core_services;
mod data_tier;
mod email;
mod endpoint;
mod infrastructure;
mod logging;
mod monitoring;
mod tls;

pub use application::AppDeployStep;
pub use core_services::CoreServicesStep;
pub use data_tier::{DataTierStep, MigrationStep};
pub use email::EmailConfigStep;
pub use endpoint::EndpointStep;
pub use infrastructure::InfrastructureStep;
pub use logging::LoggingStep;
pub use monitoring::MonitoringStep;
pub use tls::TlsStep;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::context::DeployContext;
use crate::state::DeploymentState;

#[async_trait]
pub trait Step: Send + Sync {
    /// Stable identifier, also used as the state-lookup key.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Optional steps may be skipped when already satisfied.
    fn required(&self) -> bool {
        true
    }

    /// Whether a compensating action exists.
    fn reversible(&self) -> bool {
        false
    }

    /// Rough duration, advisory only. Never enforced as a timeout.
    fn estimate(&self) -> Duration;

    /// Whether the persisted state already shows this step's outcome.
    fn completed_in(&self, _state: &DeploymentState) -> bool {
        false
    }

    async fn apply(&self, ctx: &mut DeployContext) -> Result<()>;

    async fn compensate(&self, _ctx: &mut DeployContext) -> Result<()> {
        Ok(())
    }
}
