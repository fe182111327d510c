//! Execution engine.
//!
//! Runs a [`Plan`] against a [`DeployContext`]: confirmation, pre-flight
//! checks, then each step in order with state persisted after every success.
//! The first failure stops the run; only the failed step is offered for
//! rollback. Prior successful steps are deliberately left in place: most of
//! them are expensive to redo and individually idempotent, so forward
//! fixability beats full atomicity here.

use anyhow::{Context, Result};
use std::io::Write;
use tracing::{info, warn};

use crate::context::DeployContext;
use crate::plan::Plan;

/// Engine state for a single run. Terminal states are `Succeeded` and
/// `Failed`; resumability comes from re-running against persisted state, not
/// from pausing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Preflight,
    Executing(usize),
    Compensating(usize),
    Succeeded,
    Failed(usize),
}

/// How a run ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Operator declined the confirmation prompt.
    Declined,
    /// Cancellation observed between steps.
    Cancelled,
}

/// Prompt the operator for a yes/no answer, defaulting to no.
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

pub struct Deployer {
    phase: RunPhase,
    /// Skip prompts and roll back failed steps automatically
    assume_yes: bool,
    check_tools: bool,
}

impl Deployer {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            phase: RunPhase::Idle,
            assume_yes,
            check_tools: true,
        }
    }

    /// Disable external-tool discovery, for tests running against mocks.
    pub fn without_tool_checks(mut self) -> Self {
        self.check_tools = false;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub async fn execute(&mut self, plan: &Plan, ctx: &mut DeployContext) -> Result<Outcome> {
        ctx.reporter.plan_started(&plan.entries());

        if !self.assume_yes && !confirm("Proceed with deployment?")? {
            ctx.reporter.phase("Cancelled");
            return Ok(Outcome::Declined);
        }

        self.phase = RunPhase::Preflight;
        self.preflight(plan, ctx).await?;

        for (index, step) in plan.steps().iter().enumerate() {
            if ctx.is_cancelled() {
                info!(step = step.name(), "cancellation observed, stopping before step");
                ctx.reporter.phase("Cancelled");
                return Ok(Outcome::Cancelled);
            }

            if !step.required() && step.completed_in(&ctx.state) {
                ctx.reporter.step_skipped(step.name(), "already satisfied");
                continue;
            }

            self.phase = RunPhase::Executing(index);
            ctx.reporter.step_started(step.name(), step.description());

            match step.apply(ctx).await {
                Ok(()) => {
                    ctx.reporter.step_succeeded(step.name());
                    ctx.state.touch();
                    ctx.store
                        .save(&ctx.state)
                        .with_context(|| format!("failed to persist state after '{}'", step.name()))?;
                }
                Err(err) => {
                    ctx.reporter.step_failed(step.name(), &format!("{err:#}"));
                    self.phase = RunPhase::Failed(index);
                    self.offer_compensation(index, plan, ctx).await;
                    return Err(err.context(format!("step '{}' failed", step.name())));
                }
            }
        }

        self.phase = RunPhase::Succeeded;
        ctx.state.touch();
        ctx.store.save(&ctx.state).context("failed to persist final state")?;
        print_summary(ctx);
        Ok(Outcome::Completed)
    }

    /// Verify tools, credentials and secrets before anything is mutated.
    async fn preflight(&self, plan: &Plan, ctx: &mut DeployContext) -> Result<()> {
        if self.check_tools {
            let mut tools = vec!["helm", "kubectl"];
            if plan.contains("infrastructure") {
                tools.push("terraform");
            }
            let missing: Vec<&str> = tools
                .into_iter()
                .filter(|tool| which::which(tool).is_err())
                .collect();
            if !missing.is_empty() {
                anyhow::bail!("required tools not found in PATH: {}", missing.join(", "));
            }
        }

        if plan.contains("infrastructure") {
            let spec = ctx.infra_spec();
            ctx.provisioner
                .check_credentials(&spec)
                .await
                .context("cloud credential check failed")?;
        }

        for (name, secret_ref) in ctx.config.secret_refs() {
            let value = secret_ref
                .resolve()
                .with_context(|| format!("failed to resolve secret '{name}' ({secret_ref})"))?;
            ctx.secrets.insert(name.to_string(), value);
        }

        info!("pre-flight checks passed");
        Ok(())
    }

    /// Roll back the failed step only, never a cascade. A compensation
    /// failure is logged and must not mask the original error.
    async fn offer_compensation(&mut self, index: usize, plan: &Plan, ctx: &mut DeployContext) {
        let step = &plan.steps()[index];
        if !step.reversible() {
            return;
        }

        let wanted = if self.assume_yes {
            true
        } else {
            confirm(&format!("Roll back failed step '{}'?", step.name())).unwrap_or(false)
        };
        if !wanted {
            return;
        }

        self.phase = RunPhase::Compensating(index);
        match step.compensate(ctx).await {
            Ok(()) => info!(step = step.name(), "rolled back failed step"),
            Err(err) => {
                warn!(step = step.name(), error = %format!("{err:#}"), "rollback failed, manual cleanup required");
            }
        }
        self.phase = RunPhase::Failed(index);
    }
}

/// Connection summary from the up-to-date state, printed on full success.
fn print_summary(ctx: &DeployContext) {
    let state = &ctx.state;
    let reporter = &ctx.reporter;

    reporter.phase("");
    reporter.phase(&format!("Deployment of '{}' complete", state.project));
    if !state.app.url.is_empty() {
        reporter.phase(&format!("  Application: {} (v{}, {} replicas)", state.app.url, state.app.version, state.app.replicas));
    }
    if let Some(ref endpoint) = state.endpoint {
        reporter.phase(&format!("  Endpoint:    {endpoint}"));
    }
    if !state.database.host.is_empty() {
        reporter.phase(&format!(
            "  Database:    {}://{}@{}:{}/{}",
            state.database.engine,
            state.database.username,
            state.database.host,
            state.database.port,
            state.database.name
        ));
    }
    if state.monitoring.enabled {
        reporter.phase(&format!("  Monitoring:  {}", state.monitoring.dashboard_url));
    }
    reporter.phase(&format!("  State file:  {}", ctx.store.file_path().display()));
}
