//! Operation collaborators.
//!
//! Everything that actually touches infrastructure goes through one of the
//! narrow trait contracts in this module: [`infra::Provisioner`],
//! [`cluster::ClusterOps`] and [`datatier::DataTierOps`]. The engine only
//! ever sees the traits; the real implementations are thin shell-outs to
//! `terraform`, `helm` and `kubectl`, and the mocks in [`mock`] stand in for
//! them in tests.

pub mod cluster;
pub mod datatier;
pub mod infra;
pub mod mock;

use std::process::Output;
use thiserror::Error;
use tokio::process::Command;

/// Errors from collaborator operations.
#[derive(Error, Debug)]
pub enum OpsError {
    #[error("'{0}' is not installed or not in PATH")]
    ToolMissing(String),

    #[error("{tool} failed: {detail}")]
    CommandFailed { tool: String, detail: String },

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("'{0}' not found")]
    NotFound(String),
}

/// Run an external tool and capture its output, mapping a missing binary to
/// [`OpsError::ToolMissing`].
pub(crate) async fn run_tool(tool: &str, args: &[&str]) -> Result<Output, OpsError> {
    tracing::debug!(tool, ?args, "running external tool");
    Command::new(tool)
        .args(args)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OpsError::ToolMissing(tool.to_string())
            } else {
                OpsError::CommandFailed {
                    tool: tool.to_string(),
                    detail: e.to_string(),
                }
            }
        })
}

/// Run a tool and require a zero exit status, surfacing trimmed stderr on
/// failure.
pub(crate) async fn run_tool_checked(tool: &str, args: &[&str]) -> Result<String, OpsError> {
    let output = run_tool(tool, args).await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(OpsError::CommandFailed {
            tool: tool.to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
