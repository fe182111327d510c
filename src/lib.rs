//! stackctl - declarative deployment orchestration for Kubernetes stacks
//!
//! One configuration file drives an ordered, resumable, partially-reversible
//! sequence of provisioning steps. The library exposes the orchestration
//! engine for integration tests and embedding; the `stackctl` binary wires it
//! to real collaborators.

pub mod config;
pub mod context;
pub mod deploy;
pub mod logging;
pub mod ops;
pub mod plan;
pub mod progress;
pub mod secrets;
pub mod state;
pub mod steps;
pub mod teardown;
