//! blueprintctl library
//!
//! Core functionality for the blueprintctl CLI: Terraform stage handles,
//! gcloud wrappers, and app-infra verification.

pub mod blueprint;
pub mod config;
pub mod error;
pub mod exec;
pub mod gcloud;
pub mod json;
pub mod report;
pub mod retry;
pub mod stages;
pub mod terraform;
pub mod validation;
pub mod verify;

// Re-export commonly used types
pub use blueprint::Blueprint;
pub use stages::{EnvOutcome, Orchestrator, StageContext};
pub use verify::{Check, CheckReport};
