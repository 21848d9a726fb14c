//! Core domain types shared by the webhook gate and the Jenkins orchestrator.

pub mod ids;

pub use ids::{BranchName, RepoId};
