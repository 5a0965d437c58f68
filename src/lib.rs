//! # Flotilla
//!
//! Bootstrap a GitOps controller and application bundle onto local
//! Kubernetes clusters.
//!
//! ## Usage
//!
//! ```bash
//! flotilla chart install [CLUSTER] [--deployment-mode MODE] [--non-interactive] [--dry-run]
//! ```
//!
//! ## Modules
//!
//! - `error` - the installation error taxonomy
//! - `install` - the installation workflow orchestrator
//! - `providers` - subprocess-backed production collaborators
//! - `values` - typed schema for the persisted Helm values file

pub mod error;
pub mod install;
pub mod providers;
pub mod values;

pub use error::{InstallError, Result};
