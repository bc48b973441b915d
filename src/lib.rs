// src/lib.rs

//! spacktree
//!
//! Bootstraps a Spack software tree: fetches Spack, writes its site
//! configuration, ensures a pinned compiler, installs a package manifest and
//! emits an Lmod activation script for end users.
//!
//! # Architecture
//!
//! - Linear stages: every run walks the same ordered stages and stops at the
//!   first failure ([`bootstrap::Bootstrap`])
//! - Idempotent reruns: existence checks, or Spack's own idempotent install
//! - Pure templates: configuration documents are rendered from parameter
//!   structs ([`bootstrap::templates`])
//! - Spack behind a trait: [`spack::PackageManager`] is the only way the
//!   workflow talks to Spack

pub mod bootstrap;
mod error;
pub mod spack;

pub use bootstrap::{Bootstrap, ProvisionReport, ProvisionStage, ProvisioningRequest};
pub use error::{Error, Result, StageError};
