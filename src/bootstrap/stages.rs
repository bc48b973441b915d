// src/bootstrap/stages.rs

//! Provisioning stages
//!
//! The workflow is strictly linear. Stages carry no persisted state: each
//! one is idempotent on its own (existence checks, or Spack's idempotent
//! `install`), so a failed run is resumed by simply running again.

use serde::{Deserialize, Serialize};

/// Provisioning stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionStage {
    /// Fetch the Spack source tree
    Fetch,
    /// Write mirrors.yaml, packages.yaml and modules.yaml
    Configure,
    /// Ensure the requested compiler is installed and registered
    Compiler,
    /// Install the manifest packages
    Packages,
    /// Copy new source archives from Spack's cache into the mirror
    MirrorSync,
    /// Write the activation script
    Activate,
}

impl ProvisionStage {
    /// Get all stages in order
    pub fn all() -> &'static [ProvisionStage] {
        &[
            Self::Fetch,
            Self::Configure,
            Self::Compiler,
            Self::Packages,
            Self::MirrorSync,
            Self::Activate,
        ]
    }

    /// Short name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Configure => "configure",
            Self::Compiler => "compiler",
            Self::Packages => "packages",
            Self::MirrorSync => "mirror-sync",
            Self::Activate => "activate",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Fetch => "Fetch Spack source tree",
            Self::Configure => "Write Spack configuration",
            Self::Compiler => "Ensure compiler toolchain",
            Self::Packages => "Install manifest packages",
            Self::MirrorSync => "Sync download cache into mirror",
            Self::Activate => "Write activation script",
        }
    }

    /// Whether the stage only runs when a mirror is configured
    pub fn requires_mirror(&self) -> bool {
        matches!(self, Self::MirrorSync)
    }
}

impl std::fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
