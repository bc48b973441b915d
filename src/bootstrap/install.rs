// src/bootstrap/install.rs

//! Sequential package installation
//!
//! Packages are installed one at a time in manifest order. Spack's own
//! locking and parallelism are not second-guessed, and the first failure
//! stops the run.

use crate::error::Error;
use crate::spack::PackageManager;
use thiserror::Error as ThisError;
use tracing::info;

use super::manifest::{ManifestEntry, PackageManifest};

/// An install that failed, and where it sits in the manifest
#[derive(Debug, ThisError)]
#[error("installing {spec} (manifest line {line}, package {position} of {total}) failed: {source}")]
pub struct InstallError {
    pub spec: String,
    pub line: usize,
    /// 1-based position in install order
    pub position: usize,
    pub total: usize,
    #[source]
    pub source: Error,
}

/// Packages installed by [`PackageInstaller::install_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: Vec<String>,
}

/// Installs manifest packages through a [`PackageManager`]
pub struct PackageInstaller<P> {
    manager: P,
}

impl<P: PackageManager> PackageInstaller<P> {
    pub fn new(manager: P) -> Self {
        Self { manager }
    }

    /// Install every manifest entry in order, stopping at the first failure
    pub fn install_all(&self, manifest: &PackageManifest) -> Result<InstallReport, InstallError> {
        let total = manifest.len();
        let mut report = InstallReport::default();

        for (idx, entry) in manifest.entries().iter().enumerate() {
            self.install_one(entry, idx + 1, total)?;
            report.installed.push(entry.spec.clone());
        }

        info!("Installed {} package(s)", report.installed.len());
        Ok(report)
    }

    fn install_one(&self, entry: &ManifestEntry, position: usize, total: usize) -> Result<(), InstallError> {
        info!("Installing {} ({}/{})", entry.spec, position, total);

        self.manager
            .install(&entry.spec, true)
            .map_err(|source| InstallError {
                spec: entry.spec.clone(),
                line: entry.line,
                position,
                total,
                source,
            })
    }
}
