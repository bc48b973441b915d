// src/bootstrap/compiler.rs

//! Compiler toolchain provisioning
//!
//! Every package in the tree is built with one specific compiler. If Spack
//! does not already have it installed, the host compilers are registered,
//! the requested compiler is built from source with them, and the result is
//! registered at site scope so later installs can use it.

use crate::error::{Error, Result};
use crate::spack::{ConfigScope, Located, PackageManager};
use std::path::{Path, PathBuf};
use tracing::info;

use super::config::CompilerSpec;

/// Outcome of [`CompilerEnsurer::ensure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerStatus {
    /// Spack already had the compiler; nothing was done
    AlreadyPresent { prefix: PathBuf },
    /// The compiler was built and registered during this run
    Built { prefix: PathBuf },
}

impl CompilerStatus {
    /// Install prefix of the compiler
    pub fn prefix(&self) -> &Path {
        match self {
            Self::AlreadyPresent { prefix } | Self::Built { prefix } => prefix,
        }
    }

    pub fn was_built(&self) -> bool {
        matches!(self, Self::Built { .. })
    }
}

/// Makes sure a compiler is installed and registered with Spack
pub struct CompilerEnsurer<P> {
    manager: P,
}

impl<P: PackageManager> CompilerEnsurer<P> {
    pub fn new(manager: P) -> Self {
        Self { manager }
    }

    /// Probe for the compiler and build it when it is missing
    ///
    /// A failed probe is the only failure treated as a normal branch. Any
    /// failure on the build path aborts; a half-built compiler is left in
    /// place for inspection.
    pub fn ensure(&self, compiler: &CompilerSpec) -> Result<CompilerStatus> {
        let spec = compiler.to_string();
        info!("Checking compiler {}", spec);

        if let Located::Found(prefix) = self.manager.locate_installed(&spec)? {
            info!("Compiler {} already installed at {}", spec, prefix.display());
            return Ok(CompilerStatus::AlreadyPresent { prefix });
        }

        info!("Building compiler {}", spec);
        self.manager.discover_compilers()?;
        self.manager.install(&spec, true)?;

        let prefix = match self.manager.locate_installed(&spec)? {
            Located::Found(prefix) => prefix,
            Located::NotFound => {
                return Err(Error::ExternalToolError {
                    command: format!("spack location -i {}", spec),
                    reason: "compiler not found after a successful install".to_string(),
                });
            }
        };

        info!("Registering compiler {} from {}", spec, prefix.display());
        self.manager.register_compiler(&prefix, ConfigScope::Site)?;

        Ok(CompilerStatus::Built { prefix })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spack::testing::{Call, RecordingManager};

    #[test]
    fn test_present_compiler_skips_build() {
        let manager = RecordingManager::with_installed(&["gcc@8.4.0"]);
        let status = CompilerEnsurer::new(&manager)
            .ensure(&CompilerSpec::default())
            .unwrap();

        assert_eq!(
            status,
            CompilerStatus::AlreadyPresent {
                prefix: PathBuf::from("/fake/gcc@8.4.0")
            }
        );
        assert_eq!(manager.calls(), vec![Call::Locate("gcc@8.4.0".into())]);
    }

    #[test]
    fn test_missing_compiler_runs_build_sequence_once() {
        let manager = RecordingManager::default();
        let status = CompilerEnsurer::new(&manager)
            .ensure(&CompilerSpec::new("gcc", "10.2.0"))
            .unwrap();

        assert!(status.was_built());
        assert_eq!(status.prefix(), Path::new("/fake/gcc@10.2.0"));
        assert_eq!(
            manager.calls(),
            vec![
                Call::Locate("gcc@10.2.0".into()),
                Call::Discover,
                Call::Install("gcc@10.2.0".into(), true),
                Call::Locate("gcc@10.2.0".into()),
                Call::Register(PathBuf::from("/fake/gcc@10.2.0"), ConfigScope::Site),
            ]
        );
    }

    #[test]
    fn test_failed_compiler_build_stops_before_register() {
        let manager = RecordingManager::default().failing_on("gcc@8.4.0");
        let err = CompilerEnsurer::new(&manager)
            .ensure(&CompilerSpec::default())
            .unwrap_err();

        assert!(matches!(err, Error::ExternalToolError { .. }));
        assert_eq!(
            manager.calls(),
            vec![
                Call::Locate("gcc@8.4.0".into()),
                Call::Discover,
                Call::Install("gcc@8.4.0".into(), true),
            ]
        );
    }
}
