// src/bootstrap/mod.rs

//! Spack tree provisioning
//!
//! A run walks through a fixed sequence of stages, stopping at the first
//! failure:
//!
//! ```text
//!  Fetch ──▶ Configure ──▶ Compiler ──▶ Packages ──▶ MirrorSync ──▶ Activate
//!    │           │             │            │             │             │
//!  spack/     etc/spack/    gcc@X built   manifest     var/spack/    activate.sh
//!  (once)     *.yaml        + registered  installed    cache → mirror
//! ```
//!
//! Each stage can be re-run safely: the fetch is skipped when the root
//! exists, configuration is rewritten from scratch, the compiler is only
//! built when Spack cannot locate it, installs of already-installed specs
//! are no-ops in Spack, and the mirror sync skips identical files.

mod activate;
mod compiler;
mod config;
mod configure;
mod fetch;
mod install;
mod manifest;
mod mirror;
mod stages;
pub mod templates;

pub use activate::{
    LMOD_INIT_FILE, LMOD_MODULES_ROOT, ModulePaths, resolve_module_paths, resolve_modules_dir,
    write_activation_script,
};
pub use compiler::{CompilerEnsurer, CompilerStatus};
pub use config::{
    CompilerSpec, DEFAULT_AUTOLOAD_MODULES, DEFAULT_SOURCE_URL, ProvisioningRequest, TreeConfig,
    absolutize, normalize,
};
pub use configure::{ConfigWriter, SITE_CONFIG_DIR, WrittenConfigs};
pub use fetch::{
    ArchiveSource, FetchOutcome, Fetcher, HttpArchive, LocalArchive, extract_tar_gz, source_for,
};
pub use install::{InstallError, InstallReport, PackageInstaller};
pub use manifest::{ManifestEntry, PackageManifest};
pub use mirror::{SOURCE_CACHE_DIR, SyncReport, sync_cache_to_mirror};
pub use stages::ProvisionStage;

use crate::error::StageError;
use crate::spack::PackageManager;
use std::path::PathBuf;
use tracing::{error, info};

/// What a completed run did
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub fetch: FetchOutcome,
    pub configs: WrittenConfigs,
    pub compiler: CompilerStatus,
    pub installed: Vec<String>,
    /// `None` when no mirror is configured
    pub mirror_sync: Option<SyncReport>,
    pub activate_script: PathBuf,
}

/// Drives the provisioning stages for one request
pub struct Bootstrap<'a, P> {
    request: &'a ProvisioningRequest,
    manager: P,
    source: Box<dyn ArchiveSource + 'a>,
}

impl<'a, P: PackageManager> Bootstrap<'a, P> {
    /// Create an orchestrator
    ///
    /// `manager` must operate on `request.root`; it is only invoked after
    /// the fetch stage has made sure the tree exists.
    pub fn new(
        request: &'a ProvisioningRequest,
        manager: P,
        source: Box<dyn ArchiveSource + 'a>,
    ) -> Self {
        Self {
            request,
            manager,
            source,
        }
    }

    /// Stages [`run`](Self::run) will execute for this request, in order
    pub fn planned_stages(&self) -> Vec<ProvisionStage> {
        ProvisionStage::all()
            .iter()
            .copied()
            .filter(|stage| !stage.requires_mirror() || self.request.mirror.is_some())
            .collect()
    }

    /// Run every stage in order, stopping at the first failure
    pub fn run(&self) -> Result<ProvisionReport, StageError> {
        let fetch = self.fetch()?;
        let configs = self.configure()?;
        let compiler = self.ensure_compiler()?;
        let installed = self.install_packages()?;
        let mirror_sync = self.sync_mirror()?;
        let activate_script = self.activate()?;

        info!("Spack tree ready at {}", self.request.root.display());
        Ok(ProvisionReport {
            fetch,
            configs,
            compiler,
            installed,
            mirror_sync,
            activate_script,
        })
    }

    /// Fetch stage
    pub fn fetch(&self) -> Result<FetchOutcome, StageError> {
        log_stage(ProvisionStage::Fetch);
        Fetcher::ensure(&self.request.root, self.source.as_ref()).map_err(|e| {
            StageError::new(ProvisionStage::Fetch, e).with_item(self.source.describe())
        })
    }

    /// Configure stage
    pub fn configure(&self) -> Result<WrittenConfigs, StageError> {
        log_stage(ProvisionStage::Configure);
        ConfigWriter::new(&self.request.root)
            .write_all(self.request)
            .map_err(|e| StageError::new(ProvisionStage::Configure, e))
    }

    /// Compiler stage
    pub fn ensure_compiler(&self) -> Result<CompilerStatus, StageError> {
        log_stage(ProvisionStage::Compiler);
        CompilerEnsurer::new(&self.manager)
            .ensure(&self.request.compiler)
            .map_err(|e| {
                StageError::new(ProvisionStage::Compiler, e)
                    .with_item(self.request.compiler.to_string())
            })
    }

    /// Packages stage
    pub fn install_packages(&self) -> Result<Vec<String>, StageError> {
        log_stage(ProvisionStage::Packages);
        let manifest = PackageManifest::load(&self.request.manifest).map_err(|e| {
            StageError::new(ProvisionStage::Packages, e)
                .with_item(self.request.manifest.display().to_string())
        })?;

        PackageInstaller::new(&self.manager)
            .install_all(&manifest)
            .map(|report| report.installed)
            .map_err(|e| {
                let InstallError {
                    spec,
                    line,
                    position,
                    total,
                    source,
                } = e;
                error!(
                    "{} failed (manifest line {}, package {} of {})",
                    spec, line, position, total
                );
                StageError::new(ProvisionStage::Packages, source).with_item(spec)
            })
    }

    /// Mirror sync stage; skipped without a mirror
    pub fn sync_mirror(&self) -> Result<Option<SyncReport>, StageError> {
        let stage = ProvisionStage::MirrorSync;
        let Some(mirror) = &self.request.mirror else {
            info!("[{}] skipped, no mirror configured", stage);
            return Ok(None);
        };

        log_stage(stage);
        sync_cache_to_mirror(&self.request.root, mirror)
            .map(Some)
            .map_err(|e| {
                StageError::new(stage, e).with_item(mirror.display().to_string())
            })
    }

    /// Activate stage
    pub fn activate(&self) -> Result<PathBuf, StageError> {
        log_stage(ProvisionStage::Activate);
        let script = &self.request.activate_script;

        resolve_module_paths(&self.manager, &self.request.root, &self.request.compiler)
            .and_then(|paths| {
                write_activation_script(script, &paths, &self.request.autoload_modules)
            })
            .map(|()| script.clone())
            .map_err(|e| {
                StageError::new(ProvisionStage::Activate, e)
                    .with_item(script.display().to_string())
            })
    }
}

fn log_stage(stage: ProvisionStage) {
    info!("[{}] {}", stage, stage.description());
}

/// Host tools Spack needs to bootstrap itself and build packages
#[derive(Debug)]
pub struct Prerequisites {
    pub python3: Option<String>,
    pub make: Option<String>,
    pub gcc: Option<String>,
    pub git: Option<String>,
    pub patch: Option<String>,
    pub curl: Option<String>,
}

impl Prerequisites {
    /// Check for required tools
    pub fn check() -> Self {
        Self {
            python3: Self::find_version("python3", &["--version"]),
            make: Self::find_version("make", &["--version"]),
            gcc: Self::find_version("gcc", &["--version"]),
            git: Self::find_version("git", &["--version"]),
            patch: Self::find_version("patch", &["--version"]),
            curl: Self::find_version("curl", &["--version"]),
        }
    }

    /// Tool name and detected version line, in report order
    pub fn entries(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("python3", self.python3.as_deref()),
            ("make", self.make.as_deref()),
            ("gcc", self.gcc.as_deref()),
            ("git", self.git.as_deref()),
            ("patch", self.patch.as_deref()),
            ("curl", self.curl.as_deref()),
        ]
    }

    /// Check if all required prerequisites are met
    pub fn all_present(&self) -> bool {
        self.entries().iter().all(|(_, version)| version.is_some())
    }

    /// Get list of missing prerequisites
    pub fn missing(&self) -> Vec<&'static str> {
        self.entries()
            .iter()
            .filter(|(_, version)| version.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    fn find_version(cmd: &str, args: &[&str]) -> Option<String> {
        let path = which::which(cmd).ok()?;
        std::process::Command::new(path)
            .args(args)
            .output()
            .ok()
            .and_then(|o| {
                if o.status.success() {
                    // python2 and some tools print the version on stderr
                    let text = if o.stdout.is_empty() { o.stderr } else { o.stdout };
                    String::from_utf8(text)
                        .ok()
                        .and_then(|s| s.lines().next().map(String::from))
                } else {
                    None
                }
            })
    }
}
