// src/bootstrap/configure.rs

//! Spack configuration writer
//!
//! Renders `mirrors.yaml`, `packages.yaml` and `modules.yaml` into the
//! site configuration directory of the Spack root. Each write truncates and
//! replaces the previous file; hand edits are not merged.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::config::{CompilerSpec, ProvisioningRequest, absolutize};
use super::templates::{
    MirrorParams, ModulesParams, PackagesParams, render_mirrors, render_modules, render_packages,
};

/// Site configuration directory, relative to the Spack root
pub const SITE_CONFIG_DIR: &str = "etc/spack";

/// Paths written by [`ConfigWriter::write_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenConfigs {
    /// `mirrors.yaml`, when a mirror was configured
    pub mirrors: Option<PathBuf>,
    pub packages: PathBuf,
    pub modules: PathBuf,
}

/// Writes rendered configuration into a Spack root
pub struct ConfigWriter {
    config_dir: PathBuf,
}

impl ConfigWriter {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            config_dir: root.as_ref().join(SITE_CONFIG_DIR),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Write every configuration document for a request
    pub fn write_all(&self, request: &ProvisioningRequest) -> Result<WrittenConfigs> {
        let mirrors = match &request.mirror {
            Some(mirror) => Some(self.write_mirrors(mirror)?),
            None => None,
        };

        Ok(WrittenConfigs {
            mirrors,
            packages: self.write_packages(&request.compiler)?,
            modules: self.write_modules(&request.compiler)?,
        })
    }

    /// Point Spack at a local mirror, creating the mirror directory if needed
    pub fn write_mirrors(&self, mirror: &Path) -> Result<PathBuf> {
        info!("Configuring local Spack mirror");
        let mirror = absolutize(mirror)?;

        if !mirror.exists() {
            info!("Creating dir {}", mirror.display());
            fs::create_dir_all(&mirror).map_err(|e| Error::io("create directory", &mirror, e))?;
        }

        let content = render_mirrors(&MirrorParams { path: &mirror })?;
        self.write_file("mirrors.yaml", &content)
    }

    /// Write the package pins and preferred compiler
    pub fn write_packages(&self, compiler: &CompilerSpec) -> Result<PathBuf> {
        info!("Configuring package preferences");
        let content = render_packages(&PackagesParams { compiler })?;
        self.write_file("packages.yaml", &content)
    }

    /// Write the Lmod module configuration
    pub fn write_modules(&self, compiler: &CompilerSpec) -> Result<PathBuf> {
        info!("Configuring Modules");
        let content = render_modules(&ModulesParams { compiler })?;
        self.write_file("modules.yaml", &content)
    }

    fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| Error::io("create directory", &self.config_dir, e))?;

        let path = self.config_dir.join(name);
        fs::write(&path, content).map_err(|e| Error::io("write", &path, e))?;
        Ok(path)
    }
}
