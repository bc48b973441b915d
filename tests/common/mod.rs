// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use spacktree::bootstrap::{ProvisioningRequest, TreeConfig};
use spacktree::spack::{ConfigScope, Located, PackageManager};
use spacktree::{Error, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A Spack call observed by [`FakeSpack`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpackCall {
    Locate(String),
    Discover,
    Install(String),
    Register(PathBuf, ConfigScope),
}

/// In-memory package manager
///
/// Successful installs are remembered, so a second run over the same fake
/// sees everything from the first run as installed.
#[derive(Debug, Default)]
pub struct FakeSpack {
    calls: RefCell<Vec<SpackCall>>,
    installed: RefCell<HashMap<String, PathBuf>>,
    failing: HashSet<String>,
}

impl FakeSpack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `spack install <spec>` fail
    pub fn failing_on(mut self, spec: &str) -> Self {
        self.failing.insert(spec.to_string());
        self
    }

    /// Pretend `spec` is already installed
    pub fn with_installed(self, spec: &str) -> Self {
        self.installed
            .borrow_mut()
            .insert(spec.to_string(), prefix_for(spec));
        self
    }

    pub fn calls(&self) -> Vec<SpackCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Specs passed to `install`, in order
    pub fn installs(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                SpackCall::Install(spec) => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Install prefix the fake reports for `spec`
pub fn prefix_for(spec: &str) -> PathBuf {
    PathBuf::from("/opt/fake").join(spec.replace(' ', "_"))
}

impl PackageManager for FakeSpack {
    fn locate_installed(&self, spec: &str) -> Result<Located> {
        self.calls
            .borrow_mut()
            .push(SpackCall::Locate(spec.to_string()));
        Ok(match self.installed.borrow().get(spec) {
            Some(prefix) => Located::Found(prefix.clone()),
            None => Located::NotFound,
        })
    }

    fn discover_compilers(&self) -> Result<()> {
        self.calls.borrow_mut().push(SpackCall::Discover);
        Ok(())
    }

    fn install(&self, spec: &str, _fail_fast: bool) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(SpackCall::Install(spec.to_string()));
        if self.failing.contains(spec) {
            return Err(Error::ExternalToolError {
                command: format!("spack install --fail-fast {}", spec),
                reason: "exit status: 1".to_string(),
            });
        }
        self.installed
            .borrow_mut()
            .insert(spec.to_string(), prefix_for(spec));
        Ok(())
    }

    fn register_compiler(&self, prefix: &Path, scope: ConfigScope) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(SpackCall::Register(prefix.to_path_buf(), scope));
        Ok(())
    }
}

/// Write a gzipped tarball with the given files
pub fn make_archive(path: &Path, files: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// A Spack source archive shaped like GitHub's `develop` tarball
///
/// It already carries an Lmod `Core` directory and one cached source
/// archive so every stage has something to work on.
pub fn make_spack_archive(path: &Path) {
    make_archive(
        path,
        &[
            ("spack-develop/bin/spack", "#!/bin/sh\nexit 0\n"),
            ("spack-develop/etc/spack/defaults/config.yaml", "config: {}\n"),
            (
                "spack-develop/share/spack/lmod/linux-centos7-x86_64/Core/.keep",
                "",
            ),
            (
                "spack-develop/var/spack/cache/_source-cache/archive/ab/jq-1.6.tar.gz",
                "jq sources",
            ),
        ],
    );
}

/// Scratch workspace for a provisioning run
///
/// Returns the TempDir (keep it alive to prevent cleanup) and a request
/// rooted at `<tmp>/spack` with its manifest at `<tmp>/packages.txt`.
pub fn setup_workspace(manifest: &str, mirror: bool) -> (TempDir, ProvisioningRequest) {
    let temp = tempfile::tempdir().unwrap();
    let manifest_path = temp.path().join("packages.txt");
    fs::write(&manifest_path, manifest).unwrap();

    let request = ProvisioningRequest::from_config(TreeConfig {
        spack_root: Some(temp.path().join("spack")),
        manifest: Some(manifest_path),
        mirror: mirror.then(|| temp.path().join("mirror")),
        ..Default::default()
    })
    .unwrap();

    (temp, request)
}
