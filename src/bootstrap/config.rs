// src/bootstrap/config.rs

//! Provisioning configuration
//!
//! A run is described by an immutable [`ProvisioningRequest`]. It is built
//! from defaults, an optional TOML [`TreeConfig`] file and command-line
//! overrides, in that order of precedence (CLI wins).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Default Spack root, relative to the working directory
pub const DEFAULT_SPACK_ROOT: &str = "./spack";

/// Default compiler package
pub const DEFAULT_COMPILER_NAME: &str = "gcc";

/// Default compiler version
pub const DEFAULT_COMPILER_VERSION: &str = "8.4.0";

/// Default package manifest, relative to the working directory
pub const DEFAULT_MANIFEST: &str = "packages.txt";

/// Default location of the Spack source archive
pub const DEFAULT_SOURCE_URL: &str = "https://github.com/spack/spack/archive/develop.tar.gz";

/// File name of the activation script when no path is given
pub const ACTIVATE_SCRIPT_NAME: &str = "activate.sh";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "spacktree.toml";

/// Modules loaded by the activation script unless the user overrides them
pub const DEFAULT_AUTOLOAD_MODULES: &[&str] = &["tree", "jq", "parallel", "the-silver-searcher"];

/// A `name@version` compiler spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompilerSpec {
    pub name: String,
    pub version: String,
}

impl CompilerSpec {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for CompilerSpec {
    fn default() -> Self {
        Self::new(DEFAULT_COMPILER_NAME, DEFAULT_COMPILER_VERSION)
    }
}

impl FromStr for CompilerSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, version) = s
            .trim()
            .split_once('@')
            .ok_or_else(|| Error::ConfigError(format!("compiler spec '{}' is not name@version", s)))?;

        if name.is_empty() || version.is_empty() || version.contains('@') {
            return Err(Error::ConfigError(format!(
                "compiler spec '{}' is not name@version",
                s
            )));
        }

        Ok(Self::new(name, version))
    }
}

impl TryFrom<String> for CompilerSpec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CompilerSpec> for String {
    fn from(spec: CompilerSpec) -> Self {
        spec.to_string()
    }
}

impl std::fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// On-disk configuration file (`spacktree.toml`)
///
/// Every field is optional; unset fields fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeConfig {
    /// Spack root directory
    pub spack_root: Option<PathBuf>,

    /// Compiler to ensure, as `name@version`
    pub compiler: Option<CompilerSpec>,

    /// Local mirror directory
    pub mirror: Option<PathBuf>,

    /// Package manifest file
    pub manifest: Option<PathBuf>,

    /// Output path of the activation script
    pub activate_script: Option<PathBuf>,

    /// Spack source archive (URL or local path)
    pub source: Option<String>,

    /// Interpreter used to run `bin/spack`
    pub python: Option<PathBuf>,

    /// Default module set loaded by the activation script
    pub autoload_modules: Option<Vec<String>>,
}

impl TreeConfig {
    /// Parse a config file from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Load a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io("read", path, e))?;
        Self::parse(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Find the config file to use when none was given explicitly
    ///
    /// Checks `./spacktree.toml`, then the user config directory.
    pub fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }

        dirs::config_dir()
            .map(|dir| dir.join("spacktree").join("config.toml"))
            .filter(|path| path.is_file())
    }

    /// Layer `other` on top of `self`; fields set in `other` win
    pub fn merge(mut self, other: TreeConfig) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            spack_root,
            compiler,
            mirror,
            manifest,
            activate_script,
            source,
            python,
            autoload_modules
        );
        self
    }
}

/// Fully resolved parameters of a provisioning run
#[derive(Debug, Clone)]
pub struct ProvisioningRequest {
    /// Absolute Spack root
    pub root: PathBuf,

    /// Compiler to ensure
    pub compiler: CompilerSpec,

    /// Absolute mirror directory, if mirroring is enabled
    pub mirror: Option<PathBuf>,

    /// Package manifest
    pub manifest: PathBuf,

    /// Output path of the activation script
    pub activate_script: PathBuf,

    /// Spack source archive (URL or local path)
    pub source: String,

    /// Interpreter used to run `bin/spack`
    pub python: Option<PathBuf>,

    /// Default module set for the activation script
    pub autoload_modules: Vec<String>,

    /// Stream Spack output instead of capturing it
    pub verbose: bool,
}

impl ProvisioningRequest {
    /// Resolve a request from a (merged) config
    pub fn from_config(config: TreeConfig) -> Result<Self> {
        let root = absolutize(
            config
                .spack_root
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_SPACK_ROOT)),
        )?;

        let mirror = config.mirror.as_deref().map(absolutize).transpose()?;

        let activate_script = match config.activate_script {
            Some(path) => absolutize(&path)?,
            None => root
                .parent()
                .unwrap_or(&root)
                .join(ACTIVATE_SCRIPT_NAME),
        };

        Ok(Self {
            compiler: config.compiler.unwrap_or_default(),
            mirror,
            manifest: config
                .manifest
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST)),
            activate_script,
            source: config
                .source
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            python: config.python,
            autoload_modules: config.autoload_modules.unwrap_or_else(|| {
                DEFAULT_AUTOLOAD_MODULES
                    .iter()
                    .map(|m| m.to_string())
                    .collect()
            }),
            verbose: false,
            root,
        })
    }

    /// Enable verbose Spack output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Make a path absolute and lexically normalized (`.` and `..` removed)
///
/// The path does not need to exist, and symlinks are not resolved.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| Error::IoError(format!("Failed to read current directory: {}", e)))?
            .join(path)
    };
    Ok(normalize(&joined))
}

/// Lexically normalize a path without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
