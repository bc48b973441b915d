// src/cli/mod.rs
//! CLI definitions for spacktree
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! Tree options are global so they can be given before or after the
//! subcommand. None of them carries a clap default: unset options fall
//! through to the config file and then to the built-in defaults.

use clap::{Args, Parser, Subcommand, ValueEnum};
use spacktree::bootstrap::{CompilerSpec, TreeConfig};
use spacktree::{Error, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spacktree")]
#[command(author = "Spacktree Contributors")]
#[command(version)]
#[command(about = "Bootstrap a Spack software tree with a pinned compiler and Lmod", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub tree: TreeArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Provision the Spack tree (default)
    Setup,

    /// Check host prerequisites
    Check,

    /// Print a generated document without writing it
    Render {
        /// Document to render
        #[arg(value_enum)]
        document: Document,
    },
}

/// Documents `render` can print
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    Mirrors,
    Packages,
    Modules,
    Activate,
}

/// Options describing the tree to provision
#[derive(Args, Debug, Clone, Default)]
pub struct TreeArgs {
    /// Path to the Spack root [default: ./spack]
    #[arg(short = 's', long, value_name = "PATH", global = true)]
    pub spack_root: Option<PathBuf>,

    /// Compiler version to ensure [default: 8.4.0]
    #[arg(short = 'g', long, value_name = "VERSION", global = true)]
    pub gcc_version: Option<String>,

    /// Compiler package name [default: gcc]
    #[arg(long, value_name = "NAME", global = true)]
    pub compiler: Option<String>,

    /// Path to a local Spack mirror
    #[arg(short = 'm', long, value_name = "PATH", global = true)]
    pub spack_mirror: Option<PathBuf>,

    /// Package manifest [default: ./packages.txt]
    #[arg(long, value_name = "PATH", global = true)]
    pub manifest: Option<PathBuf>,

    /// Where to write the activation script [default: <root parent>/activate.sh]
    #[arg(long, value_name = "PATH", global = true)]
    pub activate_script: Option<PathBuf>,

    /// Spack source archive, URL or local path
    #[arg(long, value_name = "URL|PATH", global = true)]
    pub source: Option<String>,

    /// Interpreter used to run bin/spack
    #[arg(long, value_name = "PATH", global = true)]
    pub python: Option<PathBuf>,

    /// Config file [default: ./spacktree.toml if present]
    #[arg(short = 'c', long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Stream Spack output and enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

impl TreeArgs {
    /// Load the config file named by `--config`, or the discovered one
    pub fn load_config(&self) -> Result<TreeConfig> {
        match &self.config {
            Some(path) => TreeConfig::load(path),
            None => match TreeConfig::discover() {
                Some(path) => TreeConfig::load(&path),
                None => Ok(TreeConfig::default()),
            },
        }
    }

    /// Layer the command-line values over `base`
    ///
    /// `--compiler` and `--gcc-version` override the name and version
    /// separately, so either can be combined with a compiler from the file.
    pub fn apply(&self, base: TreeConfig) -> Result<TreeConfig> {
        let compiler = match (&self.compiler, &self.gcc_version) {
            (None, None) => None,
            (name, version) => {
                let current = base.compiler.clone().unwrap_or_default();
                let spec = CompilerSpec::new(
                    name.clone().unwrap_or(current.name),
                    version.clone().unwrap_or(current.version),
                );
                if spec.name.is_empty() || spec.version.is_empty() {
                    return Err(Error::ConfigError(format!(
                        "compiler name and version must not be empty (got '{}')",
                        spec
                    )));
                }
                Some(spec)
            }
        };

        Ok(base.merge(TreeConfig {
            spack_root: self.spack_root.clone(),
            compiler,
            mirror: self.spack_mirror.clone(),
            manifest: self.manifest.clone(),
            activate_script: self.activate_script.clone(),
            source: self.source.clone(),
            python: self.python.clone(),
            autoload_modules: None,
        }))
    }
}
