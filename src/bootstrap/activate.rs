// src/bootstrap/activate.rs

//! Activation script generation
//!
//! The activation script is sourced by users to put the tree's Lmod
//! modules on their module path. It needs two paths from the finished tree:
//! the Lmod init file and the module directory Spack generated.

use crate::error::{Error, Result};
use crate::spack::{Located, PackageManager};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::config::CompilerSpec;
use super::templates::{ActivateParams, render_activate};

/// Root of Spack's generated Lmod hierarchy, relative to the Spack root
pub const LMOD_MODULES_ROOT: &str = "share/spack/lmod";

/// Spack package providing Lmod
pub const LMOD_SPEC: &str = "lmod";

/// POSIX init file inside an Lmod install prefix
pub const LMOD_INIT_FILE: &str = "lmod/lmod/init/profile";

/// Paths the activation script is rendered with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePaths {
    /// Lmod init file to source
    pub init_file: PathBuf,
    /// Directory passed to `module use`
    pub modules_dir: PathBuf,
}

/// Locate the module directory and Lmod init file of a provisioned tree
///
/// The module directory is the `Core` directory of Spack's Lmod hierarchy,
/// or the compiler's own directory next to it once modules have been
/// generated for packages built with that compiler.
pub fn resolve_module_paths<P: PackageManager>(
    manager: &P,
    root: &Path,
    compiler: &CompilerSpec,
) -> Result<ModulePaths> {
    let modules_dir = resolve_modules_dir(root, compiler)?;

    let init_file = match manager.locate_installed(LMOD_SPEC)? {
        Located::Found(prefix) => prefix.join(LMOD_INIT_FILE),
        Located::NotFound => {
            return Err(Error::ResolveError(
                "lmod is not installed; add it to the package manifest".to_string(),
            ));
        }
    };

    debug!(
        "Resolved module paths: init={} modules={}",
        init_file.display(),
        modules_dir.display()
    );
    Ok(ModulePaths {
        init_file,
        modules_dir,
    })
}

/// Find `<root>/share/spack/lmod/<arch>/Core` and prefer the compiler's sibling directory
pub fn resolve_modules_dir(root: &Path, compiler: &CompilerSpec) -> Result<PathBuf> {
    let lmod_root = root.join(LMOD_MODULES_ROOT);
    let pattern = lmod_root.join("*").join("Core");
    let pattern = pattern.to_str().ok_or_else(|| {
        Error::ResolveError(format!("path {} is not valid UTF-8", lmod_root.display()))
    })?;

    let mut cores: Vec<PathBuf> = glob::glob(pattern)
        .map_err(|e| Error::ResolveError(format!("bad module search pattern {}: {}", pattern, e)))?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_dir())
        .collect();
    cores.sort();

    let core = cores.into_iter().next().ok_or_else(|| {
        Error::ResolveError(format!(
            "no Lmod Core directory under {}; were modules generated?",
            lmod_root.display()
        ))
    })?;

    let compiler_dir = core
        .parent()
        .map(|arch| arch.join(&compiler.name).join(&compiler.version));

    match compiler_dir {
        Some(dir) if dir.is_dir() => Ok(dir),
        _ => Ok(core),
    }
}

/// Write the activation script, replacing any previous one
pub fn write_activation_script(
    path: &Path,
    paths: &ModulePaths,
    autoload_modules: &[String],
) -> Result<()> {
    info!("Configuring {} script", path.display());

    let content = render_activate(&ActivateParams {
        init_file: &paths.init_file,
        modules_dir: &paths.modules_dir,
        autoload_modules,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, e))?;
    }
    fs::write(path, content).map_err(|e| Error::io("write", path, e))
}
