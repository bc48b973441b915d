// src/commands/render.rs

//! Print generated documents

use crate::cli::Document;
use anyhow::{Context, Result, bail};
use spacktree::bootstrap::templates::{
    ActivateParams, MirrorParams, ModulesParams, PackagesParams, render_activate, render_mirrors,
    render_modules, render_packages,
};
use spacktree::bootstrap::{ProvisioningRequest, resolve_module_paths};
use spacktree::spack::Spack;

/// Render one document for `request` to stdout without writing anything
pub fn cmd_render(request: &ProvisioningRequest, document: Document) -> Result<()> {
    let content = match document {
        Document::Mirrors => {
            let Some(mirror) = &request.mirror else {
                bail!("No mirror configured; pass --spack-mirror");
            };
            render_mirrors(&MirrorParams { path: mirror })?
        }
        Document::Packages => render_packages(&PackagesParams {
            compiler: &request.compiler,
        })?,
        Document::Modules => render_modules(&ModulesParams {
            compiler: &request.compiler,
        })?,
        Document::Activate => {
            let spack = Spack::new(&request.root).with_python(request.python.clone());
            let paths = resolve_module_paths(&spack, &request.root, &request.compiler)
                .context("Cannot render activation script before the tree is provisioned")?;
            render_activate(&ActivateParams {
                init_file: &paths.init_file,
                modules_dir: &paths.modules_dir,
                autoload_modules: &request.autoload_modules,
            })?
        }
    };

    print!("{}", content);
    Ok(())
}
