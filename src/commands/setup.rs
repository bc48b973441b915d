// src/commands/setup.rs

//! Provision command

use anyhow::{Context, Result};
use spacktree::bootstrap::{Bootstrap, CompilerStatus, FetchOutcome, ProvisioningRequest, source_for};
use spacktree::spack::Spack;

/// Provision the Spack tree described by `request`
pub fn cmd_setup(request: &ProvisioningRequest) -> Result<()> {
    println!("Provisioning Spack tree...");
    println!("  Root: {}", request.root.display());
    println!("  Compiler: {}", request.compiler);
    println!("  Manifest: {}", request.manifest.display());
    if let Some(mirror) = &request.mirror {
        println!("  Mirror: {}", mirror.display());
    }

    let source = source_for(&request.source, true)
        .with_context(|| format!("Invalid Spack source '{}'", request.source))?;
    let spack = Spack::new(&request.root)
        .with_python(request.python.clone())
        .with_verbose(request.verbose);
    let bootstrap = Bootstrap::new(request, &spack, source);

    let stages: Vec<&str> = bootstrap.planned_stages().iter().map(|s| s.name()).collect();
    println!("  Stages: {}", stages.join(" -> "));
    println!();

    let report = bootstrap.run()?;

    println!();
    match report.fetch {
        FetchOutcome::AlreadyPresent => println!("[OK] Spack tree already present"),
        FetchOutcome::Fetched => println!("[OK] Spack fetched from {}", request.source),
    }
    match &report.compiler {
        CompilerStatus::AlreadyPresent { prefix } => {
            println!("[OK] {} found at {}", request.compiler, prefix.display())
        }
        CompilerStatus::Built { prefix } => {
            println!("[OK] {} built at {}", request.compiler, prefix.display())
        }
    }
    println!("[OK] {} package(s) installed", report.installed.len());
    if let Some(sync) = &report.mirror_sync {
        println!(
            "[OK] Mirror updated: {} copied, {} unchanged",
            sync.copied.len(),
            sync.unchanged
        );
    }
    println!(
        "[OK] Activation script written to {}",
        report.activate_script.display()
    );

    println!("\nTo use the tree:");
    println!("  . {}", report.activate_script.display());

    Ok(())
}
