// src/commands/check.rs

//! Host prerequisite report

use anyhow::Result;
use spacktree::bootstrap::Prerequisites;

/// Check prerequisites for provisioning
///
/// Informational only; missing tools do not fail the command.
pub fn cmd_check(verbose: bool) -> Result<()> {
    println!("Checking prerequisites...\n");

    let prereqs = Prerequisites::check();

    let status = |present: bool| if present { "[OK]" } else { "[MISSING]" };

    for (name, version) in prereqs.entries() {
        println!(
            "  {} {}: {}",
            status(version.is_some()),
            name,
            version.unwrap_or("not found")
        );
    }

    println!();

    if prereqs.all_present() {
        println!("[OK] All prerequisites are satisfied.");
        println!("\nYou can proceed with 'spacktree setup'.");
    } else {
        println!("[MISSING] Some prerequisites are not installed:");
        for missing in prereqs.missing() {
            println!("  - {}", missing);
        }
        println!("\nSpack needs these tools to bootstrap itself and build packages.");

        if verbose {
            println!("\nInstallation hints:");
            println!("  Fedora: sudo dnf install {}", prereqs.missing().join(" "));
            println!("  Debian: sudo apt install {}", prereqs.missing().join(" "));
        }
    }

    Ok(())
}
