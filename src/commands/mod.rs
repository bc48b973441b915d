// src/commands/mod.rs
//! Command handlers for the spacktree CLI

mod check;
mod render;
mod setup;

pub use check::cmd_check;
pub use render::cmd_render;
pub use setup::cmd_setup;

use crate::cli::TreeArgs;
use anyhow::{Context, Result};
use spacktree::bootstrap::ProvisioningRequest;
use tracing::debug;

/// Resolve the request for this run: defaults, then config file, then flags
pub fn resolve_request(args: &TreeArgs) -> Result<ProvisioningRequest> {
    let file_config = args.load_config().context("Failed to load config file")?;
    let config = args.apply(file_config).context("Invalid command-line options")?;
    debug!("Effective config: {:?}", config);

    let request = ProvisioningRequest::from_config(config)
        .context("Failed to resolve provisioning request")?
        .with_verbose(args.verbose);
    Ok(request)
}
