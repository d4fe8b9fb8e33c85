//! ArcSleuth scanner: walks and hashes roots on request.
//!
//! Reads `scan`/`stop` commands on stdin and writes scan and hash events on
//! stdout. Set `ARCSLEUTH_MANIFEST` to replay a CSV manifest instead of
//! touching the disk.

#[path = "../logging.rs"]
mod logging;

use anyhow::Context;
use arcsleuth_core::config::Config;
use arcsleuth_core::scanner;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = logging::init(&config.scanner.log_file, &config.scanner.log_level)?;
    info!(manifest = ?config.scanner.manifest, "ArcSleuth scanner starting");

    scanner::serve(&config.scanner, std::io::stdin().lock(), std::io::stdout())?;
    Ok(())
}
