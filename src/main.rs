//! ArcSleuth: compares replicas of one archive and shows where they diverge.
//!
//! This binary is the coordination engine. It spawns the `arcsleuth-fs`
//! scanner, speaks the UI protocol on stdin/stdout, and treats every
//! positional argument as a root to scan. All logic lives in the
//! `arcsleuth-core` and `arcsleuth-engine` crates.

mod cli;
mod logging;

use anyhow::Context;
use arcsleuth_core::config::Config;
use arcsleuth_core::protocol::Message;
use arcsleuth_engine::{spawn_reader, Engine, Inbound, Source};
use clap::Parser;
use cli::Cli;
use std::process::{Command, Stdio};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let roots = Cli::parse().root_names()?;
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = logging::init(&config.engine.log_file, &config.engine.log_level)?;
    info!("ArcSleuth engine starting");

    let scanner_path = config.engine.scanner_executable();
    let mut scanner = Command::new(&scanner_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start scanner {}", scanner_path.display()))?;
    let scanner_in = scanner.stdin.take().context("scanner stdin not piped")?;
    let scanner_out = scanner.stdout.take().context("scanner stdout not piped")?;
    info!(scanner = %scanner_path.display(), pid = scanner.id(), "scanner started");

    let (tx, rx) = crossbeam_channel::unbounded();
    // Roots from the command line go through the loop like any other `scan`.
    for root in roots {
        tx.send(Inbound::Message(Source::Ui, Message::Scan { root }))?;
    }
    spawn_reader(Source::Scanner, scanner_out, tx.clone())?;
    spawn_reader(Source::Ui, std::io::stdin(), tx)?;

    let mut engine = Engine::new(scanner_in, std::io::stdout());
    let result = engine.run(&rx);

    // Closing the scanner's stdin lets it finish even after a fault.
    drop(engine);
    let status = scanner.wait().context("failed to wait for scanner")?;
    info!(%status, "scanner exited");

    result?;
    info!("ArcSleuth engine finished");
    Ok(())
}
