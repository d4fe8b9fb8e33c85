use anyhow::bail;
use arcsleuth_core::protocol::is_wire_safe;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "arcsleuth", version)]
#[command(about = "Compare replicas of one archive and show where they diverge", long_about = None)]
pub struct Cli {
    /// Replica roots to scan, in presence-vector order
    pub roots: Vec<PathBuf>,
}

impl Cli {
    /// The roots as protocol values.
    ///
    /// A root must be valid UTF-8 and free of tabs and line breaks, since it
    /// is written verbatim into every scanner event.
    pub fn root_names(&self) -> anyhow::Result<Vec<String>> {
        self.roots
            .iter()
            .map(|root| {
                let Some(name) = root.to_str() else {
                    bail!("root {} is not valid UTF-8", root.display());
                };
                if !is_wire_safe(name) {
                    bail!("root {name:?} contains a tab or line break");
                }
                Ok(name.to_owned())
            })
            .collect()
    }
}
