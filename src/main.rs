use std::{fs::File, io::BufWriter};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use deepnets::{config::Args, experiment};

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let summary = experiment::run(&args)?;

    if let Some(path) = &args.json {
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)?;
        info!("wrote the summary to {}", path.display());
    }

    Ok(())
}
