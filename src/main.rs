#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]

//! Clusters differential chromatin interactions and reports cluster-level FDR decisions.
mod cli;

use diclust::report::{write_annotations, write_clusters};
use diclust::{error::Error, io::read_bin_pairs, Result};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use structopt::StructOpt;

fn main() -> Result<()> {
    let opt = cli::DiClust::from_args();
    opt.set_logging();
    let config = opt.config()?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(opt.threads)
        .build_global()
        .map_err(|_| Error::ThreadError)?;

    let pairs = read_bin_pairs(&opt.input)?;
    let analysis = diclust::analyse(&pairs, &config)?;
    if let Some(threshold) = analysis.threshold {
        info!("Bin pairs were selected at a threshold of {}", threshold);
    }

    let mut out: Box<dyn Write> = match opt.output {
        Some(ref path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    write_clusters(&analysis.records, opt.retained_only, &mut out)?;
    out.flush()?;

    if let Some(ref path) = opt.annotations {
        info!("Writing bin pair annotations to {}", path.display());
        let mut out = BufWriter::new(File::create(path)?);
        write_annotations(&pairs, &analysis.annotations, &mut out)?;
        out.flush()?;
    }

    Ok(())
}
