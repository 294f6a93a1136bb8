use diclust::config::{ClusterConfig, Prefilter, Weighting};
use diclust::Result;
use log::LevelFilter;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "diclust",
    about = "Clusters differential Hi-C bin pairs and controls the FDR across clusters"
)]
pub(crate) struct DiClust {
    #[structopt(
        short,
        long,
        help = "Maximum gap in bp between adjacent bin pairs on either axis",
        default_value = "1"
    )]
    pub(crate) tol: u64,
    #[structopt(
        short,
        long,
        help = "Maximum span in bp of a cluster on either axis, 0 disables the bound",
        default_value = "1000000"
    )]
    pub(crate) upper: u64,
    #[structopt(
        long,
        help = "Cluster-level false discovery rate",
        default_value = "0.05"
    )]
    pub(crate) target: f64,
    #[structopt(
        short,
        long,
        help = "Keep bin pairs with a raw p-value below this cutoff instead of searching for the bin-pair threshold"
    )]
    pub(crate) pvalue: Option<f64>,
    #[structopt(
        short,
        long,
        help = "Cluster weights in the step-up procedure [uniform, inverse-size]",
        default_value = "uniform"
    )]
    pub(crate) weighting: Weighting,
    #[structopt(short, long, help = "Only report clusters retained at the target FDR")]
    pub(crate) retained_only: bool,
    #[structopt(
        short,
        long,
        help = "Write the cluster of every bin pair to this file",
        parse(from_os_str)
    )]
    pub(crate) annotations: Option<PathBuf>,
    #[structopt(
        short,
        long,
        help = "Write the cluster table to this file instead of stdout",
        parse(from_os_str)
    )]
    pub(crate) output: Option<PathBuf>,
    #[structopt(long, help = "Number of threads", default_value = "1")]
    pub(crate) threads: usize,
    #[structopt(
        short,
        long,
        help = "Determines verbosity of the processing, can be specified multiple times -vvv",
        parse(from_occurrences)
    )]
    pub(crate) verbosity: u8,
    #[structopt(short, long, help = "Only print errors")]
    pub(crate) quiet: bool,
    #[structopt(
        help = "Tab separated table of tested bin pairs (may be gzipped)",
        parse(from_os_str)
    )]
    pub(crate) input: PathBuf,
}

impl DiClust {
    pub(crate) fn set_logging(&self) {
        let level = if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbosity {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        };
        env_logger::Builder::new()
            .filter_level(level)
            .init();
    }

    pub(crate) fn config(&self) -> Result<ClusterConfig> {
        let prefilter = match self.pvalue {
            Some(cutoff) => Prefilter::PValue(cutoff),
            None => Prefilter::ClusterFdr,
        };
        let upper = if self.upper == 0 {
            None
        } else {
            Some(self.upper)
        };
        ClusterConfig::new(prefilter, self.tol, upper, self.target, self.weighting)
    }
}
