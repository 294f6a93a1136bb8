#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]

//! Clustering of differential chromatin interactions with cluster-level FDR control.
//!
//! Tested bin pairs (two genomic anchors with a p-value, log-fold-change and abundance)
//! are prefiltered, grouped into clusters of adjacent significant bin pairs, and each
//! cluster is tested as a single discovery: member p-values are combined with Simes'
//! method and a weighted Benjamini-Hochberg step-up decides which clusters are kept.
//!

pub mod cluster;
pub mod config;
pub mod error;
pub mod fdr;
pub mod genomic;
pub mod io;
pub mod report;

use crate::cluster::{build_clusters, select_by_pvalue, Partition};
use crate::config::{ClusterConfig, Prefilter};
use crate::genomic::BinPair;
use crate::report::{annotate, Annotation, ClusterRecord, ClusterRecordBuilder, ClusterSummary};
use log::info;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Everything produced by one run over a set of bin pairs
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Bin-pair threshold used by the prefilter (raw cutoff or chosen BH threshold)
    pub threshold: Option<f64>,
    /// Clusters and their membership
    pub partition: Partition,
    /// One record per cluster, in id order
    pub records: Vec<ClusterRecord>,
    /// Cluster decision of every input bin pair
    pub annotations: Vec<Annotation>,
    /// Counts by direction
    pub summary: ClusterSummary,
}

/// Indices of the bin pairs that enter clustering, and the threshold that selected them
pub fn prefilter(pairs: &[BinPair], config: &ClusterConfig) -> Result<(Option<f64>, Vec<usize>)> {
    match config.prefilter() {
        Prefilter::PValue(cutoff) => Ok((Some(cutoff), select_by_pvalue(pairs, cutoff)?)),
        Prefilter::ClusterFdr => Ok(match fdr::choose_threshold(pairs, config)? {
            Some((threshold, selected)) => (Some(threshold), selected),
            None => (None, Vec::new()),
        }),
    }
}

/// Prefilters, clusters and controls the cluster-level FDR of `pairs`
pub fn analyse(pairs: &[BinPair], config: &ClusterConfig) -> Result<Analysis> {
    let (threshold, candidates) = prefilter(pairs, config)?;
    info!(
        "{} of {} bin pairs passed the prefilter",
        candidates.len(),
        pairs.len()
    );

    let partition = build_clusters(pairs, &candidates, config)?;
    info!("Formed {} clusters", partition.len());
    let evidence = partition
        .clusters
        .iter()
        .map(|cluster| fdr::summarise(cluster, pairs))
        .collect::<Result<Vec<_>>>()?;
    let decisions = fdr::control(&partition, &evidence, config)?;

    let records = partition
        .clusters
        .iter()
        .zip(evidence)
        .zip(decisions)
        .map(|((cluster, evidence), decision)| {
            ClusterRecordBuilder::new()
                .cluster(cluster.clone())
                .evidence(evidence)
                .decision(decision)
                .best_from(pairs)?
                .build()
        })
        .collect::<Result<Vec<ClusterRecord>>>()?;

    let annotations = annotate(&partition, &records, pairs.len());
    let summary = ClusterSummary::from_records(&records);
    info!(
        "{} clusters, {} retained ({} up, {} down, {} mixed)",
        summary.total,
        summary.retained,
        summary.significant.up,
        summary.significant.down,
        summary.significant.mixed
    );

    Ok(Analysis {
        threshold,
        partition,
        records,
        annotations,
        summary,
    })
}
