//! Cluster-level false discovery rate control.
//!
//! Member p-values are combined per cluster with Simes' method and the combined values
//! go through a weighted Benjamini-Hochberg step-up, so the cluster is the unit of
//! discovery. The helpers at the bottom estimate the cluster FDR produced by a given
//! bin-pair threshold and search for the threshold that meets a target.

use crate::cluster::{build_clusters, Cluster, Partition};
use crate::config::{ClusterConfig, Weighting};
use crate::error::Error;
use crate::genomic::{BinPair, Direction};
use crate::Result;
use log::{debug, info};

/// Upper limit on the bin-pair thresholds tried by [`choose_threshold`]
pub const MAX_THRESHOLD_CANDIDATES: usize = 200;

/// Combined evidence of one cluster before the step-up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterEvidence {
    /// Simes combined p-value, only meaningful as a sort key
    pub combined_p: f64,
    /// Index of the member with the lowest p-value
    pub best: usize,
    /// Direction of the members driving the combined p-value
    pub direction: Direction,
}

/// Step-up result of one cluster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FdrDecision {
    /// Adjusted significance value
    pub adjusted: f64,
    /// Whether the cluster is declared significant at the target
    pub retained: bool,
}

/// Simes' combined p-value and the 0-based rank at which it is attained.
/// Returns `None` for an empty slice.
pub fn simes(p_values: &[f64]) -> Option<(f64, usize)> {
    if p_values.is_empty() {
        return None;
    }
    let mut sorted = p_values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;
    let mut best = (f64::INFINITY, 0);
    for (i, p) in sorted.iter().enumerate() {
        let value = p * n / (i + 1) as f64;
        if value < best.0 {
            best = (value, i);
        }
    }
    Some((best.0.min(1.0), best.1))
}

/// Combines the member statistics of `cluster`. Any missing statistic, or a p-value
/// outside [0, 1], is fatal.
pub fn summarise(cluster: &Cluster, pairs: &[BinPair]) -> Result<ClusterEvidence> {
    let mut members = Vec::with_capacity(cluster.size());
    for &index in &cluster.members {
        let test = &pairs[index].test;
        let p_value = test
            .p_value
            .filter(|p| (0.0..=1.0).contains(p))
            .ok_or(Error::InconsistentStatistics {
                index,
                field: "PValue",
            })?;
        let log_fc = test
            .log_fc
            .filter(|fc| !fc.is_nan())
            .ok_or(Error::InconsistentStatistics {
                index,
                field: "logFC",
            })?;
        test.abundance
            .filter(|a| !a.is_nan())
            .ok_or(Error::InconsistentStatistics {
                index,
                field: "logCPM",
            })?;
        members.push((index, p_value, log_fc));
    }

    let p_values = members.iter().map(|m| m.1).collect::<Vec<f64>>();
    let (combined_p, rank) =
        simes(&p_values).ok_or(Error::EmptyCluster { cluster: cluster.id })?;

    members.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    let best = members[0].0;

    let cutoff = members[rank].1;
    let mut directions = members
        .iter()
        .filter(|m| m.1 <= cutoff)
        .map(|m| Direction::from_log_fc(m.2));
    let first = directions.next().unwrap_or(Direction::Mixed);
    let direction = if directions.all(|d| d == first) {
        first
    } else {
        Direction::Mixed
    };

    Ok(ClusterEvidence {
        combined_p,
        best,
        direction,
    })
}

/// Weighted Benjamini-Hochberg adjusted values. Weights are rescaled to mean one, so
/// equal weights reproduce the unweighted procedure.
pub fn weighted_bh(p_values: &[f64], weights: &[f64]) -> Result<Vec<f64>> {
    if p_values.len() != weights.len() {
        return Err(Error::invalid_parameter(
            "weights",
            format!("{} weights for {} p-values", weights.len(), p_values.len()),
        ));
    }
    let m = p_values.len();
    if m == 0 {
        return Ok(Vec::new());
    }
    if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
        return Err(Error::invalid_parameter(
            "weights",
            format!("must be positive and finite, got {}", w),
        ));
    }

    let total: f64 = weights.iter().sum();
    let scaled = p_values
        .iter()
        .zip(weights)
        .map(|(p, w)| p / (w * m as f64 / total))
        .collect::<Vec<f64>>();

    let mut order = (0..m).collect::<Vec<usize>>();
    order.sort_by(|&a, &b| scaled[a].total_cmp(&scaled[b]).then(a.cmp(&b)));

    let mut adjusted = vec![0.0; m];
    let mut running = f64::INFINITY;
    for rank in (0..m).rev() {
        let index = order[rank];
        let value = (scaled[index] * m as f64 / (rank + 1) as f64).min(1.0);
        running = running.min(value);
        adjusted[index] = running;
    }
    Ok(adjusted)
}

/// Plain Benjamini-Hochberg adjusted values
pub fn benjamini_hochberg(p_values: &[f64]) -> Result<Vec<f64>> {
    weighted_bh(p_values, &vec![1.0; p_values.len()])
}

/// Step-up weights for clusters of the given sizes
pub fn cluster_weights(sizes: &[usize], weighting: Weighting) -> Vec<f64> {
    match weighting {
        Weighting::Uniform => vec![1.0; sizes.len()],
        Weighting::InverseSize => sizes.iter().map(|&n| 1.0 / n.max(1) as f64).collect(),
    }
}

/// Runs the step-up over the evidence of every cluster in `partition`
pub fn control(
    partition: &Partition,
    evidence: &[ClusterEvidence],
    config: &ClusterConfig,
) -> Result<Vec<FdrDecision>> {
    let p_values = evidence.iter().map(|e| e.combined_p).collect::<Vec<f64>>();
    let weights = cluster_weights(&partition.sizes(), config.weighting());
    let adjusted = weighted_bh(&p_values, &weights)?;

    let decisions = adjusted
        .into_iter()
        .map(|adjusted| FdrDecision {
            adjusted,
            retained: adjusted <= config.target(),
        })
        .collect::<Vec<FdrDecision>>();
    info!(
        "{} of {} clusters retained at a cluster-level FDR of {} ({} weighting)",
        decisions.iter().filter(|d| d.retained).count(),
        decisions.len(),
        config.target(),
        config.weighting()
    );
    Ok(decisions)
}

/// Estimated cluster-level FDR when bin pairs are selected at bin-pair FDR `threshold`.
///
/// The expected number of false positive bin pairs is assumed to form the smallest
/// clusters; the estimate is the share of clusters they can fill.
pub fn estimate_cluster_fdr(sizes: &[usize], threshold: f64) -> f64 {
    if sizes.is_empty() {
        return 0.0;
    }
    let selected: usize = sizes.iter().sum();
    let false_pairs = (selected as f64 * threshold).ceil() as usize;

    let mut sorted = sizes.to_vec();
    sorted.sort_unstable();
    let mut used = 0;
    let mut false_clusters = 0;
    for size in sorted {
        used += size;
        if used > false_pairs {
            break;
        }
        false_clusters += 1;
    }
    false_clusters as f64 / sizes.len() as f64
}

/// Largest bin-pair BH threshold whose estimated cluster FDR is at most the target,
/// together with the selected bin pairs. Returns `None` when no threshold qualifies.
pub fn choose_threshold(
    pairs: &[BinPair],
    config: &ClusterConfig,
) -> Result<Option<(f64, Vec<usize>)>> {
    let mut p_values = Vec::with_capacity(pairs.len());
    for (index, pair) in pairs.iter().enumerate() {
        match pair.test.p_value {
            Some(p) if (0.0..=1.0).contains(&p) => p_values.push(p),
            _ => {
                return Err(Error::InconsistentStatistics {
                    index,
                    field: "PValue",
                })
            }
        }
    }
    let adjusted = benjamini_hochberg(&p_values)?;

    let mut thresholds = adjusted.clone();
    thresholds.sort_by(|a, b| a.total_cmp(b));
    thresholds.dedup();
    let thresholds = thin(thresholds, MAX_THRESHOLD_CANDIDATES);

    let mut chosen = None;
    for threshold in thresholds {
        let selected = (0..pairs.len())
            .filter(|&i| adjusted[i] <= threshold)
            .collect::<Vec<usize>>();
        let partition = build_clusters(pairs, &selected, config)?;
        let estimate = estimate_cluster_fdr(&partition.sizes(), threshold);
        debug!(
            "Bin-pair threshold {} selects {} bin pairs in {} clusters, estimated cluster FDR {}",
            threshold,
            selected.len(),
            partition.len(),
            estimate
        );
        if estimate <= config.target() {
            chosen = Some((threshold, selected));
        }
    }

    match chosen {
        Some((threshold, ref selected)) => info!(
            "Chose a bin-pair FDR threshold of {} ({} bin pairs)",
            threshold,
            selected.len()
        ),
        None => info!(
            "No bin-pair threshold keeps the cluster FDR under {}",
            config.target()
        ),
    }
    Ok(chosen)
}

/// Keeps at most `limit` evenly spaced values of an ascending list, always keeping the last
fn thin(values: Vec<f64>, limit: usize) -> Vec<f64> {
    if values.len() <= limit || limit < 2 {
        return values;
    }
    let last = values.len() - 1;
    (0..limit)
        .map(|k| values[k * last / (limit - 1)])
        .collect()
}
