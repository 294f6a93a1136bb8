//! Per cluster records, bin pair annotations and the output tables.

use crate::cluster::{Cluster, Partition};
use crate::error::Error;
use crate::fdr::{ClusterEvidence, FdrDecision};
use crate::genomic::{BinPair, ChromPair, Direction, Region};
use crate::Result;
use std::io::Write;

/// Header of the cluster table
pub const CLUSTER_HEADER: &str = "chr1\tstart1\tend1\tchr2\tstart2\tend2\tcluster\tsize\tcombinedP\tFDR\tretained\tdirection\tbest.logFC\tbest.logCPM\tbest.PValue";
/// Header of the per bin pair annotation table
pub const ANNOTATION_HEADER: &str = "chr1\tstart1\tend1\tchr2\tstart2\tend2\tcluster\tretained";
/// Comment line written above the annotation table
pub const ANNOTATION_NOTE: &str = "# cluster-level decisions; per bin pair p-values and FDR are not independently interpretable";

/// Final per cluster result
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRecord {
    /// Cluster id
    pub id: usize,
    /// Chromosome pair of the cluster
    pub chrom_pair: ChromPair,
    /// Bounding box of the members
    pub region: Region,
    /// Member bin pair indices
    pub members: Vec<usize>,
    /// Simes combined p-value, a sort key only
    pub combined_p: f64,
    /// Step-up adjusted significance value
    pub adjusted: f64,
    /// Whether the cluster is significant at the target FDR
    pub retained: bool,
    /// Direction of the members driving the combined p-value
    pub direction: Direction,
    /// Index of the best member
    pub best: usize,
    /// Log-fold-change of the best member
    pub best_log_fc: f64,
    /// Abundance of the best member
    pub best_abundance: f64,
    /// P-value of the best member
    pub best_p_value: f64,
}

impl ClusterRecord {
    /// Tab separated row matching [`CLUSTER_HEADER`]
    pub fn to_row(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.region.anchor1.chrom,
            self.region.anchor1.start(),
            self.region.anchor1.end(),
            self.region.anchor2.chrom,
            self.region.anchor2.start(),
            self.region.anchor2.end(),
            self.id,
            self.members.len(),
            self.combined_p,
            self.adjusted,
            self.retained,
            self.direction,
            self.best_log_fc,
            self.best_abundance,
            self.best_p_value,
        )
    }
}

/// Accumulates the pieces of a [`ClusterRecord`] as they are computed
#[derive(Debug, Default)]
pub struct ClusterRecordBuilder {
    cluster: Option<Cluster>,
    evidence: Option<ClusterEvidence>,
    decision: Option<FdrDecision>,
    best: Option<(f64, f64, f64)>,
}

impl ClusterRecordBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cluster geometry and members
    pub fn cluster(mut self, cluster: Cluster) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Sets the combined evidence
    pub fn evidence(mut self, evidence: ClusterEvidence) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// Sets the step-up decision
    pub fn decision(mut self, decision: FdrDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Looks up the statistics of the best member in `pairs`. Requires the evidence.
    pub fn best_from(mut self, pairs: &[BinPair]) -> Result<Self> {
        let best = self
            .evidence
            .as_ref()
            .map(|e| e.best)
            .ok_or(Error::IncompleteRecord("combinedP"))?;
        let test = &pairs[best].test;
        let field = |value: Option<f64>, field: &'static str| {
            value.ok_or(Error::InconsistentStatistics { index: best, field })
        };
        self.best = Some((
            field(test.log_fc, "logFC")?,
            field(test.abundance, "logCPM")?,
            field(test.p_value, "PValue")?,
        ));
        Ok(self)
    }

    /// Finishes the record, failing if any piece is missing
    pub fn build(self) -> Result<ClusterRecord> {
        let cluster = self.cluster.ok_or(Error::IncompleteRecord("cluster"))?;
        let evidence = self.evidence.ok_or(Error::IncompleteRecord("combinedP"))?;
        let decision = self.decision.ok_or(Error::IncompleteRecord("FDR"))?;
        let (best_log_fc, best_abundance, best_p_value) =
            self.best.ok_or(Error::IncompleteRecord("best"))?;

        Ok(ClusterRecord {
            id: cluster.id,
            chrom_pair: cluster.chrom_pair,
            region: cluster.region,
            members: cluster.members,
            combined_p: evidence.combined_p,
            adjusted: decision.adjusted,
            retained: decision.retained,
            direction: evidence.direction,
            best: evidence.best,
            best_log_fc,
            best_abundance,
            best_p_value,
        })
    }
}

/// Cluster decision attached to one input bin pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Annotation {
    /// Cluster id, `None` when the bin pair failed the prefilter
    pub cluster: Option<usize>,
    /// Retained flag of the cluster
    pub retained: bool,
}

/// Spreads the cluster decisions onto every input bin pair
pub fn annotate(
    partition: &Partition,
    records: &[ClusterRecord],
    n_pairs: usize,
) -> Vec<Annotation> {
    (0..n_pairs)
        .map(|index| {
            let cluster = partition.cluster_of(index);
            Annotation {
                cluster,
                retained: cluster.map_or(false, |id| records[id].retained),
            }
        })
        .collect()
}

/// Cluster counts by direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionCounts {
    /// Clusters going up
    pub up: usize,
    /// Clusters going down
    pub down: usize,
    /// Clusters with disagreeing members
    pub mixed: usize,
}

impl DirectionCounts {
    fn add(&mut self, direction: Direction) {
        match direction {
            Direction::Up => self.up += 1,
            Direction::Down => self.down += 1,
            Direction::Mixed => self.mixed += 1,
        }
    }
}

/// Counts over all clusters and over the retained ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterSummary {
    /// Number of clusters
    pub total: usize,
    /// Number of retained clusters
    pub retained: usize,
    /// Directions of all clusters
    pub all: DirectionCounts,
    /// Directions of retained clusters
    pub significant: DirectionCounts,
}

impl ClusterSummary {
    /// Tallies `records`
    pub fn from_records(records: &[ClusterRecord]) -> Self {
        records.iter().fold(Self::default(), |mut summary, record| {
            summary.total += 1;
            summary.all.add(record.direction);
            if record.retained {
                summary.retained += 1;
                summary.significant.add(record.direction);
            }
            summary
        })
    }
}

/// Writes the cluster table, optionally only the retained clusters
pub fn write_clusters<W: Write>(
    records: &[ClusterRecord],
    retained_only: bool,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "{}", CLUSTER_HEADER)?;
    for record in records.iter().filter(|r| r.retained || !retained_only) {
        writeln!(out, "{}", record.to_row())?;
    }
    Ok(())
}

/// Writes one annotation row per input bin pair
pub fn write_annotations<W: Write>(
    pairs: &[BinPair],
    annotations: &[Annotation],
    out: &mut W,
) -> Result<()> {
    writeln!(out, "{}", ANNOTATION_NOTE)?;
    writeln!(out, "{}", ANNOTATION_HEADER)?;
    for (pair, annotation) in pairs.iter().zip(annotations) {
        let cluster = annotation
            .cluster
            .map_or_else(|| "NA".to_string(), |id| id.to_string());
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            pair.anchor1.chrom,
            pair.anchor1.start(),
            pair.anchor1.end(),
            pair.anchor2.chrom,
            pair.anchor2.start(),
            pair.anchor2.end(),
            cluster,
            annotation.retained
        )?;
    }
    Ok(())
}
