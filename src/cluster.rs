//! Single-linkage clustering of significant bin pairs.
//!
//! Candidates are grouped by chromosome pair, linked when they lie within `tol` of each
//! other on both axes, and clusters wider than `upper` are split at their largest gap.

use crate::config::ClusterConfig;
use crate::error::Error;
use crate::genomic::{BinPair, ChromPair, Region};
use crate::Result;
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// A group of adjacent bin pairs treated as one discovery
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Cluster id, unique within a partition
    pub id: usize,
    /// Chromosome pair shared by every member
    pub chrom_pair: ChromPair,
    /// Member indices into the input, ascending
    pub members: Vec<usize>,
    /// Bounding box of the members
    pub region: Region,
}

impl Cluster {
    /// Builds a cluster from member indices, checking they share a chromosome pair
    pub fn new(id: usize, mut members: Vec<usize>, pairs: &[BinPair]) -> Result<Self> {
        members.sort_unstable();
        let first = match members.first() {
            Some(&first) => &pairs[first],
            None => return Err(Error::EmptyCluster { cluster: id }),
        };
        let chrom_pair = first.chrom_pair();
        let mut region = Region::of(first);
        for &member in &members[1..] {
            let pair = &pairs[member];
            let other = pair.chrom_pair();
            if other != chrom_pair {
                return Err(Error::CrossChromosomeMerge {
                    cluster: id,
                    first: chrom_pair.to_string(),
                    second: other.to_string(),
                });
            }
            region.extend(pair);
        }
        Ok(Self {
            id,
            chrom_pair,
            members,
            region,
        })
    }

    /// Number of member bin pairs
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Clusters of one run together with the cluster of every input bin pair
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Clusters ordered by id
    pub clusters: Vec<Cluster>,
    assignment: Vec<Option<usize>>,
}

impl Partition {
    /// Cluster id of bin pair `index`, `None` when it was not a candidate
    pub fn cluster_of(&self, index: usize) -> Option<usize> {
        self.assignment.get(index).copied().flatten()
    }

    /// Number of clusters
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether no cluster was formed
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Cluster sizes in id order
    pub fn sizes(&self) -> Vec<usize> {
        self.clusters.iter().map(Cluster::size).collect()
    }
}

/// Indices of bin pairs whose raw p-value is below `cutoff`. A missing p-value, or one
/// outside [0, 1], is fatal.
pub fn select_by_pvalue(pairs: &[BinPair], cutoff: f64) -> Result<Vec<usize>> {
    pairs
        .iter()
        .enumerate()
        .filter_map(|(index, pair)| match pair.test.p_value {
            Some(p) if !(0.0..=1.0).contains(&p) => Some(Err(Error::InconsistentStatistics {
                index,
                field: "PValue",
            })),
            Some(p) if p < cutoff => Some(Ok(index)),
            Some(_) => None,
            None => Some(Err(Error::InconsistentStatistics {
                index,
                field: "PValue",
            })),
        })
        .collect()
}

/// Partitions the `candidates` into clusters. Chromosome pairs are processed in parallel.
pub fn build_clusters(
    pairs: &[BinPair],
    candidates: &[usize],
    config: &ClusterConfig,
) -> Result<Partition> {
    let mut by_chrom_pair = BTreeMap::<ChromPair, Vec<usize>>::new();
    for &index in candidates {
        by_chrom_pair
            .entry(pairs[index].chrom_pair())
            .or_default()
            .push(index);
    }

    if by_chrom_pair.is_empty() {
        warn!("No bin pairs passed the prefilter, no clusters were formed");
    }

    let tol = config.tol();
    let upper = config.upper();
    let groups = by_chrom_pair
        .into_iter()
        .collect::<Vec<(ChromPair, Vec<usize>)>>()
        .into_par_iter()
        .map(|(chrom_pair, members)| {
            let mut groups = Vec::new();
            for component in single_linkage(pairs, &members, tol) {
                match upper {
                    Some(upper) => enforce_upper(pairs, component, tol, upper, &mut groups),
                    None => groups.push(component),
                }
            }
            groups.sort_by_key(|group| group[0]);
            debug!(
                "Chromosome pair {} has {} candidates in {} clusters",
                chrom_pair,
                members.len(),
                groups.len()
            );
            groups
        })
        .collect::<Vec<Vec<Vec<usize>>>>();

    let mut assignment = vec![None; pairs.len()];
    let mut clusters = Vec::new();
    for members in groups.into_iter().flatten() {
        let id = clusters.len();
        for &member in &members {
            assignment[member] = Some(id);
        }
        clusters.push(Cluster::new(id, members, pairs)?);
    }

    debug!(
        "Formed {} clusters from {} candidate bin pairs",
        clusters.len(),
        candidates.len()
    );
    Ok(Partition {
        clusters,
        assignment,
    })
}

/// Connected components of the adjacency graph over `members`, each sorted ascending
fn single_linkage(pairs: &[BinPair], members: &[usize], tol: u64) -> Vec<Vec<usize>> {
    let mut order = (0..members.len()).collect::<Vec<usize>>();
    order.sort_by_key(|&k| (pairs[members[k]].anchor1.start(), members[k]));

    let mut sets = DisjointSet::new(members.len());
    // Earlier starts that can still reach the current start on the first axis
    let mut active: Vec<usize> = Vec::new();
    for &k in &order {
        let current = &pairs[members[k]];
        let start = current.anchor1.start();
        active.retain(|&j| pairs[members[j]].anchor1.end().saturating_add(tol) >= start);
        for &j in &active {
            if pairs[members[j]].anchor2.gap(&current.anchor2) <= tol {
                sets.union(j, k);
            }
        }
        active.push(k);
    }

    let mut components = BTreeMap::<usize, Vec<usize>>::new();
    for (k, &member) in members.iter().enumerate() {
        components.entry(sets.find(k)).or_default().push(member);
    }
    let mut components = components
        .into_iter()
        .map(|(_, mut component)| {
            component.sort_unstable();
            component
        })
        .collect::<Vec<Vec<usize>>>();
    components.sort_by_key(|component| component[0]);
    components
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    First,
    Second,
}

/// Splits `component` until every multi-member part spans at most `upper` on both axes
fn enforce_upper(
    pairs: &[BinPair],
    component: Vec<usize>,
    tol: u64,
    upper: u64,
    out: &mut Vec<Vec<usize>>,
) {
    let mut pending = vec![component];
    while let Some(group) = pending.pop() {
        if group.len() == 1 {
            out.push(group);
            continue;
        }
        let mut region = Region::of(&pairs[group[0]]);
        for &member in &group[1..] {
            region.extend(&pairs[member]);
        }
        let axis = if region.span1() > upper {
            Axis::First
        } else if region.span2() > upper {
            Axis::Second
        } else {
            out.push(group);
            continue;
        };

        debug!(
            "Splitting a cluster of {} bin pairs spanning {}x{} bp",
            group.len(),
            region.span1(),
            region.span2()
        );
        let (left, right) = split_at_largest_gap(pairs, &group, axis);
        for part in vec![left, right] {
            pending.extend(single_linkage(pairs, &part, tol));
        }
    }
}

/// Cuts `group` in two at the widest gap along `axis`; the first of equal gaps wins
fn split_at_largest_gap(
    pairs: &[BinPair],
    group: &[usize],
    axis: Axis,
) -> (Vec<usize>, Vec<usize>) {
    let bounds = |index: usize| {
        let anchor = match axis {
            Axis::First => &pairs[index].anchor1,
            Axis::Second => &pairs[index].anchor2,
        };
        (anchor.start(), anchor.end())
    };

    let mut sorted = group.to_vec();
    sorted.sort_by_key(|&index| (bounds(index), index));

    let mut reach = bounds(sorted[0]).1;
    let mut best_cut = 0;
    let mut best_gap = i128::MIN;
    for k in 1..sorted.len() {
        let (start, end) = bounds(sorted[k]);
        let gap = start as i128 - reach as i128;
        if gap > best_gap {
            best_gap = gap;
            best_cut = k;
        }
        reach = reach.max(end);
    }

    let right = sorted.split_off(best_cut);
    (sorted, right)
}

/// Union-find over `0..n` with path halving and union by rank
#[derive(Debug)]
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        match self.rank[a].cmp(&self.rank[b]) {
            std::cmp::Ordering::Less => self.parent[a] = b,
            std::cmp::Ordering::Greater => self.parent[b] = a,
            std::cmp::Ordering::Equal => {
                self.parent[b] = a;
                self.rank[a] += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Prefilter, Weighting};
    use crate::genomic::{Anchor, TestResult};

    fn pair(chrom: &str, start1: u64, end1: u64, start2: u64, end2: u64) -> BinPair {
        BinPair::new(
            Anchor::new(chrom, start1, end1).unwrap(),
            Anchor::new(chrom, start2, end2).unwrap(),
            TestResult::new(0.001, 1.0, 5.0),
        )
    }

    fn config(tol: u64, upper: Option<u64>) -> ClusterConfig {
        ClusterConfig::new(Prefilter::PValue(0.05), tol, upper, 0.05, Weighting::Uniform).unwrap()
    }

    fn all(pairs: &[BinPair]) -> Vec<usize> {
        (0..pairs.len()).collect()
    }

    fn members(partition: &Partition) -> Vec<Vec<usize>> {
        partition
            .clusters
            .iter()
            .map(|cluster| cluster.members.clone())
            .collect()
    }

    /// Deterministic pseudo-random bin pairs on a few chromosome pairs
    fn scattered(n: usize) -> Vec<BinPair> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            state >> 33
        };
        (0..n)
            .map(|_| {
                let chrom = if next() % 3 == 0 { "chr2" } else { "chr1" };
                let start1 = (next() % 200) * 1000;
                let start2 = start1 + (next() % 50) * 1000;
                pair(chrom, start1, start1 + 1000, start2, start2 + 1000)
            })
            .collect()
    }

    #[test]
    fn test_nearby_pairs_merge_and_distant_pair_is_singleton() {
        let pairs = vec![
            pair("chr1", 100_000, 100_001, 9_000_000, 9_000_001),
            pair("chr1", 150_000, 150_001, 9_000_000, 9_000_001),
            pair("chr1", 5_000_000, 5_000_001, 9_000_000, 9_000_001),
        ];
        let partition = build_clusters(&pairs, &all(&pairs), &config(100_000, None)).unwrap();
        assert_eq!(members(&partition), vec![vec![0, 1], vec![2]]);
        assert_eq!(partition.cluster_of(1), Some(0));
        assert_eq!(partition.cluster_of(2), Some(1));
    }

    #[test]
    fn test_upper_bound_rejects_merge() {
        let pairs = vec![
            pair("chr1", 0, 9_000, 50_000, 59_000),
            pair("chr1", 10_000, 19_000, 50_000, 59_000),
        ];
        let unbounded = build_clusters(&pairs, &all(&pairs), &config(5_000, None)).unwrap();
        assert_eq!(unbounded.len(), 1);

        let bounded = build_clusters(&pairs, &all(&pairs), &config(5_000, Some(8_000))).unwrap();
        assert_eq!(members(&bounded), vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_upper_split_prefers_largest_gap() {
        let pairs = vec![
            pair("chr1", 0, 100, 1_000, 1_100),
            pair("chr1", 110, 200, 1_000, 1_100),
            pair("chr1", 250, 300, 1_000, 1_100),
            pair("chr1", 305, 400, 1_000, 1_100),
        ];
        let partition = build_clusters(&pairs, &all(&pairs), &config(60, Some(300))).unwrap();
        assert_eq!(members(&partition), vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn test_transitive_linkage() {
        let pairs = vec![
            pair("chr1", 0, 10, 100, 110),
            pair("chr1", 20, 30, 120, 130),
            pair("chr1", 40, 50, 140, 150),
        ];
        let partition = build_clusters(&pairs, &all(&pairs), &config(10, None)).unwrap();
        assert_eq!(members(&partition), vec![vec![0, 1, 2]]);
        assert!(!pairs[0].is_adjacent(&pairs[2], 10));
        let region = &partition.clusters[0].region;
        assert_eq!((region.anchor1.start(), region.anchor1.end()), (0, 50));
        assert_eq!((region.anchor2.start(), region.anchor2.end()), (100, 150));
    }

    #[test]
    fn test_second_axis_must_also_be_close() {
        let pairs = vec![
            pair("chr1", 0, 10, 100, 110),
            pair("chr1", 10, 20, 500, 510),
        ];
        let partition = build_clusters(&pairs, &all(&pairs), &config(10, None)).unwrap();
        assert_eq!(partition.len(), 2);
    }

    #[test]
    fn test_chromosome_pairs_never_share_a_cluster() {
        let pairs = vec![
            pair("chr1", 0, 10, 100, 110),
            pair("chr2", 0, 10, 100, 110),
            pair("chr1", 5, 15, 105, 115),
        ];
        let partition = build_clusters(&pairs, &all(&pairs), &config(1_000, None)).unwrap();
        assert_eq!(members(&partition), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_empty_candidates_give_no_clusters() {
        let pairs = vec![pair("chr1", 0, 10, 100, 110)];
        let partition = build_clusters(&pairs, &[], &config(10, Some(100))).unwrap();
        assert!(partition.is_empty());
        assert_eq!(partition.cluster_of(0), None);
    }

    #[test]
    fn test_select_by_pvalue() {
        let mut pairs = vec![pair("chr1", 0, 10, 0, 10), pair("chr1", 0, 10, 0, 10)];
        pairs[1].test.p_value = Some(0.5);
        assert_eq!(select_by_pvalue(&pairs, 0.05).unwrap(), vec![0]);
        pairs[1].test.p_value = None;
        assert!(matches!(
            select_by_pvalue(&pairs, 0.05),
            Err(Error::InconsistentStatistics { index: 1, .. })
        ));
    }

    #[test]
    fn test_select_by_pvalue_rejects_out_of_range() {
        let mut pairs = vec![pair("chr1", 0, 10, 0, 10), pair("chr1", 0, 10, 0, 10)];
        pairs[0].test.p_value = Some(-0.5);
        pairs[1].test.p_value = Some(0.9);
        assert!(matches!(
            select_by_pvalue(&pairs, 1.0),
            Err(Error::InconsistentStatistics { index: 0, field: "PValue" })
        ));
        pairs[0].test.p_value = Some(1.5);
        assert!(matches!(
            select_by_pvalue(&pairs, 1.0),
            Err(Error::InconsistentStatistics { index: 0, .. })
        ));
        pairs[0].test.p_value = Some(1.0);
        assert_eq!(select_by_pvalue(&pairs, 1.0).unwrap(), vec![1]);
    }

    #[test]
    fn test_cluster_new_rejects_empty_members() {
        let pairs = vec![pair("chr1", 0, 10, 0, 10)];
        assert!(matches!(
            Cluster::new(3, vec![], &pairs),
            Err(Error::EmptyCluster { cluster: 3 })
        ));
    }

    #[test]
    fn test_cluster_new_rejects_mixed_chromosomes() {
        let pairs = vec![pair("chr1", 0, 10, 0, 10), pair("chr2", 0, 10, 0, 10)];
        assert!(matches!(
            Cluster::new(0, vec![0, 1], &pairs),
            Err(Error::CrossChromosomeMerge { .. })
        ));
    }

    #[test]
    fn test_partition_covers_candidates_exactly_once() {
        let pairs = scattered(400);
        let candidates = (0..pairs.len()).filter(|i| i % 4 != 0).collect::<Vec<_>>();
        let partition = build_clusters(&pairs, &candidates, &config(2_000, Some(20_000))).unwrap();

        let mut seen = partition
            .clusters
            .iter()
            .flat_map(|cluster| cluster.members.iter().copied())
            .collect::<Vec<_>>();
        seen.sort_unstable();
        assert_eq!(seen, candidates);

        for cluster in &partition.clusters {
            for &member in &cluster.members {
                assert_eq!(pairs[member].chrom_pair(), cluster.chrom_pair);
                assert_eq!(partition.cluster_of(member), Some(cluster.id));
            }
            if cluster.size() > 1 {
                assert!(cluster.region.span1() <= 20_000);
                assert!(cluster.region.span2() <= 20_000);
            }
        }
    }

    #[test]
    fn test_larger_tol_only_merges() {
        let pairs = scattered(300);
        let candidates = all(&pairs);
        let narrow = build_clusters(&pairs, &candidates, &config(500, None)).unwrap();
        let wide = build_clusters(&pairs, &candidates, &config(3_000, None)).unwrap();
        assert!(wide.len() <= narrow.len());
        for cluster in &narrow.clusters {
            let target = wide.cluster_of(cluster.members[0]);
            assert!(cluster
                .members
                .iter()
                .all(|&member| wide.cluster_of(member) == target));
        }
    }

    #[test]
    fn test_larger_tol_can_split_under_upper_bound() {
        // 0 and 1 link on the first axis alone; 2 joins only at the wider tol,
        // which pushes the span past `upper` and cuts between 0 and 1
        let pairs = vec![
            pair("chr1", 0, 10, 1_000, 1_010),
            pair("chr1", 30, 40, 1_000, 1_010),
            pair("chr1", 40, 75, 1_050, 1_060),
        ];
        let candidates = all(&pairs);
        let narrow = build_clusters(&pairs, &candidates, &config(20, Some(60))).unwrap();
        let wide = build_clusters(&pairs, &candidates, &config(100, Some(60))).unwrap();
        assert_eq!(members(&narrow), vec![vec![0, 1], vec![2]]);
        assert_eq!(members(&wide), vec![vec![0], vec![1, 2]]);

        let unbounded = build_clusters(&pairs, &candidates, &config(100, None)).unwrap();
        assert_eq!(members(&unbounded), vec![vec![0, 1, 2]]);

        for partition in &[narrow, wide] {
            for cluster in partition.clusters.iter().filter(|c| c.size() > 1) {
                assert!(cluster.region.span1() <= 60);
                assert!(cluster.region.span2() <= 60);
            }
        }
    }

    #[test]
    fn test_clustering_is_deterministic() {
        let pairs = scattered(300);
        let candidates = all(&pairs);
        let first = build_clusters(&pairs, &candidates, &config(1_500, Some(10_000))).unwrap();
        let second = build_clusters(&pairs, &candidates, &config(1_500, Some(10_000))).unwrap();
        assert_eq!(first, second);
    }
}
