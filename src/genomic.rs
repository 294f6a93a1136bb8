//! Anchors, bin pairs and their test statistics.

use crate::error::Error;
use crate::Result;
use bio::utils::Interval;
use std::cmp::Ordering;
use std::fmt;

/// A genomic interval `[start, end)` on a named chromosome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Chromosome name
    pub chrom: String,
    /// Half-open coordinates
    pub interval: Interval<u64>,
}

impl Anchor {
    /// Creates an anchor, failing if `end < start`
    pub fn new<S: Into<String>>(chrom: S, start: u64, end: u64) -> Result<Self> {
        let interval = Interval::new(std::ops::Range { start, end })
            .map_err(|_| Error::InvalidInterval { start, end })?;
        Ok(Self {
            chrom: chrom.into(),
            interval,
        })
    }

    /// Start coordinate
    pub fn start(&self) -> u64 {
        self.interval.start
    }

    /// End coordinate (exclusive)
    pub fn end(&self) -> u64 {
        self.interval.end
    }

    /// Width of the interval in base pairs
    pub fn width(&self) -> u64 {
        self.end() - self.start()
    }

    /// Distance between two intervals on the same chromosome, zero when they overlap or abut
    pub fn gap(&self, other: &Anchor) -> u64 {
        gap(self.start(), self.end(), other.start(), other.end())
    }
}

impl Ord for Anchor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chrom
            .cmp(&other.chrom)
            .then(self.start().cmp(&other.start()))
            .then(self.end().cmp(&other.end()))
    }
}

impl PartialOrd for Anchor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start(), self.end())
    }
}

/// Gap between `[s1, e1)` and `[s2, e2)`
pub(crate) fn gap(s1: u64, e1: u64, s2: u64, e2: u64) -> u64 {
    if s2 >= e1 {
        s2 - e1
    } else if s1 >= e2 {
        s1 - e2
    } else {
        0
    }
}

/// The pair of chromosomes a bin pair lies on. Clusters never cross these.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChromPair(pub String, pub String);

impl fmt::Display for ChromPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, self.1)
    }
}

/// Direction of a log-fold-change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Positive log-fold-change
    Up,
    /// Negative log-fold-change
    Down,
    /// Members disagree (only used for clusters)
    Mixed,
}

impl Direction {
    /// Direction of a single log-fold-change. Zero is not considered `Up`.
    pub fn from_log_fc(log_fc: f64) -> Self {
        if log_fc > 0.0 {
            Direction::Up
        } else if log_fc < 0.0 {
            Direction::Down
        } else {
            Direction::Mixed
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// Per bin pair test results produced upstream. Missing values are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TestResult {
    /// Raw p-value
    pub p_value: Option<f64>,
    /// Log-fold-change between conditions
    pub log_fc: Option<f64>,
    /// Average abundance (log-CPM)
    pub abundance: Option<f64>,
}

impl TestResult {
    /// Creates a fully populated test result
    pub fn new(p_value: f64, log_fc: f64, abundance: f64) -> Self {
        Self {
            p_value: Some(p_value),
            log_fc: Some(log_fc),
            abundance: Some(abundance),
        }
    }

    /// Direction of the log-fold-change, if known
    pub fn direction(&self) -> Option<Direction> {
        self.log_fc.map(Direction::from_log_fc)
    }
}

/// An interaction between two anchors with its test statistics.
/// `anchor1` always precedes or equals `anchor2`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinPair {
    /// First anchor
    pub anchor1: Anchor,
    /// Second anchor
    pub anchor2: Anchor,
    /// Statistics from the upstream test
    pub test: TestResult,
}

impl BinPair {
    /// Creates a bin pair, swapping the anchors when they are given out of order
    pub fn new(first: Anchor, second: Anchor, test: TestResult) -> Self {
        let (anchor1, anchor2) = if second < first {
            (second, first)
        } else {
            (first, second)
        };
        Self {
            anchor1,
            anchor2,
            test,
        }
    }

    /// Chromosome pair the interaction lies on
    pub fn chrom_pair(&self) -> ChromPair {
        ChromPair(self.anchor1.chrom.clone(), self.anchor2.chrom.clone())
    }

    /// Whether two bin pairs are within `tol` of each other on both axes
    pub fn is_adjacent(&self, other: &BinPair, tol: u64) -> bool {
        self.anchor1.chrom == other.anchor1.chrom
            && self.anchor2.chrom == other.anchor2.chrom
            && self.anchor1.gap(&other.anchor1) <= tol
            && self.anchor2.gap(&other.anchor2) <= tol
    }
}

/// Bounding box of a set of bin pairs on one chromosome pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Extent on the first axis
    pub anchor1: Anchor,
    /// Extent on the second axis
    pub anchor2: Anchor,
}

impl Region {
    /// Bounding box of a single bin pair
    pub fn of(pair: &BinPair) -> Self {
        Self {
            anchor1: pair.anchor1.clone(),
            anchor2: pair.anchor2.clone(),
        }
    }

    /// Grows the box to cover `pair`. The caller guarantees the chromosomes match.
    pub fn extend(&mut self, pair: &BinPair) {
        self.anchor1 = cover(&self.anchor1, &pair.anchor1);
        self.anchor2 = cover(&self.anchor2, &pair.anchor2);
    }

    /// Span of the first axis
    pub fn span1(&self) -> u64 {
        self.anchor1.width()
    }

    /// Span of the second axis
    pub fn span2(&self) -> u64 {
        self.anchor2.width()
    }
}

fn cover(a: &Anchor, b: &Anchor) -> Anchor {
    let start = a.start().min(b.start());
    let end = a.end().max(b.end());
    Anchor {
        chrom: a.chrom.clone(),
        interval: Interval::from(start..end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(chrom: &str, start: u64, end: u64) -> Anchor {
        Anchor::new(chrom, start, end).unwrap()
    }

    #[test]
    fn test_gap_between_intervals() {
        let a = anchor("chr1", 0, 100);
        assert_eq!(a.gap(&anchor("chr1", 150, 200)), 50);
        assert_eq!(anchor("chr1", 150, 200).gap(&a), 50);
        assert_eq!(a.gap(&anchor("chr1", 100, 200)), 0);
        assert_eq!(a.gap(&anchor("chr1", 50, 60)), 0);
    }

    #[test]
    fn test_reversed_interval_is_rejected() {
        assert!(matches!(
            Anchor::new("chr1", 10, 5),
            Err(Error::InvalidInterval { start: 10, end: 5 })
        ));
        assert!(Anchor::new("chr1", 5, 5).is_ok());
    }

    #[test]
    fn test_anchors_are_ordered_on_construction() {
        let pair = BinPair::new(
            anchor("chr2", 0, 10),
            anchor("chr1", 500, 510),
            TestResult::default(),
        );
        assert_eq!(pair.anchor1.chrom, "chr1");
        assert_eq!(pair.chrom_pair(), ChromPair("chr1".into(), "chr2".into()));
    }

    #[test]
    fn test_adjacency_needs_both_axes() {
        let test = TestResult::default();
        let a = BinPair::new(anchor("chr1", 0, 10), anchor("chr1", 1000, 1010), test);
        let b = BinPair::new(anchor("chr1", 15, 25), anchor("chr1", 1012, 1020), test);
        let c = BinPair::new(anchor("chr1", 15, 25), anchor("chr1", 2000, 2010), test);
        assert!(a.is_adjacent(&b, 5));
        assert!(!a.is_adjacent(&b, 4));
        assert!(!a.is_adjacent(&c, 5));
    }

    #[test]
    fn test_region_covers_members() {
        let test = TestResult::default();
        let mut region = Region::of(&BinPair::new(
            anchor("chr1", 100, 200),
            anchor("chr1", 900, 1000),
            test,
        ));
        region.extend(&BinPair::new(
            anchor("chr1", 50, 120),
            anchor("chr1", 950, 1300),
            test,
        ));
        assert_eq!(region.anchor1, anchor("chr1", 50, 200));
        assert_eq!(region.anchor2, anchor("chr1", 900, 1300));
        assert_eq!(region.span1(), 150);
        assert_eq!(region.span2(), 400);
    }

    #[test]
    fn test_direction_from_log_fc() {
        assert_eq!(Direction::from_log_fc(1.5), Direction::Up);
        assert_eq!(Direction::from_log_fc(-0.2), Direction::Down);
        assert_eq!(Direction::Mixed.to_string(), "mixed");
    }
}
