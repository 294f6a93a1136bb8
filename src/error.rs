//! Error type shared by the library and the binary.

use thiserror::Error;

#[derive(Debug, Error)]
/// Errors raised while validating parameters, clustering bin pairs or reading/writing tables
pub enum Error {
    #[error("Invalid parameter `{name}`: {reason}")]
    /// A clustering or FDR parameter is outside its valid range
    InvalidParameter {
        /// Name of the offending parameter
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },
    #[error("Bin pair {index} has a missing or invalid `{field}` statistic")]
    /// A bin pair taking part in clustering lacks a required test statistic, or
    /// carries a p-value outside [0, 1]
    InconsistentStatistics {
        /// Index of the bin pair in the input
        index: usize,
        /// Name of the offending statistic
        field: &'static str,
    },
    #[error("Cluster {cluster} has no members")]
    /// A cluster was built from an empty member list
    EmptyCluster {
        /// Cluster id
        cluster: usize,
    },
    #[error("Cluster record is missing its {0}")]
    /// A cluster record was built before all of its parts were supplied
    IncompleteRecord(&'static str),
    #[error("Cluster {cluster} spans more than one chromosome pair ({first} and {second})")]
    /// Members of one cluster lie on different chromosome pairs
    CrossChromosomeMerge {
        /// Cluster id
        cluster: usize,
        /// Chromosome pair of the first member
        first: String,
        /// Chromosome pair of the offending member
        second: String,
    },
    #[error("Could not read or write the table")]
    /// I/O failure while reading or writing
    Io(#[from] std::io::Error),
    #[error("Could not open the (possibly compressed) input")]
    /// Failure to detect or open compression
    Compression(#[from] niffler::Error),
    #[error("Could not parse line {line}: {reason}")]
    /// A line of the input table could not be parsed
    MalformedRecord {
        /// Line number in the input (1-based)
        line: usize,
        /// What went wrong
        reason: String,
    },
    #[error("Input header is missing the `{0}` column")]
    /// A required column is absent from the header
    MissingColumn(String),
    #[error("Incorrect interval on line {0}, end {2} is smaller than start {1}")]
    /// Interval with end before start
    IncorrectInterval(usize, u64, u64),
    #[error("Invalid interval, end {end} is smaller than start {start}")]
    /// Anchor built with end before start, outside of any input file
    InvalidInterval {
        /// Requested start
        start: u64,
        /// Requested end
        end: u64,
    },
    #[error("Could not spawn threads")]
    /// Create thread pools error
    ThreadError,
}

impl Error {
    pub(crate) fn invalid_parameter<S: Into<String>>(name: &'static str, reason: S) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
