//! Reading tested bin pairs from tab separated tables.

use crate::error::Error;
use crate::genomic::{Anchor, BinPair, TestResult};
use crate::Result;
use log::{debug, info};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Columns every input table must carry
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "chr1", "start1", "end1", "chr2", "start2", "end2", "logFC", "logCPM", "PValue",
];

/// Reads a (possibly gzipped) tab separated table of tested bin pairs
pub fn read_bin_pairs<P: AsRef<Path>>(path: P) -> Result<Vec<BinPair>> {
    info!("Reading bin pairs from {}...", path.as_ref().display());
    let (rdr, format) = niffler::from_path(path)?;
    debug!("Input compression detected as {:?}", format);
    parse_bin_pairs(std::io::BufReader::new(rdr))
}

/// Parses bin pairs from a reader over the table
pub fn parse_bin_pairs<R: BufRead>(rdr: R) -> Result<Vec<BinPair>> {
    let mut lines = rdr
        .lines()
        .enumerate()
        .filter(|(_, line)| match line {
            Ok(line) => !line.trim().is_empty() && !line.starts_with('#'),
            Err(_) => true,
        });

    let columns = match lines.next() {
        Some((_, header)) => column_positions(&header?)?,
        None => return Ok(Vec::new()),
    };

    let mut pairs = Vec::new();
    for (i, line) in lines {
        let line = line?;
        pairs.push(parse_record(&line, i + 1, &columns)?);
    }
    info!("Read {} bin pairs", pairs.len());
    Ok(pairs)
}

fn column_positions(header: &str) -> Result<[usize; 9]> {
    let names = header
        .split('\t')
        .enumerate()
        .map(|(i, name)| (name.trim(), i))
        .collect::<HashMap<&str, usize>>();
    let mut columns = [0; 9];
    for (slot, required) in columns.iter_mut().zip(REQUIRED_COLUMNS.iter()) {
        *slot = *names
            .get(required)
            .ok_or_else(|| Error::MissingColumn(required.to_string()))?;
    }
    Ok(columns)
}

fn parse_record(line: &str, line_no: usize, columns: &[usize; 9]) -> Result<BinPair> {
    let fields = line.split('\t').map(str::trim).collect::<Vec<&str>>();
    let field = |k: usize| {
        fields.get(columns[k]).copied().ok_or_else(|| Error::MalformedRecord {
            line: line_no,
            reason: format!("missing `{}` field", REQUIRED_COLUMNS[k]),
        })
    };
    let coordinate = |k: usize| -> Result<u64> {
        let value = field(k)?;
        value.parse::<u64>().map_err(|_| Error::MalformedRecord {
            line: line_no,
            reason: format!("`{}` is not a coordinate: {}", REQUIRED_COLUMNS[k], value),
        })
    };
    let statistic = |k: usize| -> Result<Option<f64>> {
        match field(k)? {
            "" | "NA" | "NaN" => Ok(None),
            value => value.parse::<f64>().map(Some).map_err(|_| Error::MalformedRecord {
                line: line_no,
                reason: format!("`{}` is not a number: {}", REQUIRED_COLUMNS[k], value),
            }),
        }
    };

    let anchor = |chrom: usize, start: usize, end: usize| -> Result<Anchor> {
        let (start, end) = (coordinate(start)?, coordinate(end)?);
        Anchor::new(field(chrom)?, start, end)
            .map_err(|_| Error::IncorrectInterval(line_no, start, end))
    };

    let first = anchor(0, 1, 2)?;
    let second = anchor(3, 4, 5)?;
    let test = TestResult {
        log_fc: statistic(6)?,
        abundance: statistic(7)?,
        p_value: statistic(8)?,
    };
    Ok(BinPair::new(first, second, test))
}
