// plandiff-core/src/digest.rs
//! Per-digest timing statistics and before/after report comparison.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use serde::Serialize;

use crate::audit::AuditRecord;

pub const BENCH_HEADER: &str = "SQL DIGEST\tSQL count\tMax time(ms)\tMin time(ms)\tAvg time(ms)";
pub const CMP_HEADER: &str = "SQL DIGEST\tOriginal(ms)\tNew(ms)\tPerformance boost";

/// Column of a benchmark report holding the timing compared across runs.
const REPORT_TIME_COLUMN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DigestStat {
    pub count: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub avg_ms: f64,
}

impl DigestStat {
    pub fn first(elapsed_ms: u64) -> Self {
        Self {
            count: 1,
            min_ms: elapsed_ms,
            max_ms: elapsed_ms,
            avg_ms: elapsed_ms as f64,
        }
    }

    /// Fold one more observation in; the mean is updated incrementally.
    pub fn touch(&mut self, elapsed_ms: u64) {
        self.min_ms = self.min_ms.min(elapsed_ms);
        self.max_ms = self.max_ms.max(elapsed_ms);
        let n = self.count as f64;
        self.avg_ms = (self.avg_ms * n + elapsed_ms as f64) / (n + 1.0);
        self.count += 1;
    }
}

#[derive(Debug, Default)]
pub struct DigestAggregator {
    stats: BTreeMap<String, DigestStat>,
}

impl DigestAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&mut self, digest: &str, elapsed_ms: u64) {
        match self.stats.get_mut(digest) {
            Some(stat) => stat.touch(elapsed_ms),
            None => {
                self.stats.insert(digest.to_string(), DigestStat::first(elapsed_ms));
            }
        }
    }

    /// Accumulate a record if it is a successful query carrying a digest.
    pub fn observe(&mut self, record: &AuditRecord) -> bool {
        if !record.is_query || record.is_error() || record.digest.is_empty() {
            return false;
        }
        self.touch(&record.digest, record.elapsed_ms);
        true
    }

    pub fn get(&self, digest: &str) -> Option<&DigestStat> {
        self.stats.get(digest)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DigestStat)> {
        self.stats.iter()
    }

    pub fn write_report<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "{}", BENCH_HEADER)?;
        for (digest, s) in &self.stats {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{:.2}",
                digest, s.count, s.max_ms, s.min_ms, s.avg_ms
            )?;
        }
        w.flush()
    }
}

/// One digest's timing before and after a change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedupRow {
    pub digest: String,
    pub before_ms: f64,
    pub after_ms: Option<f64>,
}

impl SpeedupRow {
    /// `before / after`; `None` when the digest is missing afterwards or took 0ms.
    pub fn speedup(&self) -> Option<f64> {
        match self.after_ms {
            Some(after) if after > 0.0 => Some(self.before_ms / after),
            _ => None,
        }
    }
}

/// Read a benchmark report into `digest -> time`. The header line is skipped
/// and malformed lines are ignored.
pub fn read_report<R: BufRead>(reader: R) -> io::Result<BTreeMap<String, f64>> {
    let mut out = BTreeMap::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if idx == 0 || line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        let time = cols
            .get(REPORT_TIME_COLUMN)
            .and_then(|t| t.trim().parse::<f64>().ok());
        match time {
            Some(t) => {
                out.insert(cols[0].to_string(), t);
            }
            None => tracing::warn!(line = idx + 1, "skipping malformed report line"),
        }
    }
    Ok(out)
}

/// Pair every digest of `before` with its time in `after`.
pub fn compare_reports(before: &BTreeMap<String, f64>, after: &BTreeMap<String, f64>) -> Vec<SpeedupRow> {
    before
        .iter()
        .map(|(digest, t1)| SpeedupRow {
            digest: digest.clone(),
            before_ms: *t1,
            after_ms: after.get(digest).copied(),
        })
        .collect()
}

pub fn write_comparison<W: Write>(rows: &[SpeedupRow], mut w: W) -> io::Result<()> {
    writeln!(w, "{}", CMP_HEADER)?;
    for row in rows {
        let after = row
            .after_ms
            .map(|t| format!("{:.2}", t))
            .unwrap_or_else(|| "NULL".to_string());
        let boost = row
            .speedup()
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "NULL".to_string());
        writeln!(w, "{}\t{:.2}\t{}\t{}", row.digest, row.before_ms, after, boost)?;
    }
    w.flush()
}
