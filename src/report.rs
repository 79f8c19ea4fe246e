// TRIALMON REPORT FILES
// RAW LOG (APPEND-ONLY TEXT), PROCESSED TRIALS CSV, SUMMARY CSV.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ExperimentError, Result};
use crate::parse::TrialResult;
use crate::stats::SummaryRecord;

pub const PROCESSED_HEADER: [&str; 5] = ["iteration", "total", "real", "user", "sys"];
pub const SUMMARY_HEADER: [&str; 5] = ["", "total", "real", "user", "sys"];

// ONE TRIAL'S OUTPUT FOLLOWED BY A BLANK LINE. NEVER TRUNCATES.
pub fn append_raw_output(path: &Path, output: &str) -> Result<()> {
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    f.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        f.write_all(b"\n")?;
    }
    f.write_all(b"\n")?;
    log::debug!("raw output written to {}", path.display());
    Ok(())
}

fn opt_cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

pub fn write_processed(path: &Path, results: &[TrialResult]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(PROCESSED_HEADER)?;
    for r in results {
        wtr.write_record([
            r.iteration.to_string(),
            r.total.to_string(),
            opt_cell(r.real),
            opt_cell(r.user),
            opt_cell(r.sys),
        ])?;
    }
    wtr.flush()?;
    log::debug!("processed output written to {}", path.display());
    Ok(())
}

pub fn read_processed(path: &Path) -> Result<Vec<TrialResult>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let col = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| ExperimentError::MalformedRecord {
                path: path.to_path_buf(),
                reason: format!("missing column {:?}", name),
            })
    };
    let idx = [col("iteration")?, col("total")?, col("real")?, col("user")?, col("sys")?];

    let malformed = |line: u64, cell: &str| ExperimentError::MalformedRecord {
        path: path.to_path_buf(),
        reason: format!("line {}: bad value {:?}", line, cell),
    };

    let mut results = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let cell = |i: usize| record.get(idx[i]).unwrap_or("").trim();
        let opt = |i: usize| -> Result<Option<f64>> {
            let c = cell(i);
            if c.is_empty() {
                return Ok(None);
            }
            c.parse().map(Some).map_err(|_| malformed(line, c))
        };
        results.push(TrialResult {
            iteration: cell(0).parse().map_err(|_| malformed(line, cell(0)))?,
            total: cell(1).parse().map_err(|_| malformed(line, cell(1)))?,
            real: opt(2)?,
            user: opt(3)?,
            sys: opt(4)?,
        });
    }
    Ok(results)
}

pub fn write_summary(path: &Path, summary: &SummaryRecord) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(SUMMARY_HEADER)?;
    for (label, t) in summary.rows() {
        wtr.write_record([
            label.to_string(),
            t.total.to_string(),
            t.real.to_string(),
            t.user.to_string(),
            t.sys.to_string(),
        ])?;
    }
    wtr.flush()?;
    log::debug!("summary output written to {}", path.display());
    Ok(())
}

pub fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::info!("file {} deleted", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("file {} not found", path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

// EVERY *-raw.txt UNDER root, RECURSIVELY, SORTED
pub fn find_raw_logs(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                log::error!("cannot read {}: {}", dir.display(), e);
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.to_string_lossy().ends_with("-raw.txt") {
                log::debug!("raw file found: {}", path.display());
                found.push(path);
            }
        }
    }
    found.sort();
    found
}
