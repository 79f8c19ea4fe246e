// TRIALMON ARTIFACT CORRELATOR
// FLAT BATCH DIRECTORY -> <date>-t<threads>/<kernel>--<benchmark>-{raw.txt,cpuusage.csv}
//
// INPUT NAMES: <YYYYMMDD>-<HHMM>-<kernel-with-dashes>-<benchmark>-<threads>-result.txt
// PLUS SIBLINGS <head>-err.txt AND <head>-usage.csv.
// A BAD ENTRY IS SKIPPED WITH ONE LOGGED ERROR; THE BATCH CONTINUES.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::Result;

const RESULT_SUFFIX: &str = "-result.txt";
const ERR_SUFFIX: &str = "-err.txt";
const USAGE_SUFFIX: &str = "-usage.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactGroup {
    pub date: String,
    pub time: String,
    pub kernel: String,
    pub benchmark: String,
    pub threads: u32,
}

impl ArtifactGroup {
    pub fn dir_name(&self) -> String {
        format!("{}-t{}", self.date, self.threads)
    }

    fn dest_file(&self, kind: &str) -> String {
        format!("{}--{}-{}", self.kernel, self.benchmark, kind)
    }
}

fn head_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // KERNEL IS GREEDY: BENCHMARK AND THREADS ARE THE LAST TWO DASH FIELDS
    RE.get_or_init(|| {
        Regex::new(r"^(\d{8})-(\d{4})-(.+)-([^-]+)-(\d+)$").expect("static regex")
    })
}

// HEAD = FILENAME MINUS -result.txt. None ON A BAD DATE, TIME OR THREAD FIELD
pub fn parse_head(head: &str) -> Option<ArtifactGroup> {
    let caps = head_pattern().captures(head)?;
    let date = NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok()?;
    let (hh, mm) = caps[2].split_at(2);
    if hh.parse::<u32>().ok()? > 23 || mm.parse::<u32>().ok()? > 59 {
        return None;
    }
    Some(ArtifactGroup {
        date: date.format("%Y-%m-%d").to_string(),
        time: format!("{}:{}", hh, mm),
        kernel: caps[3].to_string(),
        benchmark: caps[4].to_string(),
        threads: caps[5].parse().ok()?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MalformedName,
    ErrorLogNotEmpty(PathBuf),
    ErrorLogUnreadable(PathBuf, String),
    CopyFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MalformedName => write!(f, "unparsable filename"),
            SkipReason::ErrorLogNotEmpty(p) => write!(f, "error file is not empty: {}", p.display()),
            SkipReason::ErrorLogUnreadable(p, e) => {
                write!(f, "cannot check error file {}: {}", p.display(), e)
            }
            SkipReason::CopyFailed(e) => write!(f, "copy failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArtifact {
    pub head: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct CorrelationReport {
    pub placed: BTreeMap<(String, u32), PathBuf>,
    pub skipped: Vec<SkippedArtifact>,
    pub copied: usize,
}

// MISSING COUNTS AS EMPTY. ANY OTHER FAILURE SKIPS THE ENTRY.
fn check_error_log(path: &Path) -> std::result::Result<(), SkipReason> {
    match fs::metadata(path) {
        Ok(m) if m.len() > 0 => Err(SkipReason::ErrorLogNotEmpty(path.to_path_buf())),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("no error file at {}", path.display());
            Ok(())
        }
        Err(e) => Err(SkipReason::ErrorLogUnreadable(path.to_path_buf(), e.to_string())),
    }
}

fn result_heads(dir: &Path) -> Result<Vec<String>> {
    let mut heads = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if let Some(head) = name.strip_suffix(RESULT_SUFFIX) {
                heads.push(head.to_string());
            }
        }
    }
    heads.sort();
    log::debug!("filename heads found: {:?}", heads);
    Ok(heads)
}

// ALL OR NOTHING: A FAILED COPY REMOVES WHAT THIS ENTRY ALREADY PLACED
fn place(src_dir: &Path, head: &str, group: &ArtifactGroup, target: &Path) -> std::io::Result<usize> {
    let fresh_dir = !target.exists();
    fs::create_dir_all(target)?;

    let mut pairs = vec![(
        src_dir.join(format!("{}{}", head, RESULT_SUFFIX)),
        target.join(group.dest_file("raw.txt")),
    )];
    let usage = src_dir.join(format!("{}{}", head, USAGE_SUFFIX));
    if usage.exists() {
        pairs.push((usage, target.join(group.dest_file("cpuusage.csv"))));
    } else {
        log::warn!("no usage file for {}", head);
    }

    let mut placed: Vec<PathBuf> = Vec::with_capacity(pairs.len());
    for (src, dest) in pairs {
        log::debug!("copying {} to {}", src.display(), dest.display());
        if let Err(e) = fs::copy(&src, &dest) {
            for p in placed.iter().chain(std::iter::once(&dest)) {
                let _ = fs::remove_file(p);
            }
            if fresh_dir {
                let _ = fs::remove_dir(target);
            }
            return Err(e);
        }
        placed.push(dest);
    }
    Ok(placed.len())
}

pub fn correlate(source_dir: &Path, dest_root: &Path) -> Result<CorrelationReport> {
    log::debug!("using results directory: {}", source_dir.display());
    log::debug!("using log directory: {}", dest_root.display());
    fs::create_dir_all(dest_root)?;

    let mut report = CorrelationReport::default();
    let heads = result_heads(source_dir)?;
    if heads.is_empty() {
        log::warn!("no result files in {}", source_dir.display());
        return Ok(report);
    }

    for head in heads {
        let err_file = source_dir.join(format!("{}{}", head, ERR_SUFFIX));
        let outcome = check_error_log(&err_file).and_then(|()| {
            match parse_head(&head) {
                None => Err(SkipReason::MalformedName),
                Some(group) => {
                    log::debug!(
                        "parsed {}: date {} time {} kernel {} benchmark {} threads {}",
                        head, group.date, group.time, group.kernel, group.benchmark, group.threads
                    );
                    let target = dest_root.join(group.dir_name());
                    place(source_dir, &head, &group, &target)
                        .map(|n| (group, target, n))
                        .map_err(|e| SkipReason::CopyFailed(e.to_string()))
                }
            }
        });

        match outcome {
            Ok((group, target, n)) => {
                report.copied += n;
                report.placed.insert((group.date, group.threads), target);
            }
            Err(reason) => {
                log::error!("skipping {}: {}", head, reason);
                report.skipped.push(SkippedArtifact { head, reason });
            }
        }
    }
    Ok(report)
}
