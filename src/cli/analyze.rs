use std::path::Path;

use anyhow::{Context, Result};

use trialmon::config::{ArtifactPaths, SectionMarkers};
use trialmon::report::find_raw_logs;
use trialmon::trial::analyze;

use super::print_summary;

pub fn run_analyze(log_dir: &Path, markers: &SectionMarkers) -> Result<()> {
    println!("TRIALMON ANALYZE: {}", log_dir.display());
    println!();

    let raw_files = find_raw_logs(log_dir);
    if raw_files.is_empty() {
        println!("NO RAW LOGS FOUND");
        return Ok(());
    }

    for raw in &raw_files {
        let paths = match ArtifactPaths::from_raw(raw) {
            Some(p) => p,
            None => continue,
        };
        // <kernel>--<benchmark>-raw.txt
        let name = raw.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let benchmark = name
            .split_once("--")
            .map(|(_, rest)| rest.trim_end_matches("-raw.txt").to_string())
            .unwrap_or(name);

        let summary = analyze(&paths, markers)
            .with_context(|| format!("ANALYZE {} FAILED", raw.display()))?;
        println!("{}", raw.display());
        print_summary(&benchmark, &summary);
        println!();
    }

    println!("ANALYZED {} RAW LOGS", raw_files.len());
    Ok(())
}
