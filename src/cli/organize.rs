use std::path::Path;

use anyhow::{Context, Result};

use trialmon::organize::correlate;

pub fn run_organize(results_dir: &Path, log_dir: &Path) -> Result<()> {
    println!("TRIALMON ORGANIZE");
    println!("  RESULTS: {}", results_dir.display());
    println!("  LOG DIR: {}", log_dir.display());
    println!();

    let report = correlate(results_dir, log_dir)
        .with_context(|| format!("CANNOT ORGANIZE {}", results_dir.display()))?;

    for ((date, threads), dir) in &report.placed {
        println!("  {:<12} t{:<4} -> {}", date, threads, dir.display());
    }
    println!();
    println!("FILES COPIED:    {}", report.copied);
    println!("GROUPS:          {}", report.placed.len());
    println!("SKIPPED:         {}", report.skipped.len());
    for s in &report.skipped {
        println!("  {:<48} {}", s.head, s.reason);
    }
    Ok(())
}
