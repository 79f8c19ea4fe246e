// STANDALONE SAMPLER: WAIT FOR A PROCESS BY NAME, SAMPLE UNTIL IT EXITS.
// CTRL+C STOPS BOTH THE WAIT AND THE SAMPLING LOOP; THE CSV STAYS VALID.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use trialmon::procgroup::await_locate_until;
use trialmon::sampler::{online_cores, UsageSink, UtilizationSampler};

pub fn run_monitor(
    target: &str,
    log_file: &Path,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pid = match await_locate_until(target, &shutdown) {
        Some(pid) => pid,
        None => {
            println!("INTERRUPTED BEFORE {} STARTED", target);
            return Ok(());
        }
    };

    let sink = UsageSink::create(log_file, &online_cores())?;
    let sampler = UtilizationSampler::new(interval, shutdown);
    let report = sampler.run(pid, sink)?;

    println!(
        "RECORDED {} SAMPLES x {} CPUS TO {}",
        report.rows,
        report.cores,
        report.sink_path.display()
    );
    Ok(())
}
