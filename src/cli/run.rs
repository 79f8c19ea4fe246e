use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use trialmon::config::ExperimentConfig;
use trialmon::trial::TrialRunner;

use super::print_summary;

pub fn run_experiment(config: &ExperimentConfig, shutdown: Arc<AtomicBool>) -> Result<()> {
    println!("TRIALMON v0.3.1");
    println!("KERNEL:          {}", config.kernel_name);
    println!("BENCHMARKS:      {}", config.benchmarks.join(" "));
    println!("ITERATIONS:      {}", config.iterations);
    println!("THREADS:         {}", config.threads);
    println!("INPUT SET:       {}", config.inputset);
    println!("MODE:            {:?}", config.mode);
    println!("INTERVAL:        {:.3}s", config.interval.as_secs_f64());
    println!("LOG DIR:         {}", config.log_dir.display());
    println!("COMMAND:         {}", config.workload);
    println!("TARGET:          {}", config.workload.target);
    println!();

    let runner = TrialRunner::new(config, Arc::clone(&shutdown));

    for benchmark in &config.benchmarks {
        println!("{}", "-".repeat(40));
        println!("BENCHMARK {}", benchmark);
        println!("{}", "-".repeat(40));

        let summary = runner
            .run_benchmark(benchmark)
            .with_context(|| format!("BENCHMARK {} FAILED", benchmark))?;
        if let Some(summary) = summary {
            print_summary(benchmark, &summary);
        }
        println!();

        if shutdown.load(Ordering::Relaxed) {
            println!("INTERRUPTED -- SKIPPING REMAINING BENCHMARKS");
            break;
        }
    }

    println!("TRIALMON OUT.");
    Ok(())
}
