// TRIALMON TRIAL RUNNER
// ONE TRIAL = ONE WORKLOAD INVOCATION + ONE SAMPLER THREAD.
//
// MAIN THREAD: SPAWN -> BLOCK ON EXIT -> RAISE `done` -> JOIN SAMPLER.
// SAMPLER THREAD: AWAIT TARGET BY NAME -> SAMPLE UNTIL IT EXITS.
// NO LOCKS. THE ONLY SHARED STATE IS TWO FLAGS; THE SINK PATH AND ROW
// COUNT COME BACK THROUGH THE JOIN. TRIALS NEVER OVERLAP.
// NO TIMEOUT: A WORKLOAD THAT NEVER EXITS BLOCKS THE RUN.

use std::fs;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{ArtifactPaths, ExperimentConfig, SectionMarkers};
use crate::error::{ExperimentError, Result};
use crate::parse::{parse_multi_section, TrialResult};
use crate::procgroup;
use crate::report;
use crate::sampler::{online_cores, SamplerReport, UsageSink, UtilizationSampler};
use crate::stats::{summarize, SummaryRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Pending,
    Spawned,
    Sampling,
    Completed,
    Failed,
}

struct Trial<'a> {
    benchmark: &'a str,
    iteration: u32,
    state: TrialState,
}

impl<'a> Trial<'a> {
    fn new(benchmark: &'a str, iteration: u32) -> Self {
        Self { benchmark, iteration, state: TrialState::Pending }
    }

    fn advance(&mut self, next: TrialState) {
        log::debug!(
            "trial {}#{}: {:?} -> {:?}",
            self.benchmark, self.iteration, self.state, next
        );
        self.state = next;
    }
}

pub struct TrialRunner<'a> {
    config: &'a ExperimentConfig,
    shutdown: Arc<AtomicBool>,
    // FIXED AT START OF RUN, SHARED BY EVERY TRIAL'S SINK
    cores: Vec<u32>,
}

impl<'a> TrialRunner<'a> {
    pub fn new(config: &'a ExperimentConfig, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown,
            cores: online_cores(),
        }
    }

    // ITERATION 1 CREATES THE USAGE SINK, LATER ONES APPEND
    pub fn run_once(&self, benchmark: &str, iteration: u32) -> Result<String> {
        let mut trial = Trial::new(benchmark, iteration);
        let paths = self.config.artifacts(benchmark);

        let sink = if iteration <= 1 {
            UsageSink::create(&paths.cpu_usage, &self.cores)?
        } else {
            UsageSink::append(&paths.cpu_usage, &self.cores)?
        };

        let workload = &self.config.workload;
        let args = workload.render_args(benchmark, self.config.threads, &self.config.inputset);
        let command = format!("{} {}", workload.program, args.join(" "));
        log::debug!("execute: {}", command);

        let child = Command::new(&workload.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| ExperimentError::Spawn { command, source })?;
        trial.advance(TrialState::Spawned);

        let done = Arc::new(AtomicBool::new(false));
        let sampler = {
            let done = Arc::clone(&done);
            let target = workload.target.clone();
            let usage_sampler =
                UtilizationSampler::new(self.config.interval, Arc::clone(&self.shutdown));
            std::thread::spawn(move || -> Result<SamplerReport> {
                // THE SPAWNED PROGRAM MAY BE A WRAPPER; FIND THE REAL TARGET BY NAME
                match procgroup::await_locate_until(&target, &done) {
                    Some(pid) => usage_sampler.run(pid, sink),
                    None => {
                        log::warn!("{} exited before it could be located", target);
                        sink.finish()
                    }
                }
            })
        };
        trial.advance(TrialState::Sampling);

        let waited = child.wait_with_output();
        done.store(true, Ordering::Relaxed);
        let usage = sampler.join().map_err(|_| ExperimentError::SamplerPanicked)?;
        let output = waited?;
        let usage = usage?;
        log::debug!(
            "sampler wrote {} rows x {} cores to {}",
            usage.rows,
            usage.cores,
            usage.sink_path.display()
        );

        if !output.status.success() {
            trial.advance(TrialState::Failed);
            log::error!("failed to run benchmark {} on iteration {}", benchmark, iteration);
            return Err(ExperimentError::WorkloadFailed {
                benchmark: benchmark.to_string(),
                iteration,
                status: output.status,
            });
        }

        trial.advance(TrialState::Completed);
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        log::debug!("benchmark output (iteration {}): {}", iteration, text);
        Ok(text)
    }

    pub fn repeat(&self, benchmark: &str) -> Result<Vec<TrialResult>> {
        let paths = self.config.artifacts(benchmark);
        let mut results = Vec::new();

        for iteration in 1..=self.config.iterations {
            if self.shutdown.load(Ordering::Relaxed) {
                log::info!("shutdown requested, stopping after {} trials", iteration - 1);
                break;
            }
            let output = self.run_once(benchmark, iteration)?;
            report::append_raw_output(&paths.raw, &output)?;

            let parsed = parse_multi_section(&output, &self.config.markers)?;
            if parsed.is_empty() {
                log::warn!("{} iteration {}: no output section found", benchmark, iteration);
            }
            for mut r in parsed {
                r.iteration = results.len() as u32 + 1;
                results.push(r);
            }
        }
        Ok(results)
    }

    pub fn run_benchmark(&self, benchmark: &str) -> Result<Option<SummaryRecord>> {
        fs::create_dir_all(&self.config.log_dir)?;
        let paths = self.config.artifacts(benchmark);

        if self.config.mode.runs() {
            report::remove_stale(&paths.raw)?;
            report::remove_stale(&paths.processed)?;
            report::remove_stale(&paths.summary)?;
            let results = self.repeat(benchmark)?;
            log::info!("{}: {} trials recorded", benchmark, results.len());
        }

        if self.config.mode.analyzes() {
            return analyze(&paths, &self.config.markers).map(Some);
        }
        Ok(None)
    }
}

// RAW -> PROCESSED -> SUMMARY. SUMMARY IS COMPUTED FROM THE PROCESSED FILE
// AS READ BACK, NOT FROM THE IN-MEMORY PARSE.
pub fn analyze(
    paths: &ArtifactPaths,
    markers: &SectionMarkers,
) -> Result<SummaryRecord> {
    report::remove_stale(&paths.processed)?;
    report::remove_stale(&paths.summary)?;

    if !paths.raw.exists() {
        return Err(ExperimentError::MissingRawLog(paths.raw.clone()));
    }
    let raw = fs::read_to_string(&paths.raw)?;
    let results = parse_multi_section(&raw, markers)?;
    report::write_processed(&paths.processed, &results)?;

    let processed = report::read_processed(&paths.processed)?;
    let summary = summarize(&processed)?;
    report::write_summary(&paths.summary, &summary)?;
    Ok(summary)
}
