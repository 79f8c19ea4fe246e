// TRIALMON v0.3.1 -- REPEATED-TRIAL WORKLOAD RUNNER
// RUNS AN EXTERNAL BENCHMARK N TIMES, SAMPLES PER-CORE CPU WHILE IT RUNS,
// PARSES ITS TIMING OUTPUT AND SUMMARIZES THE TRIALS.
//
// RUST HANDLES: PROCESS TRACKING, SAMPLING, PARSING, STATISTICS, FILE LAYOUT.
// PLOTTING AND YAML CONFIG LIVE OUTSIDE THIS TOOL.

mod cli;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};

use trialmon::config::{self, ExperimentConfig, Mode, WorkloadCommand};

#[derive(Parser)]
#[command(name = "trialmon")]
#[command(about = "TRIALMON -- REPEATED-TRIAL BENCHMARK RUNNER WITH PER-CORE CPU SAMPLING")]
struct Cli {
    // DEBUG-LEVEL LOGGING
    #[arg(long, global = true)]
    verbose: bool,

    // ERRORS ONLY
    #[arg(long, global = true, conflicts_with = "verbose")]
    silent: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Run,
    Analyze,
    Both,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Run => Mode::Run,
            ModeArg::Analyze => Mode::Analyze,
            ModeArg::Both => Mode::Both,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum InputSet {
    Test,
    Native,
}

impl InputSet {
    fn as_str(self) -> &'static str {
        match self {
            InputSet::Test => "test",
            InputSet::Native => "native",
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    // RUN AND/OR ANALYZE BENCHMARKS
    Run {
        #[arg(required = true)]
        benchmarks: Vec<String>,

        // NUMBER OF REPETITIONS
        #[arg(short, long, default_value_t = 1)]
        repeat: u32,

        // WORKLOAD THREAD COUNT
        #[arg(short, long, default_value_t = 1)]
        threads: u32,

        #[arg(short, long, value_enum, default_value_t = ModeArg::Both)]
        mode: ModeArg,

        #[arg(short, long, value_enum, default_value_t = InputSet::Native)]
        inputset: InputSet,

        // SAMPLING INTERVAL IN SECONDS
        #[arg(long, default_value_t = config::DEFAULT_INTERVAL_SECS)]
        interval: f64,

        #[arg(long, default_value = config::DEFAULT_LOG_DIR)]
        log_dir: PathBuf,

        // WORKLOAD PROGRAM (ARGS KEEP THE parsecmgmt TEMPLATE)
        #[arg(long)]
        program: Option<String>,

        // PROCESS NAME THE SAMPLER WAITS FOR (DEFAULTS TO THE PROGRAM NAME)
        #[arg(long)]
        target: Option<String>,
    },

    // RE-ANALYZE EVERY *-raw.txt UNDER A DIRECTORY
    Analyze {
        #[arg(default_value = config::DEFAULT_LOG_DIR)]
        log_dir: PathBuf,
    },

    // SORT A FLAT RESULTS BATCH INTO <date>-t<threads>/ DIRECTORIES
    Organize {
        results_dir: PathBuf,
        log_dir: PathBuf,
    },

    // WAIT FOR A PROCESS BY NAME AND RECORD PER-CORE CPU UNTIL IT EXITS
    Monitor {
        #[arg(long, default_value = "parsecmgmt")]
        target: String,

        #[arg(short, long, default_value = "./log/cpu_usage.csv")]
        log_file: PathBuf,

        #[arg(short, long, default_value_t = config::DEFAULT_INTERVAL_SECS)]
        interval: f64,
    },
}

fn init_logging(cli: &Cli) {
    let level = if cli.silent {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn interval(secs: f64) -> Result<Duration> {
    if !(secs.is_finite() && secs > 0.0) {
        bail!("INTERVAL MUST BE A POSITIVE NUMBER OF SECONDS, GOT {}", secs);
    }
    Ok(Duration::from_secs_f64(secs))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
        })?;
    }

    match cli.command {
        Cmd::Run {
            benchmarks,
            repeat,
            threads,
            mode,
            inputset,
            interval: secs,
            log_dir,
            program,
            target,
        } => {
            let mut workload = WorkloadCommand::default();
            if let Some(program) = program {
                workload.target = target.clone().unwrap_or_else(|| {
                    std::path::Path::new(&program)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| program.clone())
                });
                workload.program = program;
            }
            if let Some(target) = target {
                workload.target = target;
            }

            let mut config = ExperimentConfig::new(benchmarks, log_dir);
            config.iterations = repeat;
            config.threads = threads;
            config.mode = mode.into();
            config.inputset = inputset.as_str().to_string();
            config.interval = interval(secs)?;
            config.workload = workload;

            cli::run::run_experiment(&config, shutdown)
        }
        Cmd::Analyze { log_dir } => cli::analyze::run_analyze(&log_dir, &Default::default()),
        Cmd::Organize { results_dir, log_dir } => cli::organize::run_organize(&results_dir, &log_dir),
        Cmd::Monitor { target, log_file, interval: secs } => {
            cli::monitor::run_monitor(&target, &log_file, interval(secs)?, shutdown)
        }
    }
}
