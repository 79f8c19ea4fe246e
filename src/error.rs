// TRIALMON ERROR TYPES
// LIBRARY ERRORS ARE TYPED. THE BINARY WRAPS THEM IN anyhow.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("malformed duration {0:?}: missing 'm' separator")]
    MalformedDuration(String),

    #[error("malformed number {0:?}")]
    MalformedNumber(String),

    #[error("section markers must not be empty")]
    EmptyMarker,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("cannot summarize zero trial results")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("cannot open sampler sink {}: {source}", .path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to spawn workload `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("workload {benchmark} failed on iteration {iteration}: {status}")]
    WorkloadFailed {
        benchmark: String,
        iteration: u32,
        status: ExitStatus,
    },

    #[error("sampler thread panicked")]
    SamplerPanicked,

    #[error("raw log not found: {}", .0.display())]
    MissingRawLog(PathBuf),

    #[error("malformed record in {}: {reason}", .path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ExperimentError>;
