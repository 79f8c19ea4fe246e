// TRIALMON -- REPEATED-TRIAL WORKLOAD RUNNER WITH PER-CORE CPU SAMPLING
// SHARED BY THE BINARY (src/main.rs, src/cli/) AND THE INTEGRATION TESTS

pub mod config;
pub mod error;
pub mod organize;
pub mod parse;
pub mod procgroup;
pub mod report;
pub mod sampler;
pub mod stats;
pub mod trial;

pub use config::{ExperimentConfig, Mode, SectionMarkers, WorkloadCommand};
pub use error::{ExperimentError, ParseError, StatsError};
pub use parse::TrialResult;
pub use stats::{SummaryRecord, Timings};
