// TRIALMON EXPERIMENT CONFIGURATION
// ONE EXPLICIT VALUE BUILT FROM THE CLI, PASSED BY REFERENCE TO EVERY
// COMPONENT. NOTHING HERE IS READ FROM AMBIENT GLOBAL STATE.

use std::ffi::CStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LOG_DIR: &str = "./log";
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

// PARSEC HARNESS OUTPUT FRAMING
pub const PARSEC_BEGIN_MARKER: &str = "[PARSEC] [---------- Beginning of output ----------]";
pub const PARSEC_END_MARKER: &str = "[PARSEC] [----------    End of output    ----------]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Run,
    Analyze,
    Both,
}

impl Mode {
    pub fn runs(self) -> bool {
        matches!(self, Mode::Run | Mode::Both)
    }

    pub fn analyzes(self) -> bool {
        matches!(self, Mode::Analyze | Mode::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMarkers {
    pub begin: String,
    pub end: String,
}

impl Default for SectionMarkers {
    fn default() -> Self {
        Self {
            begin: PARSEC_BEGIN_MARKER.to_string(),
            end: PARSEC_END_MARKER.to_string(),
        }
    }
}

// EXTERNAL WORKLOAD INVOCATION. args MAY CARRY {benchmark} {threads} {inputset},
// SUBSTITUTED PER TRIAL. target IS THE PROCESS NAME THE SAMPLER WAITS FOR;
// DIFFERS FROM program WHEN program IS A WRAPPER THAT FORKS THE WORKLOAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadCommand {
    pub program: String,
    pub args: Vec<String>,
    pub target: String,
}

impl WorkloadCommand {
    pub fn parsecmgmt() -> Self {
        let args = [
            "-a", "run", "-x", "pre", "-p", "{benchmark}", "-n", "{threads}",
            "-c", "gcc-hooks", "-i", "{inputset}",
        ];
        Self {
            program: "parsecmgmt".to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            target: "parsecmgmt".to_string(),
        }
    }

    pub fn render_args(&self, benchmark: &str, threads: u32, inputset: &str) -> Vec<String> {
        let threads = threads.to_string();
        self.args
            .iter()
            .map(|a| {
                a.replace("{benchmark}", benchmark)
                    .replace("{threads}", &threads)
                    .replace("{inputset}", inputset)
            })
            .collect()
    }
}

impl Default for WorkloadCommand {
    fn default() -> Self {
        Self::parsecmgmt()
    }
}

impl fmt::Display for WorkloadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for a in &self.args {
            write!(f, " {}", a)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub benchmarks: Vec<String>,
    pub iterations: u32,
    pub threads: u32,
    pub mode: Mode,
    pub inputset: String,
    pub kernel_name: String,
    pub log_dir: PathBuf,
    pub interval: Duration,
    pub workload: WorkloadCommand,
    pub markers: SectionMarkers,
}

impl ExperimentConfig {
    pub fn new(benchmarks: Vec<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            benchmarks,
            iterations: 1,
            threads: 1,
            mode: Mode::Both,
            inputset: "native".to_string(),
            kernel_name: kernel_release(),
            log_dir: log_dir.into(),
            interval: Duration::from_secs_f64(DEFAULT_INTERVAL_SECS),
            workload: WorkloadCommand::default(),
            markers: SectionMarkers::default(),
        }
    }

    pub fn artifacts(&self, benchmark: &str) -> ArtifactPaths {
        ArtifactPaths::new(&self.log_dir, &self.kernel_name, benchmark)
    }
}

// <log_dir>/<kernel>--<benchmark>-<kind>.<ext>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub raw: PathBuf,
    pub processed: PathBuf,
    pub summary: PathBuf,
    pub cpu_usage: PathBuf,
}

impl ArtifactPaths {
    pub fn new(log_dir: &Path, kernel: &str, benchmark: &str) -> Self {
        let stem = format!("{}--{}", kernel, benchmark);
        Self {
            raw: log_dir.join(format!("{}-raw.txt", stem)),
            processed: log_dir.join(format!("{}-processed.csv", stem)),
            summary: log_dir.join(format!("{}-summary.csv", stem)),
            cpu_usage: log_dir.join(format!("{}-cpuusage.csv", stem)),
        }
    }

    // SIBLINGS OF AN EXISTING RAW LOG (ANALYZE PASS OVER A TREE)
    pub fn from_raw(raw: &Path) -> Option<Self> {
        let name = raw.file_name()?.to_str()?;
        let stem = name.strip_suffix("-raw.txt")?;
        let dir = raw.parent().unwrap_or_else(|| Path::new("."));
        Some(Self {
            raw: raw.to_path_buf(),
            processed: dir.join(format!("{}-processed.csv", stem)),
            summary: dir.join(format!("{}-summary.csv", stem)),
            cpu_usage: dir.join(format!("{}-cpuusage.csv", stem)),
        })
    }
}

// EQUIVALENT OF `uname -r`
pub fn kernel_release() -> String {
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut uts) } != 0 {
        log::error!("uname failed: {}", std::io::Error::last_os_error());
        return "unknown".to_string();
    }
    let release = unsafe { CStr::from_ptr(uts.release.as_ptr()) };
    release.to_string_lossy().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsecmgmt_args_render() {
        let cmd = WorkloadCommand::parsecmgmt();
        let args = cmd.render_args("blackscholes", 8, "native");
        assert_eq!(
            args.join(" "),
            "-a run -x pre -p blackscholes -n 8 -c gcc-hooks -i native"
        );
        assert_eq!(cmd.target, "parsecmgmt");
    }

    #[test]
    fn artifact_names() {
        let p = ArtifactPaths::new(Path::new("/tmp/log"), "6.8.0-45-generic", "ferret");
        assert_eq!(p.raw, PathBuf::from("/tmp/log/6.8.0-45-generic--ferret-raw.txt"));
        assert_eq!(p.summary, PathBuf::from("/tmp/log/6.8.0-45-generic--ferret-summary.csv"));
        assert_eq!(p.cpu_usage, PathBuf::from("/tmp/log/6.8.0-45-generic--ferret-cpuusage.csv"));
    }

    #[test]
    fn artifact_siblings_from_raw() {
        let p = ArtifactPaths::from_raw(Path::new("/a/b/k--dedup-raw.txt")).unwrap();
        assert_eq!(p.processed, PathBuf::from("/a/b/k--dedup-processed.csv"));
        assert!(ArtifactPaths::from_raw(Path::new("/a/b/k--dedup.txt")).is_none());
    }

    #[test]
    fn mode_flags() {
        assert!(Mode::Both.runs() && Mode::Both.analyzes());
        assert!(Mode::Run.runs() && !Mode::Run.analyzes());
        assert!(!Mode::Analyze.runs() && Mode::Analyze.analyzes());
    }

    #[test]
    fn kernel_release_not_empty() {
        assert!(!kernel_release().is_empty());
    }
}
