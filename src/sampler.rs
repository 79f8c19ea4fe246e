// TRIALMON UTILIZATION SAMPLER
// RECORDS SYSTEM-WIDE PER-CORE BUSY % ON A FIXED CADENCE FOR AS LONG AS
// THE TRACKED PROCESS IS ALIVE. ONE CSV ROW PER INTERVAL.
//
// LOOP: BOOKKEEP GROUP -> SLEEP -> READ /proc/stat -> APPEND ROW.
// EXIT IS DETECTED AT THE TOP OF THE LOOP, SO THE LAST SLEEP CAN OVERSHOOT
// THE TARGET'S EXIT BY UP TO ONE INTERVAL.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;

use crate::error::{ExperimentError, Result};
use crate::procgroup::{self, Pid, ProcessHandle};

pub const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// /proc/stat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    // N FROM "cpuN", NOT THE LINE POSITION (OFFLINE CORES LEAVE GAPS)
    pub id: u32,
    pub idle: u64,
    pub total: u64,
}

// PER-CORE LINES ONLY ("cpu0 ...", NOT THE AGGREGATE "cpu ..." LINE)
pub fn parse_proc_stat(raw: &str) -> Vec<CpuTimes> {
    let mut cpus = Vec::new();
    for line in raw.lines() {
        let mut parts = line.split_whitespace();
        let id = match parts.next().and_then(|l| l.strip_prefix("cpu")) {
            Some(n) => match n.parse::<u32>() {
                Ok(id) => id,
                Err(_) => continue,
            },
            None => continue,
        };
        let fields: Vec<u64> = parts.filter_map(|s| s.parse().ok()).collect();
        if fields.len() < 4 {
            continue;
        }
        // idle + iowait
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        // guest/guest_nice ARE ALREADY COUNTED IN user/nice
        let total: u64 = fields.iter().take(8).sum();
        cpus.push(CpuTimes { id, idle, total });
    }
    cpus
}

pub fn read_proc_stat() -> Vec<CpuTimes> {
    parse_proc_stat(&fs::read_to_string("/proc/stat").unwrap_or_default())
}

// ONLINE CORE IDS, IN /proc/stat ORDER
pub fn online_cores() -> Vec<u32> {
    read_proc_stat().iter().map(|c| c.id).collect()
}

// BUSY % PER CORE OF cur, MATCHED TO prev BY CORE ID, ONE DECIMAL.
// A CORE WITH NO PREVIOUS READ (JUST ONLINED) REPORTS 0.
pub fn busy_percentages(prev: &[CpuTimes], cur: &[CpuTimes]) -> Vec<(u32, f64)> {
    cur.iter()
        .map(|b| {
            let a = match prev.iter().find(|a| a.id == b.id) {
                Some(a) => a,
                None => return (b.id, 0.0),
            };
            let total_delta = b.total.saturating_sub(a.total);
            if total_delta == 0 {
                return (b.id, 0.0);
            }
            let idle_delta = b.idle.saturating_sub(a.idle).min(total_delta);
            let busy = (total_delta - idle_delta) as f64 / total_delta as f64 * 100.0;
            (b.id, (busy * 10.0).round() / 10.0)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// SINK
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct UtilizationSample {
    pub timestamp: String,
    // (CORE ID, BUSY %)
    pub cores: Vec<(u32, f64)>,
}

pub fn usage_header(cores: &[u32]) -> Vec<String> {
    let mut header = Vec::with_capacity(cores.len() + 1);
    header.push("Timestamp".to_string());
    header.extend(cores.iter().map(|id| format!("CPU {} (%)", id)));
    header
}

// ONE WRITER PER FILE. CORE SET FIXED AT OPEN; OTHER ROWS ARE REFUSED.
pub struct UsageSink {
    path: PathBuf,
    cores: Vec<u32>,
    writer: csv::Writer<File>,
    rows: usize,
}

impl UsageSink {
    // TRUNCATE + HEADER
    pub fn create(path: &Path, cores: &[u32]) -> Result<Self> {
        let file = File::create(path).map_err(|source| ExperimentError::SinkOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut sink = Self::wrap(path, cores, file);
        sink.writer.write_record(usage_header(cores))?;
        sink.writer.flush()?;
        Ok(sink)
    }

    // NO HEADER: CONTINUES A SERIES create() STARTED
    pub fn append(path: &Path, cores: &[u32]) -> Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| ExperimentError::SinkOpen {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::wrap(path, cores, file))
    }

    fn wrap(path: &Path, cores: &[u32], file: File) -> Self {
        Self {
            path: path.to_path_buf(),
            cores: cores.to_vec(),
            writer: csv::WriterBuilder::new().has_headers(false).from_writer(file),
            rows: 0,
        }
    }

    pub fn cores(&self) -> &[u32] {
        &self.cores
    }

    // FALSE IF THE ROW WAS REFUSED (CORE SET CHANGED)
    pub fn write_sample(&mut self, sample: &UtilizationSample) -> Result<bool> {
        if sample.cores.len() != self.cores.len()
            || sample.cores.iter().zip(&self.cores).any(|((id, _), want)| id != want)
        {
            return Ok(false);
        }
        let mut record = Vec::with_capacity(self.cores.len() + 1);
        record.push(sample.timestamp.clone());
        record.extend(sample.cores.iter().map(|(_, p)| p.to_string()));
        self.writer.write_record(&record)?;
        // FLUSH PER ROW: AN INTERRUPTED RUN LEAVES A VALID, TRUNCATED FILE
        self.writer.flush()?;
        self.rows += 1;
        Ok(true)
    }

    pub fn finish(mut self) -> Result<SamplerReport> {
        self.writer.flush()?;
        Ok(SamplerReport {
            sink_path: self.path,
            rows: self.rows,
            cores: self.cores.len(),
        })
    }
}

// RETURNED THROUGH THE SAMPLER THREAD'S JOIN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerReport {
    pub sink_path: PathBuf,
    pub rows: usize,
    pub cores: usize,
}

// ---------------------------------------------------------------------------
// PER-PROCESS BOOKKEEPING
// ---------------------------------------------------------------------------

struct TickSample {
    ticks: u64,
    at: Instant,
}

// CPU % PER GROUP MEMBER SINCE THE PREVIOUS SNAPSHOT. NEVER PERSISTED.
pub struct GroupUsage {
    clock_ticks: f64,
    prev: HashMap<Pid, TickSample>,
}

impl GroupUsage {
    pub fn new() -> Self {
        let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        Self {
            clock_ticks: if hz > 0 { hz as f64 } else { 100.0 },
            prev: HashMap::new(),
        }
    }

    pub fn snapshot(&mut self, group: &[ProcessHandle]) -> Vec<(Pid, f64)> {
        let now = Instant::now();
        let mut usage = Vec::with_capacity(group.len());
        for proc in group {
            let ticks = match proc.cpu_ticks() {
                Some(t) => t,
                None => {
                    self.prev.remove(&proc.pid);
                    continue;
                }
            };
            let pct = match self.prev.get(&proc.pid) {
                Some(p) => {
                    let dt = now.duration_since(p.at).as_secs_f64();
                    if dt > 0.0 {
                        ticks.saturating_sub(p.ticks) as f64 / self.clock_ticks / dt * 100.0
                    } else {
                        0.0
                    }
                }
                None => 0.0, // FIRST SAMPLE
            };
            self.prev.insert(proc.pid, TickSample { ticks, at: now });
            usage.push((proc.pid, pct));
        }
        usage
    }
}

impl Default for GroupUsage {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// SAMPLER
// ---------------------------------------------------------------------------

pub struct UtilizationSampler {
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl UtilizationSampler {
    pub fn new(interval: Duration, shutdown: Arc<AtomicBool>) -> Self {
        Self { interval, shutdown }
    }

    pub fn run(&self, target: Pid, mut sink: UsageSink) -> Result<SamplerReport> {
        let group = procgroup::enumerate_group(target);
        if group.is_empty() {
            log::error!("no process group found for pid {}, not sampling", target);
            return sink.finish();
        }
        for p in &group {
            log::debug!("tracking pid {} ({})", p.pid, p.name);
        }

        let mut bookkeeping = GroupUsage::new();
        let mut prev = read_proc_stat();

        while procgroup::process_exists(target) && !self.shutdown.load(Ordering::Relaxed) {
            let per_proc = bookkeeping.snapshot(&group);
            log::trace!("group usage: {:?}", per_proc);

            std::thread::sleep(self.interval);

            let timestamp = Local::now().format(TIMESTAMP_FMT).to_string();
            let cur = read_proc_stat();
            let cores = busy_percentages(&prev, &cur);
            prev = cur;

            let sample = UtilizationSample { timestamp, cores };
            if sink.write_sample(&sample)? {
                log::debug!("timestamp: {}, cpu usages: {:?}", sample.timestamp, sample.cores);
            } else {
                let got: Vec<u32> = sample.cores.iter().map(|(id, _)| *id).collect();
                log::warn!(
                    "dropping sample at {}: cores {:?}, expected {:?}",
                    sample.timestamp,
                    got,
                    sink.cores()
                );
            }
        }

        if self.shutdown.load(Ordering::Relaxed) {
            log::info!("monitoring stopped by user");
        }
        sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "cpu  10 0 10 80 0 0 0 0 0 0\n\
                        cpu0 5 0 5 40 0 0 0 0 0 0\n\
                        cpu1 5 0 5 40 0 0 0 0 0 0\n\
                        intr 12345\n\
                        ctxt 999\n";

    fn cpu(id: u32, idle: u64, total: u64) -> CpuTimes {
        CpuTimes { id, idle, total }
    }

    #[test]
    fn parse_skips_aggregate_line() {
        let cpus = parse_proc_stat(STAT);
        assert_eq!(cpus.len(), 2);
        assert_eq!(cpus[0], cpu(0, 40, 50));
        assert_eq!(cpus[1].id, 1);
    }

    #[test]
    fn parse_keeps_core_ids_across_gaps() {
        // cpu1 OFFLINE
        let raw = "cpu  9 0 9 9 0 0 0 0 0 0\n\
                   cpu0 1 0 1 8 0 0 0 0 0 0\n\
                   cpu2 1 0 1 8 0 0 0 0 0 0\n\
                   cpu3 1 0 1 8 0 0 0 0 0 0\n";
        let ids: Vec<u32> = parse_proc_stat(raw).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 2, 3]);
        assert_eq!(
            usage_header(&ids),
            vec!["Timestamp", "CPU 0 (%)", "CPU 2 (%)", "CPU 3 (%)"]
        );
    }

    #[test]
    fn busy_from_deltas() {
        let prev = vec![cpu(0, 40, 50), cpu(1, 40, 50)];
        let cur = vec![cpu(0, 40, 150), cpu(1, 115, 150)];
        assert_eq!(busy_percentages(&prev, &cur), vec![(0, 100.0), (1, 25.0)]);
    }

    #[test]
    fn busy_pairs_by_id_not_position() {
        // cpu1 WENT OFFLINE BETWEEN READS; cpu2 MUST NOT BE DIFFED AGAINST IT
        let prev = vec![cpu(0, 0, 100), cpu(1, 0, 100), cpu(2, 50, 100)];
        let cur = vec![cpu(0, 50, 200), cpu(2, 100, 200)];
        assert_eq!(busy_percentages(&prev, &cur), vec![(0, 50.0), (2, 50.0)]);
    }

    #[test]
    fn busy_new_core_is_zero() {
        let prev = vec![cpu(0, 0, 100)];
        let cur = vec![cpu(0, 0, 200), cpu(5, 10, 500)];
        assert_eq!(busy_percentages(&prev, &cur), vec![(0, 100.0), (5, 0.0)]);
    }

    #[test]
    fn busy_zero_delta_is_zero() {
        let t = vec![cpu(3, 1, 2)];
        assert_eq!(busy_percentages(&t, &t), vec![(3, 0.0)]);
    }

    #[test]
    fn sink_refuses_changed_core_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.csv");
        let mut sink = UsageSink::create(&path, &[0, 1]).unwrap();
        let ok = UtilizationSample {
            timestamp: "2024-06-01 12:00:00".into(),
            cores: vec![(0, 1.0), (1, 2.5)],
        };
        let narrow = UtilizationSample {
            timestamp: "2024-06-01 12:00:01".into(),
            cores: vec![(0, 1.0)],
        };
        // SAME WIDTH, DIFFERENT CORE
        let swapped = UtilizationSample {
            timestamp: "2024-06-01 12:00:02".into(),
            cores: vec![(0, 1.0), (2, 3.0)],
        };
        assert!(sink.write_sample(&ok).unwrap());
        assert!(!sink.write_sample(&narrow).unwrap());
        assert!(!sink.write_sample(&swapped).unwrap());
        let report = sink.finish().unwrap();
        assert_eq!(report.rows, 1);
        assert_eq!(report.cores, 2);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Timestamp,CPU 0 (%),CPU 1 (%)\n2024-06-01 12:00:00,1,2.5\n"
        );
    }

    #[test]
    fn append_keeps_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.csv");
        let s = UtilizationSample { timestamp: "t".into(), cores: vec![(0, 0.0)] };

        let mut sink = UsageSink::create(&path, &[0]).unwrap();
        sink.write_sample(&s).unwrap();
        sink.finish().unwrap();

        let mut sink = UsageSink::append(&path, &[0]).unwrap();
        sink.write_sample(&s).unwrap();
        sink.finish().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("Timestamp").count(), 1);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn sink_open_failure_is_reported() {
        let err = UsageSink::create(Path::new("/nonexistent-dir/x/usage.csv"), &[0])
            .err()
            .expect("open must fail");
        assert!(matches!(err, ExperimentError::SinkOpen { .. }));
    }

    #[test]
    fn exited_target_writes_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.csv");
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        let sampler = UtilizationSampler::new(Duration::from_millis(50), Arc::new(AtomicBool::new(false)));
        let report = sampler.run(pid, UsageSink::create(&path, &online_cores()).unwrap()).unwrap();
        assert_eq!(report.rows, 0);
    }
}
