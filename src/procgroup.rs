// TRIALMON PROCESS GROUP TRACKER
// FINDS A WORKLOAD PROCESS BY NAME IN /proc AND WALKS ITS DESCENDANTS.
//
// THE GROUP IS A ONE-TIME SNAPSHOT. CHILDREN FORKED AFTER enumerate_group()
// ARE NOT TRACKED; THEIR LOAD STILL SHOWS UP IN THE SYSTEM-WIDE CORE
// COUNTERS, JUST NOT IN THE PER-PROCESS BOOKKEEPING.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub type Pid = u32;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
const STOP_CHECK: Duration = Duration::from_millis(100);

// KERNEL TRUNCATES comm TO TASK_COMM_LEN - 1
const COMM_MAX: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcStat {
    pub pid: Pid,
    pub comm: String,
    pub state: char,
    pub ppid: Pid,
    pub utime: u64,
    pub stime: u64,
}

impl ProcStat {
    pub fn read(pid: Pid) -> Option<Self> {
        let raw = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
        Self::parse(&raw)
    }

    // comm MAY CONTAIN SPACES AND PARENS -- SPLIT ON THE LAST ')'
    pub fn parse(raw: &str) -> Option<Self> {
        let open = raw.find('(')?;
        let close = raw.rfind(')')?;
        if close < open {
            return None;
        }
        let pid = raw[..open].trim().parse().ok()?;
        let comm = raw[open + 1..close].to_string();
        let rest: Vec<&str> = raw[close + 1..].split_whitespace().collect();
        if rest.len() < 13 {
            return None;
        }
        Some(Self {
            pid,
            comm,
            state: rest[0].chars().next().unwrap_or('?'),
            ppid: rest[1].parse().ok()?,
            utime: rest[11].parse().ok()?,
            stime: rest[12].parse().ok()?,
        })
    }

    pub fn is_alive(&self) -> bool {
        !matches!(self.state, 'Z' | 'X' | 'x')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: Pid,
    pub name: String,
}

impl ProcessHandle {
    pub fn is_running(&self) -> bool {
        process_exists(self.pid)
    }

    // utime + stime IN CLOCK TICKS, None ONCE THE PROCESS IS GONE
    pub fn cpu_ticks(&self) -> Option<u64> {
        ProcStat::read(self.pid)
            .filter(ProcStat::is_alive)
            .map(|s| s.utime + s.stime)
    }
}

fn all_pids() -> Vec<Pid> {
    let mut pids = Vec::new();
    if let Ok(entries) = fs::read_dir("/proc") {
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(pid) = name.parse::<Pid>() {
                    pids.push(pid);
                }
            }
        }
    }
    pids.sort_unstable();
    pids
}

fn comm_matches(comm: &str, name: &str) -> bool {
    if name.len() > COMM_MAX {
        name.as_bytes().get(..COMM_MAX) == Some(comm.as_bytes())
    } else {
        comm == name
    }
}

// ZOMBIES COUNT AS EXITED
pub fn process_exists(pid: Pid) -> bool {
    ProcStat::read(pid).map(|s| s.is_alive()).unwrap_or(false)
}

// ONE SCAN, NO RETRY. LOWEST MATCHING PID WINS.
pub fn locate(name: &str) -> Option<Pid> {
    for pid in all_pids() {
        if let Some(stat) = ProcStat::read(pid) {
            if stat.is_alive() && comm_matches(&stat.comm, name) {
                log::debug!("found {} with pid {}", name, pid);
                return Some(pid);
            }
        }
    }
    None
}

// NO TIMEOUT: A TARGET THAT NEVER STARTS BLOCKS FOREVER
pub fn await_locate(name: &str) -> Pid {
    let never = AtomicBool::new(false);
    loop {
        if let Some(pid) = await_locate_until(name, &never) {
            return pid;
        }
    }
}

// SAME POLL, BUT None ONCE stop IS RAISED (WORKLOAD GONE OR CTRL+C)
pub fn await_locate_until(name: &str, stop: &AtomicBool) -> Option<Pid> {
    log::info!("waiting for {} process to start...", name);
    loop {
        if let Some(pid) = locate(name) {
            log::info!("{} process started with pid {}", name, pid);
            return Some(pid);
        }
        let deadline = Instant::now() + POLL_INTERVAL;
        while Instant::now() < deadline {
            if stop.load(Ordering::Relaxed) {
                log::debug!("stopped waiting for {}", name);
                return None;
            }
            std::thread::sleep(STOP_CHECK);
        }
    }
}

// TARGET + ALL DESCENDANTS, BFS. EMPTY IF THE TARGET ALREADY EXITED.
pub fn enumerate_group(pid: Pid) -> Vec<ProcessHandle> {
    let root = match ProcStat::read(pid).filter(ProcStat::is_alive) {
        Some(s) => s,
        None => {
            log::error!("no such process with pid {}", pid);
            return Vec::new();
        }
    };

    let mut children: HashMap<Pid, Vec<ProcStat>> = HashMap::new();
    for p in all_pids() {
        if let Some(stat) = ProcStat::read(p) {
            children.entry(stat.ppid).or_default().push(stat);
        }
    }

    let mut group = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(stat) = queue.pop_front() {
        if let Some(kids) = children.remove(&stat.pid) {
            queue.extend(kids);
        }
        group.push(ProcessHandle {
            pid: stat.pid,
            name: stat.comm,
        });
    }

    log::debug!(
        "process group for pid {}: {:?}",
        pid,
        group.iter().map(|p| p.pid).collect::<Vec<_>>()
    );
    group
}
