//! Wall clock and memory counters read when an entry is finalized

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::trace;

/// Current wall-clock time in seconds since the Unix epoch
pub fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Memory counters in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    pub current: u64,
    pub peak: u64,
}

impl MemoryUsage {
    pub fn new(current: u64, peak: u64) -> Self {
        Self { current, peak }
    }
}

/// Source of memory counters
pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> MemoryUsage;
}

/// Resident memory of the current process.
///
/// The peak comes from the kernel high-water mark where the platform exposes
/// one, otherwise from the largest value this probe has observed.
pub struct ProcessMemory {
    pid: Option<Pid>,
    system: Mutex<System>,
    high_water: AtomicU64,
}

impl ProcessMemory {
    pub fn new() -> Self {
        Self {
            pid: sysinfo::get_current_pid().ok(),
            system: Mutex::new(System::new()),
            high_water: AtomicU64::new(0),
        }
    }

    fn resident(&self) -> u64 {
        let (Some(pid), Ok(mut system)) = (self.pid, self.system.lock()) else {
            return 0;
        };

        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}

impl Default for ProcessMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemory {
    fn sample(&self) -> MemoryUsage {
        let current = self.resident();
        let observed = self.high_water.fetch_max(current, Ordering::Relaxed).max(current);
        let peak = kernel_peak().map_or(observed, |hwm| hwm.max(observed));

        trace!(current, peak, "Sampled process memory");
        MemoryUsage { current, peak }
    }
}

/// `VmHWM` from `/proc/self/status`, in bytes
#[cfg(target_os = "linux")]
fn kernel_peak() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_hwm(&status)
}

#[cfg(not(target_os = "linux"))]
fn kernel_peak() -> Option<u64> {
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_hwm(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmHWM:"))?;
    let kib: u64 = line
        .trim_start_matches("VmHWM:")
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;
    Some(kib * 1024)
}

/// Probe returning fixed counters
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMemory(pub MemoryUsage);

impl MemoryProbe for FixedMemory {
    fn sample(&self) -> MemoryUsage {
        self.0
    }
}
