//! Memory and timing checkpoints, logged at debug level
//!
//! RSS comes from /proc/self/status and reads as 0 where that file is absent.

use std::fs;
use std::time::Instant;

use tracing::debug;

/// Resident set size in megabytes
pub fn rss_mb() -> f64 {
    let Ok(status) = fs::read_to_string("/proc/self/status") else {
        return 0.0;
    };
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb as f64 / 1024.0)
        .unwrap_or(0.0)
}

/// Log the current RSS and return it for a later [`delta`]
pub fn checkpoint(label: &str) -> f64 {
    let rss = rss_mb();
    debug!("memprof [{:.2} MB]: {}", rss, label);
    rss
}

/// Log the RSS change since `previous`
pub fn delta(label: &str, previous: f64) -> f64 {
    let current = rss_mb();
    debug!(
        "memprof [{:.2} MB] (delta: {:+.2} MB): {}",
        current,
        current - previous,
        label
    );
    current
}

/// Log time spent in a section and since `start`
pub fn time_delta(label: &str, start: Instant, section_start: Instant) -> Instant {
    debug!(
        "timeprof: {} [+{:.3}s, total: {:.3}s]",
        label,
        section_start.elapsed().as_secs_f64(),
        start.elapsed().as_secs_f64()
    );
    Instant::now()
}
