// Progress Tracker: atomic counters driving a single rendering loop.
// Throttled to one redraw per 2s except when a range boundary is crossed,
// in which case the redraw happens immediately.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

const RENDER_THROTTLE: Duration = Duration::from_secs(2);

pub struct ProgressTracker {
    total_ranges: AtomicU64,
    completed_ranges: AtomicU64,
    total_ips: AtomicU64,
    scanned_ips: AtomicU64,
    active_scans: AtomicU64,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total_ranges: u64, total_ips: u64) -> Arc<Self> {
        Arc::new(Self {
            total_ranges: AtomicU64::new(total_ranges),
            completed_ranges: AtomicU64::new(0),
            total_ips: AtomicU64::new(total_ips),
            scanned_ips: AtomicU64::new(0),
            active_scans: AtomicU64::new(0),
            started: Instant::now(),
        })
    }

    pub fn start_host(&self) {
        self.active_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finish_host(&self) {
        self.active_scans.fetch_sub(1, Ordering::Relaxed);
        self.scanned_ips.fetch_add(1, Ordering::Relaxed);
    }

    /// Marks one range complete. Callers should redraw immediately after
    /// calling this, rather than waiting for the next throttled tick.
    pub fn complete_range(&self) {
        self.completed_ranges.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> (u64, u64, u64, u64, u64) {
        (
            self.completed_ranges.load(Ordering::Relaxed),
            self.total_ranges.load(Ordering::Relaxed),
            self.scanned_ips.load(Ordering::Relaxed),
            self.total_ips.load(Ordering::Relaxed),
            self.active_scans.load(Ordering::Relaxed),
        )
    }

    fn rate_per_sec(&self, scanned: u64) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64().max(0.001);
        scanned as f64 / elapsed
    }

    fn line(&self) -> String {
        let (completed_ranges, total_ranges, scanned, total, active) = self.snapshot();
        let fraction = if total == 0 { 0.0 } else { scanned as f64 / total as f64 };
        let filled = (fraction * 20.0).round() as usize;
        let bar: String = (0..20)
            .map(|i| if i < filled { '#' } else { '-' })
            .collect();
        let rate = self.rate_per_sec(scanned);
        let remaining = total.saturating_sub(scanned);
        let eta_secs = if rate > 0.0 { (remaining as f64 / rate) as u64 } else { 0 };
        format!(
            "[{bar}] {pct:>5.1}%  {scanned}/{total} hosts  range {completed_ranges}/{total_ranges}  active {active}  eta {eta}s",
            pct = fraction * 100.0,
            eta = eta_secs,
        )
    }

    /// Runs a simple redraw loop on a single-line `indicatif` bar, polling
    /// the counters every `RENDER_THROTTLE`. Intended to be spawned as a
    /// background task and dropped (not awaited) when the scan finishes.
    pub async fn run(self: Arc<Self>) {
        let bar = ProgressBar::new(1);
        bar.set_style(ProgressStyle::default_bar().template("{msg}").unwrap());
        loop {
            bar.set_message(self.line());
            let (completed, total, ..) = self.snapshot();
            if completed >= total && total > 0 {
                break;
            }
            tokio::time::sleep(RENDER_THROTTLE).await;
        }
        bar.finish_and_clear();
    }

    /// Final summary line, printed once discovery completes.
    pub fn finish(&self) {
        let (_, total_ranges, scanned, total, _) = self.snapshot();
        let elapsed = self.started.elapsed();
        let rate = self.rate_per_sec(scanned);
        info!(
            elapsed_secs = elapsed.as_secs_f64(),
            ranges = total_ranges,
            ips = total,
            scanned = scanned,
            rate_per_sec = rate,
            "scan complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_renders_full_bar_at_completion() {
        let tracker = ProgressTracker::new(1, 10);
        for _ in 0..10 {
            tracker.start_host();
            tracker.finish_host();
        }
        tracker.complete_range();
        let line = tracker.line();
        assert!(line.contains("10/10"));
        assert!(line.starts_with("[####################]"));
    }

    #[test]
    fn active_scans_track_start_and_finish() {
        let tracker = ProgressTracker::new(1, 2);
        tracker.start_host();
        tracker.start_host();
        assert_eq!(tracker.active_scans.load(Ordering::Relaxed), 2);
        tracker.finish_host();
        assert_eq!(tracker.active_scans.load(Ordering::Relaxed), 1);
        assert_eq!(tracker.scanned_ips.load(Ordering::Relaxed), 1);
    }
}
