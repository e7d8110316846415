//! 📊 progress.rs, "Are we there yet?", every bulk load, every time, forever.
//!
//! Two things live here:
//! - [`ProgressReporter`]: the shared "records written" counter plus the start
//!   clock. Writers bump it after every successful batch and it logs one line of
//!   throughput and ETA.
//! - [`LoadSummary`]: the end-of-load tally, rendered as a comfy table by the CLI.
//!
//! ⚠️ Watching the progress line will not make it go faster. We've tried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use tracing::info;

/// 📸 What one progress report saw. Returned so tests don't have to scrape logs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProgressSnapshot {
    pub written: u64,
    pub records_per_sec: f64,
    /// 🔮 `None` until there's a throughput to extrapolate from.
    pub minutes_remaining: Option<f64>,
}

/// ⏱️ Cumulative write counter + start time + the record count we're aiming for.
///
/// Shared by every writer behind an `Arc`. The counter only goes up.
#[derive(Debug)]
pub(crate) struct ProgressReporter {
    written: AtomicU64,
    // -- 📈 progress lines logged so far, one per successful batch
    reports: AtomicU64,
    started: Instant,
    target_total: u64,
}

impl ProgressReporter {
    pub(crate) fn new(target_total: u64) -> Self {
        Self::started_at(Instant::now(), target_total)
    }

    pub(crate) fn started_at(started: Instant, target_total: u64) -> Self {
        Self {
            written: AtomicU64::new(0),
            reports: AtomicU64::new(0),
            started,
            target_total,
        }
    }

    /// ➕ Add a freshly written batch to the tally. Returns the new cumulative total.
    pub(crate) fn record_written(&self, batch_size: usize) -> u64 {
        let batch_size = batch_size as u64;
        self.written.fetch_add(batch_size, Ordering::AcqRel) + batch_size
    }

    pub(crate) fn written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    pub(crate) fn reports(&self) -> u64 {
        self.reports.load(Ordering::Acquire)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// 📈 Log "<tps> tps, <mins> mins remain" for a cumulative total of `written`.
    ///
    /// Never fails and never divides by zero: with no elapsed time yet the ETA is unknown.
    pub(crate) fn report(&self, written: u64) -> ProgressSnapshot {
        let snapshot = self.snapshot(written, self.started.elapsed());
        self.reports.fetch_add(1, Ordering::AcqRel);
        match snapshot.minutes_remaining {
            Some(minutes) => info!(
                "{} tps, {} mins remain",
                snapshot.records_per_sec.round(),
                minutes.round()
            ),
            None => info!("{} written, ETA unknown (the clock hasn't started ticking yet)", written),
        }
        snapshot
    }

    fn snapshot(&self, written: u64, elapsed: Duration) -> ProgressSnapshot {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let records_per_sec = if elapsed_ms > 0.0 {
            written as f64 * 1000.0 / elapsed_ms
        } else {
            0.0
        };
        // -- 🔮 linear extrapolation, assumes the future looks like the past
        let minutes_remaining = (records_per_sec > 0.0).then(|| {
            let remaining = self.target_total.saturating_sub(written) as f64;
            remaining / records_per_sec / 60.0
        });
        ProgressSnapshot {
            written,
            records_per_sec,
            minutes_remaining,
        }
    }
}

/// 🧾 The end-of-load receipt.
///
/// Every load produces one, success or not. Failures are kept as real errors so
/// [`LoadSummary::into_result`] can re-raise them after the table is printed.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub files_loaded: usize,
    pub files_failed: usize,
    pub records_read: u64,
    pub batches_dispatched: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
    pub records_written: u64,
    pub elapsed: Duration,
    pub failures: Vec<anyhow::Error>,
}

impl LoadSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// 💀 Ok if every task succeeded, else the first failure with a headcount attached.
    pub fn into_result(mut self) -> anyhow::Result<Self> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        let failure_count = self.failures.len();
        let first = self.failures.remove(0);
        Err(first.context(format!(
            "💀 The load finished, but {failure_count} task(s) failed along the way. Partial work is already in the store. The first failure is below; the rest are in the logs."
        )))
    }

    /// 🍽️ Two comfy columns, right-aligned, no borders.
    pub fn to_table(&self) -> String {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        let rows = [
            ("files loaded", self.files_loaded.to_string()),
            ("files failed", self.files_failed.to_string()),
            ("records read", format_number(self.records_read)),
            ("batches dispatched", format_number(self.batches_dispatched)),
            ("batches written", format_number(self.batches_written)),
            ("batches failed", format_number(self.batches_failed)),
            ("records written", format_number(self.records_written)),
            ("elapsed", format_duration(self.elapsed)),
        ];
        for (label, value) in rows {
            table.add_row(vec![
                Cell::new(label).set_alignment(CellAlignment::Right),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        }
        table.to_string()
    }
}

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS for the long hauls. If it shows hours, order pizza. Plural.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_zero_elapsed_time_does_not_divide_by_zero() {
        let reporter = ProgressReporter::new(1_000);
        let snapshot = reporter.snapshot(500, Duration::ZERO);
        assert_eq!(snapshot.written, 500);
        assert_eq!(snapshot.records_per_sec, 0.0);
        assert_eq!(snapshot.minutes_remaining, None);
    }

    #[test]
    fn the_one_where_throughput_and_eta_do_the_math() {
        let reporter = ProgressReporter::new(61_000);
        // 🧮 1000 records in 10s = 100 tps; 60,000 left / 100 tps / 60 = 10 minutes
        let snapshot = reporter.snapshot(1_000, Duration::from_secs(10));
        assert!((snapshot.records_per_sec - 100.0).abs() < 1e-9);
        let minutes = snapshot.minutes_remaining.expect("💀 ETA should be known");
        assert!((minutes - 10.0).abs() < 1e-9);
    }

    #[test]
    fn the_one_where_overshooting_the_target_means_zero_minutes_not_negative() {
        let reporter = ProgressReporter::new(10);
        let snapshot = reporter.snapshot(50, Duration::from_secs(1));
        assert_eq!(snapshot.minutes_remaining, Some(0.0));
    }

    #[test]
    fn the_one_where_the_counter_only_goes_up() {
        let reporter =
            ProgressReporter::started_at(Instant::now() - Duration::from_secs(2), 1_000);
        assert_eq!(reporter.record_written(500), 500);
        assert_eq!(reporter.record_written(1), 501);
        assert_eq!(reporter.written(), 501);

        let snapshot = reporter.report(reporter.written());
        assert_eq!(snapshot.written, 501);
        assert!(snapshot.records_per_sec > 0.0);
        assert!(snapshot.minutes_remaining.is_some());
        assert_eq!(reporter.reports(), 1);
    }

    #[test]
    fn the_one_where_numbers_and_durations_get_dressed_up() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(24_000_000), "24,000,000");
        assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "01:02:05");
    }

    #[test]
    fn the_one_where_a_clean_summary_stays_clean() {
        let summary = LoadSummary {
            files_loaded: 2,
            records_read: 1_001,
            batches_dispatched: 3,
            batches_written: 3,
            records_written: 1_001,
            ..LoadSummary::default()
        };
        assert!(summary.is_success());
        let table = summary.to_table();
        assert!(table.contains("records written"));
        assert!(table.contains("1,001"));
        assert!(summary.into_result().is_ok());
    }

    #[test]
    fn the_one_where_failures_get_re_raised_at_the_end() {
        let summary = LoadSummary {
            files_failed: 1,
            failures: vec![
                anyhow::anyhow!("first thing broke"),
                anyhow::anyhow!("second thing broke"),
            ],
            ..LoadSummary::default()
        };
        assert!(!summary.is_success());
        let err = summary.into_result().expect_err("💀 failures should surface");
        let chain: Vec<String> = err.chain().map(|c| c.to_string()).collect();
        assert!(chain[0].contains("2 task(s) failed"));
        assert_eq!(chain[1], "first thing broke");
    }
}
