//! Progress reporting for pipeline runs
//!
//! The controller owns the counters; the reporter only reads them. Skips
//! advance the bar like successes, so a fully skipped archive still walks
//! the bar to 100% instead of stalling short of it.

use indicatif::{ProgressBar, ProgressStyle};

/// Counters for one run, owned by the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Candidates carried past: resume-skipped or successfully written
    pub processed: u64,
    /// Candidates dropped with a classified skip
    pub skipped: u64,
    /// Denominator computed before the run started
    pub total: u64,
}

impl RunCounters {
    /// Zeroed counters with a fixed denominator
    pub fn with_total(total: u64) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Candidates consumed so far
    pub fn seen(&self) -> u64 {
        self.processed + self.skipped
    }

    /// One-line run summary, printed at completion and at abort
    pub fn summary(&self) -> String {
        format!(
            "Finished {} of {} (skipped {})",
            self.processed, self.total, self.skipped
        )
    }
}

/// Console progress for one run
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Visible bar sized to the run's denominator
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{pos} of {len} [{wide_bar:.cyan/blue}] ({eta})")
                .expect("Invalid progress bar template")
                .progress_chars(">>-"),
        );
        Self { bar }
    }

    /// Reporter that draws nothing; for tests and non-interactive runs
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Reflect the controller's counters onto the bar
    pub fn observe(&self, counters: &RunCounters) {
        self.bar.set_position(counters.seen());
    }

    /// Close the bar and print the run summary
    pub fn finish(&self, counters: &RunCounters) {
        self.bar.finish();
        println!("{}", counters.summary());
    }

    /// Freeze the bar mid-run and print the summary for an aborted run
    pub fn abandon(&self, counters: &RunCounters) {
        self.bar.abandon();
        println!("{}", counters.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seen_sums_both_outcomes() {
        let counters = RunCounters {
            processed: 10,
            skipped: 3,
            total: 20,
        };
        assert_eq!(counters.seen(), 13);
    }

    #[test]
    fn test_summary_line() {
        let counters = RunCounters {
            processed: 2496,
            skipped: 4,
            total: 2500,
        };
        assert_eq!(counters.summary(), "Finished 2496 of 2500 (skipped 4)");
    }

    #[test]
    fn test_observe_tracks_seen() {
        let reporter = ProgressReporter::hidden();
        let counters = RunCounters {
            processed: 7,
            skipped: 2,
            total: 100,
        };
        reporter.observe(&counters);
        assert_eq!(reporter.bar.position(), 9);
    }

    #[test]
    fn test_visible_bar_has_length() {
        let reporter = ProgressReporter::new(250);
        assert_eq!(reporter.bar.length(), Some(250));
    }
}
