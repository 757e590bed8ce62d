//! Run statistics

use std::time::Duration;

/// Counters collected by one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// URLs taken from the list (including unparsable ones)
    pub processed: u64,

    /// URLs that produced at least one record
    pub succeeded: u64,

    /// URLs that produced an error record
    pub failed: u64,

    /// Subset of `failed` blocked by robots.txt
    pub robots_blocked: u64,

    /// Pages whose text looked like a CAPTCHA challenge
    pub captcha_warnings: u64,

    /// Checkpoints that wrote to disk
    pub flushes: u64,

    /// Checkpoints whose write failed
    pub flush_failures: u64,

    /// Stopped early by the cancellation signal
    pub cancelled: bool,

    /// Stopped early by a fatal backend error
    pub aborted: bool,

    pub elapsed: Duration,
}

impl RunStats {
    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.processed as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_run_stats(stats: &RunStats) {
    println!("=== Run Statistics ===\n");

    println!("URLs:");
    println!("  Processed: {}", stats.processed);
    println!("  Succeeded: {}", stats.succeeded);
    println!("  Failed: {}", stats.failed);
    if stats.robots_blocked > 0 {
        println!("    blocked by robots.txt: {}", stats.robots_blocked);
    }
    if stats.captcha_warnings > 0 {
        println!("  Possible CAPTCHA pages: {}", stats.captcha_warnings);
    }
    println!();

    println!("Checkpoints:");
    println!("  Flushes: {}", stats.flushes);
    if stats.flush_failures > 0 {
        println!("  Failed flushes: {}", stats.flush_failures);
    }
    println!();

    if stats.cancelled {
        println!("Run was cancelled before the end of the URL list.");
    }
    if stats.aborted {
        println!("Run was aborted after a fatal backend error.");
    }

    println!(
        "Success Rate: {:.1}% ({} / {} URLs) in {:.1}s",
        stats.success_rate(),
        stats.succeeded,
        stats.processed,
        stats.elapsed.as_secs_f64()
    );
}
