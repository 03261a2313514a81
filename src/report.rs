// src/report.rs

//! Result reporting: aggregate a finished batch into a summary.

use std::fmt;
use std::time::Duration;

use crate::sched::BatchResults;
use crate::types::{BuildStatus, TargetName};

/// One line of the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub name: TargetName,
    pub status: BuildStatus,
    pub duration: Option<Duration>,
    pub errors: Vec<String>,
}

/// Aggregate view over a finished batch.
///
/// Entries follow submission order so that summaries read the same no
/// matter which build happened to finish first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub batch_id: u64,
    pub success_count: usize,
    pub failure_count: usize,
    /// Sum of individual build durations.
    pub total_duration: Duration,
    /// `None` if no build has a recorded duration.
    pub mean_duration: Option<Duration>,
    pub entries: Vec<TargetReport>,
}

impl RunSummary {
    pub fn from_results(results: &BatchResults) -> Self {
        let mut success_count = 0;
        let mut failure_count = 0;
        let mut total_duration = Duration::ZERO;
        let mut timed = 0u32;
        let mut entries = Vec::with_capacity(results.len());

        for task in results.in_submission_order() {
            match task.status {
                BuildStatus::Success => success_count += 1,
                BuildStatus::Failure => failure_count += 1,
                BuildStatus::Pending | BuildStatus::Running => {}
            }
            let duration = task.duration();
            if let Some(d) = duration {
                total_duration += d;
                timed += 1;
            }
            entries.push(TargetReport {
                name: task.target.name.clone(),
                status: task.status,
                duration,
                errors: task.errors.clone(),
            });
        }

        let mean_duration = (timed > 0).then(|| total_duration / timed);

        Self {
            batch_id: results.batch_id,
            success_count,
            failure_count,
            total_duration,
            mean_duration,
            entries,
        }
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0 && self.success_count == self.entries.len()
    }

    pub fn failed_targets(&self) -> impl Iterator<Item = &TargetReport> {
        self.entries
            .iter()
            .filter(|e| e.status == BuildStatus::Failure)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "batch {}: {} succeeded, {} failed ({} total, {:.2}s build time)",
            self.batch_id,
            self.success_count,
            self.failure_count,
            self.total(),
            self.total_duration.as_secs_f64()
        )?;

        let width = self.entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
        for entry in &self.entries {
            let duration = entry
                .duration
                .map(|d| format!("{:.2}s", d.as_secs_f64()))
                .unwrap_or_else(|| "-".to_string());
            writeln!(f, "  {:<width$}  {:<8} {}", entry.name, entry.status, duration)?;
            for err in &entry.errors {
                writeln!(f, "  {:<width$}    {}", "", err)?;
            }
        }
        Ok(())
    }
}
