//! # Progress Module
//!
//! Folds the event batches of a running task into a single snapshot
//! the presentation layer can render directly.
//!
//! ## Phases
//! - `Idle` - no task attached, batches are discarded
//! - `Scanning` - the backend is still enumerating, total is best-effort
//! - `Running` - enumeration finished, total is authoritative
//! - `Completed` - terminal, nothing changes it any more
//!
//! The fold itself lives in [`apply_batch`]; it is pure so any recorded
//! batch sequence can be replayed without a transport.

mod reducer;

pub use reducer::apply_batch;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome kinds counted per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutcomeLabel {
    Stored,
    Skipped,
    Errors,
}

impl OutcomeLabel {
    /// Every label, in display order
    pub const ALL: [OutcomeLabel; 3] = [
        OutcomeLabel::Stored,
        OutcomeLabel::Skipped,
        OutcomeLabel::Errors,
    ];

    /// Label a processing event is counted under, None for scan and
    /// terminal events.
    pub fn for_event(event: &crate::events::TaskEvent) -> Option<Self> {
        use crate::events::TaskEvent;

        match event {
            TaskEvent::Stored { .. } => Some(OutcomeLabel::Stored),
            TaskEvent::Skipped { .. } => Some(OutcomeLabel::Skipped),
            TaskEvent::Errored { .. } => Some(OutcomeLabel::Errors),
            _ => None,
        }
    }
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeLabel::Stored => write!(f, "Stored"),
            OutcomeLabel::Skipped => write!(f, "Skipped"),
            OutcomeLabel::Errors => write!(f, "Errors"),
        }
    }
}

/// Per-label outcome counts.
///
/// Every label in [`OutcomeLabel::ALL`] is always present. The sum over
/// all labels is kept alongside so it never has to be recomputed by
/// readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<OutcomeLabel, u64>",
    into = "BTreeMap<OutcomeLabel, u64>"
)]
pub struct OutcomeCounters {
    counts: BTreeMap<OutcomeLabel, u64>,
    processed: u64,
}

impl OutcomeCounters {
    /// All labels at zero
    pub fn new() -> Self {
        Self {
            counts: OutcomeLabel::ALL.iter().map(|label| (*label, 0)).collect(),
            processed: 0,
        }
    }

    /// Count the processing events of a batch by label.
    pub fn tally<'a>(events: impl IntoIterator<Item = &'a crate::events::TaskEvent>) -> Self {
        let mut counters = Self::new();
        for label in events.into_iter().filter_map(OutcomeLabel::for_event) {
            counters.add(label, 1);
        }
        counters
    }

    pub fn get(&self, label: OutcomeLabel) -> u64 {
        self.counts.get(&label).copied().unwrap_or(0)
    }

    /// Items processed so far, whatever their outcome
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn add(&mut self, label: OutcomeLabel, amount: u64) {
        let count = self.counts.entry(label).or_insert(0);
        *count = count.saturating_add(amount);
        self.processed = self.processed.saturating_add(amount);
    }

    /// Add every count of `delta` to these counters.
    pub fn absorb(&mut self, delta: &OutcomeCounters) {
        for (label, amount) in delta.iter() {
            if amount > 0 {
                self.add(label, amount);
            }
        }
    }

    /// Labels with their counts, in display order
    pub fn iter(&self) -> impl Iterator<Item = (OutcomeLabel, u64)> + '_ {
        self.counts.iter().map(|(label, count)| (*label, *count))
    }
}

impl Default for OutcomeCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl From<BTreeMap<OutcomeLabel, u64>> for OutcomeCounters {
    fn from(counts: BTreeMap<OutcomeLabel, u64>) -> Self {
        let mut counters = Self::new();
        for (label, count) in counts {
            counters.add(label, count);
        }
        counters
    }
}

impl From<OutcomeCounters> for BTreeMap<OutcomeLabel, u64> {
    fn from(counters: OutcomeCounters) -> Self {
        counters.counts
    }
}

/// Counters and total of an attached task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Outcome counts by label
    #[serde(rename = "metrics")]
    pub counters: OutcomeCounters,
    /// Last accepted item count from a scan event
    pub total: u64,
}

impl TaskProgress {
    pub fn processed(&self) -> u64 {
        self.counters.processed()
    }
}

/// Published view of a task's progress at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ProgressSnapshot {
    /// No task attached
    #[default]
    Idle,
    /// Enumeration in progress
    Scanning(TaskProgress),
    /// Enumeration done, items being processed
    Running(TaskProgress),
    /// Task finished; counters are frozen
    Completed(TaskProgress),
}

impl ProgressSnapshot {
    /// Snapshot of a task that was just started: scanning, nothing counted.
    pub fn scanning() -> Self {
        ProgressSnapshot::Scanning(TaskProgress::default())
    }

    /// Counters and total, unless idle
    pub fn progress(&self) -> Option<&TaskProgress> {
        match self {
            ProgressSnapshot::Idle => None,
            ProgressSnapshot::Scanning(progress)
            | ProgressSnapshot::Running(progress)
            | ProgressSnapshot::Completed(progress) => Some(progress),
        }
    }

    /// True while a task is scanning or running.
    ///
    /// The UI uses this to refuse starting another task.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ProgressSnapshot::Scanning(_) | ProgressSnapshot::Running(_)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressSnapshot::Completed(_))
    }

    pub fn total(&self) -> u64 {
        self.progress().map(|p| p.total).unwrap_or(0)
    }

    pub fn count(&self, label: OutcomeLabel) -> u64 {
        self.progress().map(|p| p.counters.get(label)).unwrap_or(0)
    }

    pub fn processed(&self) -> u64 {
        self.progress().map(TaskProgress::processed).unwrap_or(0)
    }

    /// Share of items processed, for a determinate progress bar.
    ///
    /// Only defined while running with a known total; scanning is
    /// rendered as indeterminate.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            ProgressSnapshot::Running(progress) if progress.total > 0 => {
                Some((progress.processed() as f64 / progress.total as f64).min(1.0))
            }
            _ => None,
        }
    }

    /// Lowercase phase name, as used on the wire
    pub fn phase_name(&self) -> &'static str {
        match self {
            ProgressSnapshot::Idle => "idle",
            ProgressSnapshot::Scanning(_) => "scanning",
            ProgressSnapshot::Running(_) => "running",
            ProgressSnapshot::Completed(_) => "completed",
        }
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.progress() {
            None => write!(f, "idle"),
            Some(progress) => {
                write!(
                    f,
                    "{}: processed {} / {}",
                    self.phase_name(),
                    progress.processed(),
                    progress.total
                )?;
                for (label, count) in progress.counters.iter() {
                    write!(f, ", {}={}", label, count)?;
                }
                Ok(())
            }
        }
    }
}
