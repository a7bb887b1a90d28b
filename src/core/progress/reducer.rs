//! The progress fold: one batch in, one snapshot out.

use super::{OutcomeCounters, ProgressSnapshot, TaskProgress};
use crate::events::{EventKind, TaskEvent};
use tracing::{debug, warn};

/// Apply one event batch to a snapshot.
///
/// Pure and total: the same inputs always give the same snapshot.
///
/// - `Idle` and `Completed` snapshots are returned unchanged
/// - processing events are added to the counters, never subtracted
/// - the last scan event of the batch decides the total; a count lower
///   than the current total is ignored
/// - a `ScanComplete` as last scan event moves `Scanning` to `Running`
/// - any `Completed` event freezes the result, after the counters of the
///   same batch have been applied
pub fn apply_batch(snapshot: &ProgressSnapshot, batch: &[TaskEvent]) -> ProgressSnapshot {
    let (progress, scan_finished) = match snapshot {
        ProgressSnapshot::Idle => {
            if !batch.is_empty() {
                debug!(events = batch.len(), "Discarding batch, no task attached");
            }
            return ProgressSnapshot::Idle;
        }
        ProgressSnapshot::Completed(_) => {
            if !batch.is_empty() {
                debug!(events = batch.len(), "Discarding batch after completion");
            }
            return snapshot.clone();
        }
        ProgressSnapshot::Scanning(progress) => (progress, false),
        ProgressSnapshot::Running(progress) => (progress, true),
    };

    let mut counters = progress.counters.clone();
    counters.absorb(&OutcomeCounters::tally(
        batch.iter().filter(|event| event.kind() == EventKind::Processing),
    ));

    let authoritative_scan = batch
        .iter()
        .rev()
        .find(|event| event.kind() == EventKind::Scan);
    let total = next_total(progress.total, scan_finished, authoritative_scan);

    let terminal = batch
        .iter()
        .any(|event| event.kind() == EventKind::Terminal);

    let next = TaskProgress { counters, total };

    if terminal {
        ProgressSnapshot::Completed(next)
    } else if scan_finished || matches!(authoritative_scan, Some(TaskEvent::ScanComplete { .. })) {
        ProgressSnapshot::Running(next)
    } else {
        ProgressSnapshot::Scanning(next)
    }
}

/// Total after seeing `scan`, the last scan event of a batch.
///
/// Once the scan has completed the total is final.
fn next_total(current: u64, scan_finished: bool, scan: Option<&TaskEvent>) -> u64 {
    let Some(count) = scan.and_then(TaskEvent::scan_count) else {
        return current;
    };

    if scan_finished {
        if count != current {
            warn!(
                total = current,
                count, "Ignoring scan count received after scan completion"
            );
        }
        return current;
    }

    if count < current {
        warn!(
            total = current,
            count, "Scan count went backwards, keeping previous total"
        );
        return current;
    }

    count
}
