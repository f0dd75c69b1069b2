//! Pending-ping quota enforcement

use beacon_domain::QueuedPing;

/// Result of applying the pending-ping quota.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct QuotaOutcome {
    /// Pings to keep, deletion-request pings first, then the rest ascending
    /// by collection date.
    pub kept: Vec<QueuedPing>,
    /// Ordinary pings exceeding the quota, newest first.
    pub evicted: Vec<QueuedPing>,
    /// Cumulative serialized size of the kept ordinary pings.
    pub kept_size: usize,
}

/// Split `pings` (ascending by date) into survivors and evictions.
///
/// Ordinary pings are walked newest to oldest while accumulating count and
/// serialized size. Once either exceeds its limit, that ping and every
/// older one are evicted. Deletion-request pings are always kept and never
/// counted.
pub fn apply_quota(pings: Vec<QueuedPing>, max_count: usize, max_size: usize) -> QuotaOutcome {
    let (deletion_requests, ordinary): (Vec<_>, Vec<_>) =
        pings.into_iter().partition(QueuedPing::is_deletion_request);

    let mut outcome = QuotaOutcome::default();
    let mut count = 0usize;
    let mut size = 0usize;
    let mut deleting = false;
    let mut kept_desc = Vec::new();

    for ping in ordinary.into_iter().rev() {
        count += 1;
        // An unserializable record cannot be uploaded either; count it as
        // over budget.
        size = size.saturating_add(ping.record.size_in_bytes().unwrap_or(usize::MAX));

        if count > max_count || size > max_size {
            deleting = true;
        }

        if deleting {
            outcome.evicted.push(ping);
        } else {
            outcome.kept_size = size;
            kept_desc.push(ping);
        }
    }

    outcome.kept = deletion_requests;
    outcome.kept.extend(kept_desc.into_iter().rev());
    outcome
}
