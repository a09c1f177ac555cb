//! Aggregate counter maintenance for an event's donor list.
//!
//! The counters live in the `event_donor_lists` row; this module owns the
//! arithmetic so every mutation path (single add/remove, status change, bulk
//! add, full recount) derives `review_status` the same way. Persistence glue
//! is in `db::` and always stores the whole `ListStats` in the same
//! transaction as the membership change.

use crate::db::models::{DonorStatus, ReviewStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListStats {
    pub total_donors: i64,
    pub approved: i64,
    pub excluded: i64,
    pub pending: i64,
    pub auto_excluded: i64,
}

impl ListStats {
    fn bucket_mut(&mut self, status: DonorStatus) -> &mut i64 {
        match status {
            DonorStatus::Pending => &mut self.pending,
            DonorStatus::Approved => &mut self.approved,
            DonorStatus::Excluded => &mut self.excluded,
            DonorStatus::AutoExcluded => &mut self.auto_excluded,
        }
    }

    /// One entry joined the list.
    pub fn add(&mut self, status: DonorStatus) {
        self.total_donors += 1;
        *self.bucket_mut(status) += 1;
    }

    /// One entry left the list.
    pub fn remove(&mut self, status: DonorStatus) {
        self.total_donors -= 1;
        *self.bucket_mut(status) -= 1;
    }

    /// One entry changed status; total is unaffected.
    pub fn transition(&mut self, from: DonorStatus, to: DonorStatus) {
        if from == to {
            return;
        }
        *self.bucket_mut(from) -= 1;
        *self.bucket_mut(to) += 1;
    }

    /// Batch add, one counter update for the whole batch.
    pub fn add_bulk<I: IntoIterator<Item = DonorStatus>>(&mut self, statuses: I) {
        for status in statuses {
            self.add(status);
        }
    }

    /// Full recount from (status, count) pairs, the corrective path when the
    /// counters have drifted from the underlying rows.
    pub fn from_counts<I: IntoIterator<Item = (DonorStatus, i64)>>(counts: I) -> ListStats {
        let mut stats = ListStats::default();
        for (status, count) in counts {
            *stats.bucket_mut(status) += count;
            stats.total_donors += count;
        }
        stats
    }

    /// The list is reviewed once nothing is left pending.
    pub fn review_status(&self) -> ReviewStatus {
        if self.pending == 0 {
            ReviewStatus::Completed
        } else {
            ReviewStatus::Pending
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total_donors == self.approved + self.excluded + self.pending + self.auto_excluded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DonorStatus::*;

    #[test]
    fn add_and_remove_keep_counters_consistent() {
        let mut stats = ListStats::default();
        stats.add(Pending);
        stats.add(Approved);
        stats.add(AutoExcluded);
        assert_eq!(stats.total_donors, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.auto_excluded, 1);
        assert!(stats.is_consistent());

        stats.remove(Pending);
        assert_eq!(stats.total_donors, 2);
        assert_eq!(stats.pending, 0);
        assert!(stats.is_consistent());
    }

    #[test]
    fn transition_moves_between_buckets_without_touching_total() {
        let mut stats = ListStats::default();
        stats.add(Pending);
        stats.add(Pending);
        stats.transition(Pending, Excluded);
        assert_eq!(stats.total_donors, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.excluded, 1);
        assert!(stats.is_consistent());

        // no-op transition
        stats.transition(Excluded, Excluded);
        assert_eq!(stats.excluded, 1);
    }

    #[test]
    fn review_status_tracks_pending_bucket() {
        let mut stats = ListStats::default();
        assert_eq!(stats.review_status(), ReviewStatus::Completed);
        stats.add(Pending);
        assert_eq!(stats.review_status(), ReviewStatus::Pending);
        stats.transition(Pending, Approved);
        assert_eq!(stats.review_status(), ReviewStatus::Completed);
    }

    #[test]
    fn bulk_add_counts_each_status() {
        let mut stats = ListStats::default();
        stats.add_bulk([Pending, Pending, Approved, AutoExcluded]);
        assert_eq!(stats.total_donors, 4);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.auto_excluded, 1);
        assert!(stats.is_consistent());
    }

    #[test]
    fn from_counts_rebuilds_totals() {
        let stats = ListStats::from_counts([(Approved, 3), (Excluded, 2), (Pending, 0)]);
        assert_eq!(stats.total_donors, 5);
        assert_eq!(stats.approved, 3);
        assert_eq!(stats.excluded, 2);
        assert_eq!(stats.review_status(), ReviewStatus::Completed);
        assert!(stats.is_consistent());
    }
}
