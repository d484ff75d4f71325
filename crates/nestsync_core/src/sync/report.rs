//! Results of a sync call.

use std::fmt;

/// Counts of what one sync call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Rows inserted.
    pub created: usize,
    /// Rows updated.
    pub updated: usize,
    /// Orphan rows deleted.
    pub deleted: usize,
    /// Belongs-to foreign keys pointed at a found parent.
    pub associated: usize,
    /// Belongs-to foreign keys cleared.
    pub dissociated: usize,
    /// Pivot rows attached.
    pub attached: usize,
    /// Pivot rows detached.
    pub detached: usize,
    /// Pivot rows whose extra attributes changed.
    pub pivot_updated: usize,
}

impl SyncReport {
    /// Number of storage writes performed.
    ///
    /// Association and dissociation only change in-memory attributes; they
    /// reach storage through the owner's save.
    pub fn writes(&self) -> usize {
        self.created + self.updated + self.deleted + self.attached + self.detached + self.pivot_updated
    }

    /// Returns true if nothing was written.
    pub fn is_noop(&self) -> bool {
        self.writes() == 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} deleted={} associated={} dissociated={} attached={} detached={} pivot_updated={}",
            self.created,
            self.updated,
            self.deleted,
            self.associated,
            self.dissociated,
            self.attached,
            self.detached,
            self.pivot_updated
        )
    }
}

/// Result of `save_and_sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The tree was applied.
    Synced(SyncReport),
    /// The syncing hook vetoed the call; nothing was written.
    Cancelled,
}

impl SyncOutcome {
    /// Returns true if the call was vetoed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncOutcome::Cancelled)
    }

    /// The report of a performed call.
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Synced(report) => Some(report),
            SyncOutcome::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn association_is_not_a_write() {
        let report = SyncReport {
            associated: 2,
            dissociated: 1,
            ..SyncReport::default()
        };
        assert!(report.is_noop());

        let report = SyncReport {
            created: 1,
            detached: 2,
            ..SyncReport::default()
        };
        assert_eq!(report.writes(), 3);
        assert!(!report.is_noop());
    }

    #[test]
    fn outcome_accessors() {
        assert!(SyncOutcome::Cancelled.is_cancelled());
        assert!(SyncOutcome::Cancelled.report().is_none());
        let outcome = SyncOutcome::Synced(SyncReport::default());
        assert_eq!(outcome.report(), Some(&SyncReport::default()));
    }
}
