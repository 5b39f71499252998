//! Drain results.

use std::fmt;

/// Outcome of one drain batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The batch could not be read from the local store.
    pub read_failed: bool,
}

impl BatchReport {
    pub(crate) fn record(&mut self, succeeded: bool) {
        self.attempted += 1;
        if succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.read_failed {
            return f.write_str("unreadable");
        }
        write!(f, "{}/{} ok", self.succeeded, self.attempted)?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

/// Outcome of a full drain of pending mutations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// The network was offline, nothing was attempted.
    pub skipped_offline: bool,
    pub inserts: BatchReport,
    pub updates: BatchReport,
    pub deletes: BatchReport,
}

impl DrainReport {
    pub(crate) fn offline() -> Self {
        Self {
            skipped_offline: true,
            ..Self::default()
        }
    }

    pub const fn attempted(&self) -> usize {
        self.inserts.attempted + self.updates.attempted + self.deletes.attempted
    }

    pub const fn succeeded(&self) -> usize {
        self.inserts.succeeded + self.updates.succeeded + self.deletes.succeeded
    }

    pub const fn failed(&self) -> usize {
        self.inserts.failed + self.updates.failed + self.deletes.failed
    }

    /// Every pending mutation reached the remote store.
    pub const fn is_clean(&self) -> bool {
        !self.skipped_offline
            && self.failed() == 0
            && !self.inserts.read_failed
            && !self.updates.read_failed
            && !self.deletes.read_failed
    }
}

impl fmt::Display for DrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped_offline {
            return f.write_str("skipped (offline)");
        }
        write!(
            f,
            "inserts {}; updates {}; deletes {}",
            self.inserts, self.updates, self.deletes
        )
    }
}
