use database::BatchOutcome;
use std::fmt;
use std::time::Duration;

/// Aggregate counters for one orchestrator run. Reported on completion
/// even when some threads failed; partial success is the normal outcome
/// of incremental mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub threads_discovered: usize,
    pub threads_processed: usize,
    pub threads_skipped: usize,
    pub days_skipped: usize,
    pub items_seen: usize,
    pub items_new: usize,
    pub items_persisted: usize,
    pub duplicates_skipped: usize,
    pub links_created: usize,
    pub batches_committed: usize,
    pub duration: Duration,
}

impl RunStats {
    pub fn absorb_batch(&mut self, outcome: &BatchOutcome) {
        self.items_persisted += outcome.persisted;
        self.duplicates_skipped += outcome.skipped_duplicates;
        self.links_created += outcome.links_created;
        self.batches_committed += 1;
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "threads: {} discovered, {} processed, {} skipped; \
             items: {} seen, {} new, {} persisted ({} duplicates); \
             {} links in {} batches; took {:.1}s",
            self.threads_discovered,
            self.threads_processed,
            self.threads_skipped,
            self.items_seen,
            self.items_new,
            self.items_persisted,
            self.duplicates_skipped,
            self.links_created,
            self.batches_committed,
            self.duration.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_accumulate() {
        let mut stats = RunStats::default();
        stats.absorb_batch(&BatchOutcome {
            persisted: 200,
            skipped_duplicates: 3,
            links_created: 41,
        });
        stats.absorb_batch(&BatchOutcome {
            persisted: 17,
            skipped_duplicates: 0,
            links_created: 2,
        });
        assert_eq!(stats.items_persisted, 217);
        assert_eq!(stats.duplicates_skipped, 3);
        assert_eq!(stats.links_created, 43);
        assert_eq!(stats.batches_committed, 2);
    }

    #[test]
    fn display_reports_every_counter() {
        let mut stats = RunStats::default();
        stats.threads_discovered = 3;
        stats.threads_processed = 2;
        stats.threads_skipped = 1;
        stats.items_seen = 500;
        stats.items_new = 20;
        let rendered = stats.to_string();
        assert!(rendered.contains("3 discovered"));
        assert!(rendered.contains("1 skipped"));
        assert!(rendered.contains("20 new"));
    }
}
