use crate::coverage::CoverageMatrix;
use crate::individual::Individual;
use crate::runner::{Failure, TestReport};
use std::collections::HashSet;
use std::sync::Arc;

/// Deferred per-individual setup invoked exactly once on archival. This is
/// the plug-in seam for guidance strategies that need extra state captured at
/// save time (e.g. execution-context bookkeeping).
pub type InitHook = Box<dyn FnMut(&Arc<Individual>) + Send>;

/// The elitist coverage archive: one winner per probe, ranked by input size.
///
/// For every `(component, probe)` slot the tracker keeps at most one owning
/// individual. A candidate takes a slot when the slot is empty or when the
/// incumbent's input is strictly longer; ties keep the incumbent, which
/// prevents the archive from oscillating under repeated equal-size mutants.
/// One individual may own many slots at once; the derived population is the
/// deduplicated set of current owners.
pub struct PopulationTracker {
    /// Best-owner table: component index -> probe index -> current owner.
    /// Rows are only ever appended or extended, mirroring the append-only
    /// coverage shape.
    best: Vec<Vec<Option<Arc<Individual>>>>,
    /// Lazily materialized population; `None` means some slot changed since
    /// the last materialization.
    population: Option<Vec<Arc<Individual>>>,
    /// Identity for the next individual created by the update path.
    next_id: u64,
    init_hook: Option<InitHook>,
}

impl PopulationTracker {
    pub fn new() -> Self {
        Self {
            best: Vec::new(),
            population: None,
            next_id: 0,
            init_hook: None,
        }
    }

    pub fn set_init_hook(&mut self, hook: InitHook) {
        self.init_hook = Some(hook);
    }

    /// The deduplicated set of individuals owning at least one slot, in
    /// first-seen table order. Recomputed only after a slot changed owners;
    /// repeated calls without an intervening update return the same entries.
    pub fn population(&mut self) -> &[Arc<Individual>] {
        let best = &self.best;
        self.population
            .get_or_insert_with(|| {
                let mut unique = HashSet::new();
                let mut population = Vec::new();
                for row in best {
                    for owner in row.iter().flatten() {
                        if unique.insert(Arc::clone(owner)) {
                            population.push(Arc::clone(owner));
                        }
                    }
                }
                population
            })
            .as_slice()
    }

    /// Folds one execution into the archive.
    ///
    /// Returns the newly archived individual when the report won at least one
    /// slot, `None` otherwise. Reports carrying a fatal resource-exhaustion
    /// failure never mutate the archive, whatever their coverage; the caller
    /// still sees the report for crash reporting.
    pub fn update(
        &mut self,
        report: &TestReport,
        coverage: &CoverageMatrix,
    ) -> Option<Arc<Individual>> {
        if report.failure.as_ref().is_some_and(Failure::is_fatal) {
            return None;
        }
        let candidate = Arc::new(Individual::new(
            report.recording.clone(),
            report.rendered.clone(),
            self.next_id,
        ));
        self.next_id += 1;

        let mut saved = false;
        for (component, hits) in coverage.components().iter().enumerate() {
            if component >= self.best.len() {
                self.best.push(vec![None; hits.len()]);
            }
            let row = &mut self.best[component];
            if row.len() < hits.len() {
                row.resize(hits.len(), None);
            }
            for (probe, hit) in hits.iter().enumerate() {
                if *hit && wins(row[probe].as_deref(), &candidate) {
                    row[probe] = Some(Arc::clone(&candidate));
                    self.population = None;
                    saved = true;
                }
            }
        }

        if saved {
            if let Some(hook) = self.init_hook.as_mut() {
                hook(&candidate);
            }
            Some(candidate)
        } else {
            None
        }
    }

    /// Number of table rows seen so far (diagnostics).
    pub fn component_count(&self) -> usize {
        self.best.len()
    }
}

impl Default for PopulationTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A slot is won when it has no owner or the incumbent's reproducer is
/// strictly larger. Equal sizes keep whoever was found first.
fn wins(incumbent: Option<&Individual>, challenger: &Individual) -> bool {
    match incumbent {
        None => true,
        Some(owner) => owner.size() > challenger.size(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::ByteSequence;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn report(bytes: &[u8]) -> TestReport {
        TestReport {
            failure: None,
            skipped: None,
            recording: ByteSequence::from_slice(bytes),
            rendered: Some(format!("v{}", bytes.len())),
        }
    }

    fn matrix(rows: &[&[bool]]) -> CoverageMatrix {
        CoverageMatrix::new(rows.iter().map(|row| row.to_vec()).collect())
    }

    #[test]
    fn growth_scenario() {
        let mut tracker = PopulationTracker::new();
        let first = tracker
            .update(&report(&[0x01]), &matrix(&[&[true, false]]))
            .expect("first input covering a fresh probe is saved");
        assert_eq!(tracker.population().len(), 1);

        // A longer input hitting the owned probe plus a fresh one: the old
        // owner keeps its slot, the newcomer takes only the fresh probe.
        let second = tracker
            .update(&report(&[0x01, 0x02]), &matrix(&[&[true, true]]))
            .expect("fresh probe saves the longer input");
        assert_eq!(tracker.population().len(), 2);
        assert!(second.size() > first.size());
        assert!(tracker.population().contains(&first));
        assert!(tracker.population().contains(&second));
    }

    #[test]
    fn eviction_scenario() {
        let mut tracker = PopulationTracker::new();
        let big = tracker
            .update(&report(&[1, 2, 3]), &matrix(&[&[true]]))
            .unwrap();
        assert_eq!(tracker.population().len(), 1);

        let small = tracker
            .update(&report(&[7]), &matrix(&[&[true]]))
            .expect("smaller reproducer evicts the incumbent");
        let population = tracker.population();
        assert_eq!(population.len(), 1);
        assert_eq!(population[0], small);
        // The evicted individual is only kept alive by our local handle.
        assert_eq!(Arc::strong_count(&big), 1);
    }

    #[test]
    fn equal_size_keeps_the_incumbent() {
        let mut tracker = PopulationTracker::new();
        let first = tracker
            .update(&report(&[0xAA]), &matrix(&[&[true]]))
            .unwrap();
        assert!(
            tracker
                .update(&report(&[0xBB]), &matrix(&[&[true]]))
                .is_none(),
            "a same-size challenger must not displace the owner"
        );
        assert_eq!(tracker.population()[0].id(), first.id());
    }

    #[test]
    fn archive_sizes_never_regress() {
        let mut tracker = PopulationTracker::new();
        let inputs: [&[u8]; 5] = [&[1, 2, 3, 4], &[5, 6], &[7, 8, 9], &[0], &[1, 1]];
        let mut owner_sizes = Vec::new();
        for bytes in inputs {
            tracker.update(&report(bytes), &matrix(&[&[true]]));
            owner_sizes.push(tracker.population()[0].size());
        }
        assert!(owner_sizes.windows(2).all(|pair| pair[1] <= pair[0]));
        assert_eq!(*owner_sizes.last().unwrap(), 1);
    }

    #[test]
    fn fatal_failures_never_touch_the_archive() {
        let mut tracker = PopulationTracker::new();
        let fatal = TestReport {
            failure: Some(Failure::ResourceExhausted("call depth".into())),
            skipped: None,
            recording: ByteSequence::from_slice(&[1]),
            rendered: None,
        };
        assert!(tracker.update(&fatal, &matrix(&[&[true, true]])).is_none());
        assert!(tracker.population().is_empty());
        assert_eq!(tracker.component_count(), 0);
    }

    #[test]
    fn crashes_and_timeouts_remain_archivable() {
        let mut tracker = PopulationTracker::new();
        let crashing = TestReport {
            failure: Some(Failure::Crash("assert".into())),
            skipped: None,
            recording: ByteSequence::from_slice(&[1, 2]),
            rendered: None,
        };
        assert!(tracker.update(&crashing, &matrix(&[&[true]])).is_some());
        let timing_out = TestReport {
            failure: Some(Failure::Timeout),
            skipped: None,
            recording: ByteSequence::from_slice(&[3]),
            rendered: None,
        };
        assert!(tracker.update(&timing_out, &matrix(&[&[true]])).is_some());
    }

    #[test]
    fn zero_coverage_is_never_archived() {
        let mut tracker = PopulationTracker::new();
        assert!(
            tracker
                .update(&report(&[1]), &matrix(&[&[false, false]]))
                .is_none()
        );
        assert!(tracker.population().is_empty());
    }

    #[test]
    fn population_cache_is_stable_between_updates() {
        let mut tracker = PopulationTracker::new();
        tracker.update(&report(&[1]), &matrix(&[&[true]]));
        let first: Vec<u64> = tracker.population().iter().map(|i| i.id()).collect();
        let second: Vec<u64> = tracker.population().iter().map(|i| i.id()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn byte_identical_individuals_deduplicate() {
        let mut tracker = PopulationTracker::new();
        tracker.update(&report(&[5, 5]), &matrix(&[&[true, false]]));
        // Same bytes, different rendering, covering a different probe: a new
        // individual is archived but the derived population stays size one.
        let twin = TestReport {
            failure: None,
            skipped: None,
            recording: ByteSequence::from_slice(&[5, 5]),
            rendered: Some("other".into()),
        };
        tracker.update(&twin, &matrix(&[&[false, true]]));
        assert_eq!(tracker.population().len(), 1);
    }

    #[test]
    fn table_rows_extend_for_new_components() {
        let mut tracker = PopulationTracker::new();
        tracker.update(&report(&[1]), &matrix(&[&[true]]));
        assert_eq!(tracker.component_count(), 1);
        tracker.update(&report(&[2, 3]), &matrix(&[&[false], &[true, true]]));
        assert_eq!(tracker.component_count(), 2);
        assert_eq!(tracker.population().len(), 2);
    }

    #[test]
    fn init_hook_runs_once_per_archived_individual() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut tracker = PopulationTracker::new();
        tracker.set_init_hook(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        // Saved: hook fires once even though two slots were won.
        tracker.update(&report(&[1]), &matrix(&[&[true, true]]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Not saved: hook does not fire.
        tracker.update(&report(&[9, 9]), &matrix(&[&[true, false]]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ids_strictly_increase() {
        let mut tracker = PopulationTracker::new();
        let a = tracker.update(&report(&[1]), &matrix(&[&[true]])).unwrap();
        let b = tracker
            .update(&report(&[2]), &matrix(&[&[false, true]]))
            .unwrap();
        assert!(b.id() > a.id());
    }
}
