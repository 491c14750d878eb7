use crate::bytes::ByteSequence;
use crate::coverage::CoverageMatrix;
use crate::individual::Individual;
use crate::modify::Modifier;
use crate::runner::{RunnerError, TestReport, TestRunner};
use crate::select::Selector;
use crate::tracker::PopulationTracker;
use anyhow::Result;
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use std::sync::Arc;
use thiserror::Error;

/// Upper bound (inclusive) on the length of inputs drawn from scratch while
/// the population is still empty.
pub const MAX_INITIAL_SIZE: usize = 64;

#[derive(Error, Debug)]
pub enum GuidanceError {
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("campaign manager failed: {0}")]
    Manager(#[source] anyhow::Error),
}

/// Owns campaign lifetime and per-execution bookkeeping.
///
/// `finished_execution` is called exactly once per loop iteration, after the
/// archive update, with the report, the coverage snapshot, and the archived
/// individual when the execution was saved. Returning an error aborts the
/// campaign.
pub trait CampaignManager {
    fn unexpired(&mut self) -> bool;

    fn finished_execution(
        &mut self,
        report: &TestReport,
        coverage: &CoverageMatrix,
        saved: Option<&Arc<Individual>>,
    ) -> Result<()>;
}

/// The evolutionary driver: select a parent, perturb it, run it, archive it.
///
/// While the archive is empty there is nothing to select from, so candidates
/// are uniform random byte sequences of length `0..=MAX_INITIAL_SIZE`. Once
/// the first individual lands, every candidate descends from an archived
/// parent.
pub struct ParametricGuidance<M: CampaignManager> {
    rng: ChaCha8Rng,
    runner: TestRunner,
    tracker: PopulationTracker,
    selector: Box<dyn Selector>,
    modifier: Box<dyn Modifier>,
    manager: M,
    /// Parent of the most recent candidate, for diagnostics.
    selected: Option<Arc<Individual>>,
}

impl<M: CampaignManager> ParametricGuidance<M> {
    pub fn new(
        seed: u64,
        runner: TestRunner,
        tracker: PopulationTracker,
        selector: Box<dyn Selector>,
        modifier: Box<dyn Modifier>,
        manager: M,
    ) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            runner,
            tracker,
            selector,
            modifier,
            manager,
            selected: None,
        }
    }

    /// Runs the campaign until the manager declares it expired or an
    /// infrastructure error occurs.
    pub fn fuzz(&mut self) -> Result<(), GuidanceError> {
        while self.manager.unexpired() {
            let candidate = self.next_input();
            let (report, coverage) = self.runner.run(candidate)?;
            let saved = self.tracker.update(&report, &coverage);
            if let Some(individual) = &saved {
                log::debug!(
                    "archived individual {} ({} bytes), population {}",
                    individual.id(),
                    individual.size(),
                    self.tracker.population().len()
                );
            }
            self.manager
                .finished_execution(&report, &coverage, saved.as_ref())
                .map_err(GuidanceError::Manager)?;
        }
        Ok(())
    }

    fn next_input(&mut self) -> ByteSequence {
        let population = self.tracker.population();
        if population.is_empty() {
            self.selected = None;
            let length = self.rng.next_u64() as usize % (MAX_INITIAL_SIZE + 1);
            let mut bytes = vec![0u8; length];
            self.rng.fill_bytes(&mut bytes);
            return ByteSequence::from(bytes);
        }
        // The selector only fails on an empty population, which the branch
        // above already handled.
        let parent = match self.selector.select(population, &mut self.rng) {
            Ok(parent) => Arc::clone(parent),
            Err(_) => unreachable!("population checked non-empty"),
        };
        let child = self.modifier.modify(&parent, population, &mut self.rng);
        self.selected = Some(parent);
        child
    }

    /// Parent of the last generated candidate, `None` while bootstrapping.
    pub fn selected(&self) -> Option<&Arc<Individual>> {
        self.selected.as_ref()
    }

    pub fn tracker(&self) -> &PopulationTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut PopulationTracker {
        &mut self.tracker
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut M {
        &mut self.manager
    }
}
