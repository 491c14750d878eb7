use crate::individual::Individual;
use rand_core::RngCore;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectError {
    /// Selecting from an empty population is a precondition violation; the
    /// guidance loop owns the empty-population fallback, never the selector.
    #[error("population is empty, cannot select a parent")]
    EmptyPopulation,
}

/// Picks one archive member as the next mutation parent.
///
/// Implementations must be deterministic given a fixed RNG state and a
/// non-empty population; they are swappable policies, not stateful bases.
pub trait Selector: Send {
    fn select<'a>(
        &mut self,
        population: &'a [Arc<Individual>],
        rng: &mut dyn RngCore,
    ) -> Result<&'a Arc<Individual>, SelectError>;
}

/// Uniform random choice over the population.
#[derive(Default, Debug)]
pub struct RandomSelector;

impl RandomSelector {
    pub fn new() -> Self {
        RandomSelector
    }
}

impl Selector for RandomSelector {
    fn select<'a>(
        &mut self,
        population: &'a [Arc<Individual>],
        rng: &mut dyn RngCore,
    ) -> Result<&'a Arc<Individual>, SelectError> {
        if population.is_empty() {
            return Err(SelectError::EmptyPopulation);
        }
        let index = rng.next_u64() as usize % population.len();
        Ok(&population[index])
    }
}
