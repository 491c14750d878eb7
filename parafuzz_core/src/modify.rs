use crate::bytes::ByteSequence;
use crate::individual::Individual;
use rand_core::RngCore;
use std::sync::Arc;

/// Perturbs a parent's byte sequence into a child candidate.
///
/// A modifier may read the parent and the whole population (enabling
/// structure-aware or crossover strategies) but never mutates either. Its
/// result re-enters the loop as untrusted bytes: it may be empty, shorter or
/// longer than the parent.
pub trait Modifier: Send {
    fn modify(
        &mut self,
        parent: &Individual,
        population: &[Arc<Individual>],
        rng: &mut dyn RngCore,
    ) -> ByteSequence;
}

/// Stacked byte-level perturbations plus one-point splicing with a random
/// population member.
#[derive(Debug, Clone, Copy)]
pub struct HavocModifier {
    max_stacked: usize,
}

impl HavocModifier {
    pub fn new(max_stacked: usize) -> Self {
        Self {
            max_stacked: max_stacked.max(1),
        }
    }

    fn overwrite(bytes: &mut Vec<u8>, rng: &mut dyn RngCore) {
        if bytes.is_empty() {
            bytes.push(rng.next_u32() as u8);
            return;
        }
        let index = rng.next_u64() as usize % bytes.len();
        bytes[index] = rng.next_u32() as u8;
    }

    fn insert(bytes: &mut Vec<u8>, rng: &mut dyn RngCore) {
        let index = rng.next_u64() as usize % (bytes.len() + 1);
        bytes.insert(index, rng.next_u32() as u8);
    }

    fn delete(bytes: &mut Vec<u8>, rng: &mut dyn RngCore) {
        if bytes.is_empty() {
            return;
        }
        let index = rng.next_u64() as usize % bytes.len();
        bytes.remove(index);
    }

    fn flip_bit(bytes: &mut Vec<u8>, rng: &mut dyn RngCore) {
        if bytes.is_empty() {
            bytes.push(1);
            return;
        }
        let index = rng.next_u64() as usize % bytes.len();
        bytes[index] ^= 1 << (rng.next_u32() % 8);
    }

    /// One-point crossover: keep a prefix of the child, append a suffix cut
    /// from a random population member.
    fn splice(bytes: &mut Vec<u8>, population: &[Arc<Individual>], rng: &mut dyn RngCore) {
        if population.is_empty() {
            Self::overwrite(bytes, rng);
            return;
        }
        let other = &population[rng.next_u64() as usize % population.len()];
        let donor = other.input().as_slice();
        let keep = if bytes.is_empty() {
            0
        } else {
            rng.next_u64() as usize % (bytes.len() + 1)
        };
        let from = if donor.is_empty() {
            0
        } else {
            rng.next_u64() as usize % donor.len()
        };
        bytes.truncate(keep);
        bytes.extend_from_slice(&donor[from..]);
    }
}

impl Default for HavocModifier {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Modifier for HavocModifier {
    fn modify(
        &mut self,
        parent: &Individual,
        population: &[Arc<Individual>],
        rng: &mut dyn RngCore,
    ) -> ByteSequence {
        let mut bytes = parent.input().as_slice().to_vec();
        let rounds = 1 + rng.next_u64() as usize % self.max_stacked;
        for _ in 0..rounds {
            match rng.next_u32() % 5 {
                0 => Self::overwrite(&mut bytes, rng),
                1 => Self::insert(&mut bytes, rng),
                2 => Self::delete(&mut bytes, rng),
                3 => Self::flip_bit(&mut bytes, rng),
                _ => Self::splice(&mut bytes, population, rng),
            }
        }
        ByteSequence::from(bytes)
    }
}
