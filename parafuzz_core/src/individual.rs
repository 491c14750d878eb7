use crate::bytes::ByteSequence;
use std::hash::{Hash, Hasher};

/// One archived candidate: the recorded input bytes, the value they rendered
/// to, and a strictly increasing identity.
///
/// Equality and hashing are defined solely by input content. Two individuals
/// built from byte-identical recordings are the same individual even when
/// their ids or rendered values differ, which is what keeps the derived
/// population deduplicated.
#[derive(Debug)]
pub struct Individual {
    input: ByteSequence,
    rendered: Option<String>,
    id: u64,
}

impl Individual {
    /// Individuals are only created by the population tracker's update path.
    pub(crate) fn new(input: ByteSequence, rendered: Option<String>, id: u64) -> Self {
        Self {
            input,
            rendered,
            id,
        }
    }

    pub fn input(&self) -> &ByteSequence {
        &self.input
    }

    pub fn rendered(&self) -> Option<&str> {
        self.rendered.as_deref()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> usize {
        self.input.len()
    }
}

impl PartialEq for Individual {
    fn eq(&self, other: &Self) -> bool {
        self.input == other.input
    }
}

impl Eq for Individual {}

impl Hash for Individual {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.input.hash(state);
    }
}
