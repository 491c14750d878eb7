use crate::source::{BiasedRandomSource, SourceExhausted};
use thiserror::Error;

/// Ways a structured generator can end a trial before the target ever runs.
///
/// `Exhausted`, `Skip` and `Invalid` mark the trial as non-informative: it is
/// counted but never archived and never reported as failing. A
/// `ResourceExhausted` generator is treated like a fatal target failure and
/// is excluded from the archive.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("random source exhausted during generation")]
    Exhausted(#[from] SourceExhausted),
    #[error("generation skipped: {0}")]
    Skip(String),
    #[error("generator produced an invalid value: {0}")]
    Invalid(String),
    #[error("generator exhausted a resource: {0}")]
    ResourceExhausted(String),
}

/// Builds one structured value from a biased random source and returns its
/// textual rendering.
///
/// Implementations must be deterministic given identical byte draws from the
/// source, so a recorded byte sequence can be replayed into the same value.
pub trait Generator: Send {
    fn generate(&mut self, source: &mut BiasedRandomSource) -> Result<String, GenerateError>;
}

/// Small arithmetic-expression grammar used by the demo target and tests.
///
/// Produces expressions such as `(3 + (7 * 2))`. Depth is bounded so a short
/// recording cannot force unbounded recursion.
pub struct ExprGenerator {
    max_depth: usize,
}

const OPERATORS: [&str; 4] = ["+", "-", "*", "/"];

impl ExprGenerator {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    fn expr(
        &self,
        source: &mut BiasedRandomSource,
        depth: usize,
    ) -> Result<String, GenerateError> {
        if depth >= self.max_depth || !source.next_bool()? {
            let literal = source.next_u32_below(100)?;
            return Ok(literal.to_string());
        }
        let op = source.choose(&OPERATORS)?;
        let lhs = self.expr(source, depth + 1)?;
        let rhs = self.expr(source, depth + 1)?;
        Ok(format!("({lhs} {op} {rhs})"))
    }
}

impl Default for ExprGenerator {
    fn default() -> Self {
        Self::new(6)
    }
}

impl Generator for ExprGenerator {
    fn generate(&mut self, source: &mut BiasedRandomSource) -> Result<String, GenerateError> {
        self.expr(source, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::ByteSequence;

    #[test]
    fn generation_is_deterministic_per_byte_sequence() {
        let bytes = ByteSequence::from_slice(&[1, 0, 0, 0, 2, 0, 0, 0, 0, 5, 0, 0, 0, 0, 9]);
        let mut generator = ExprGenerator::default();
        let mut first = BiasedRandomSource::new(bytes.clone());
        let mut second = BiasedRandomSource::new(bytes);
        let a = generator.generate(&mut first).unwrap();
        let b = generator.generate(&mut second).unwrap();
        assert_eq!(a, b);
        assert_eq!(first.consumed(), second.consumed());
    }

    #[test]
    fn empty_source_reports_exhaustion() {
        let mut generator = ExprGenerator::default();
        let mut source = BiasedRandomSource::new(ByteSequence::new());
        match generator.generate(&mut source) {
            Err(GenerateError::Exhausted(_)) => {}
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn depth_is_bounded() {
        // All-ones bytes keep choosing the recursive branch; the depth cap
        // must still terminate generation.
        let bytes = ByteSequence::from(vec![0xFF; 4096]);
        let mut generator = ExprGenerator::new(3);
        let mut source = BiasedRandomSource::new(bytes);
        let rendered = generator.generate(&mut source).unwrap();
        let nesting = rendered.chars().filter(|c| *c == '(').count();
        assert!(nesting <= 1 + 2 + 4, "nesting {nesting} exceeds depth cap");
    }
}
