use crate::bytes::ByteSequence;
use thiserror::Error;

/// Raised when a typed draw needs more bytes than the wrapped sequence holds.
///
/// This is a cancellation signal, not a test failure: the trial that ran out
/// of entropy is counted as non-informative by the guidance loop.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("random source ran out of bytes")]
pub struct SourceExhausted;

/// Serves typed pseudo-random draws to a structured generator from a fixed
/// byte sequence.
///
/// Draws are fully determined by the underlying bytes: replaying the same
/// sequence replays the same values. The source tracks how far it has read so
/// that the consumed prefix (the "recording") can be kept as the trial's
/// canonical input, trimming any unread tail.
#[derive(Debug)]
pub struct BiasedRandomSource {
    bytes: ByteSequence,
    position: usize,
}

impl BiasedRandomSource {
    pub fn new(bytes: ByteSequence) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn next_byte(&mut self) -> Result<u8, SourceExhausted> {
        match self.bytes.get(self.position) {
            Some(byte) => {
                self.position += 1;
                Ok(byte)
            }
            None => Err(SourceExhausted),
        }
    }

    pub fn next_bool(&mut self) -> Result<bool, SourceExhausted> {
        Ok(self.next_byte()? & 1 == 1)
    }

    pub fn next_u32(&mut self) -> Result<u32, SourceExhausted> {
        let mut value = 0u32;
        for _ in 0..4 {
            value = (value << 8) | u32::from(self.next_byte()?);
        }
        Ok(value)
    }

    /// Uniform-ish draw in `0..bound`. `bound` must be positive; a zero bound
    /// is a caller contract violation.
    pub fn next_u32_below(&mut self, bound: u32) -> Result<u32, SourceExhausted> {
        assert!(bound > 0, "bound must be positive");
        Ok(self.next_u32()? % bound)
    }

    /// Inclusive range draw; `lo <= hi` is a caller contract violation
    /// otherwise.
    pub fn next_usize_in(&mut self, lo: usize, hi: usize) -> Result<usize, SourceExhausted> {
        assert!(lo <= hi, "empty range");
        let span = (hi - lo + 1) as u32;
        Ok(lo + self.next_u32_below(span)? as usize)
    }

    /// Draw in the unit interval `[0, 1)`.
    pub fn next_f64(&mut self) -> Result<f64, SourceExhausted> {
        Ok(f64::from(self.next_u32()?) / (f64::from(u32::MAX) + 1.0))
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Result<&'a T, SourceExhausted> {
        assert!(!items.is_empty(), "cannot choose from an empty slice");
        let index = self.next_u32_below(items.len() as u32)? as usize;
        Ok(&items[index])
    }

    /// Number of bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.position
    }

    /// The consumed prefix of the wrapped sequence.
    pub fn recording(&self) -> ByteSequence {
        ByteSequence::from_slice(&self.bytes.as_slice()[..self.position])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_is_immediately_exhausted() {
        let mut source = BiasedRandomSource::new(ByteSequence::new());
        assert_eq!(source.next_byte(), Err(SourceExhausted));
        assert_eq!(source.next_u32(), Err(SourceExhausted));
        assert_eq!(source.consumed(), 0);
        assert!(source.recording().is_empty());
    }

    #[test]
    fn draws_are_deterministic_for_identical_bytes() {
        let bytes = ByteSequence::from_slice(&[7, 1, 0, 0, 0, 42, 9, 9]);
        let mut a = BiasedRandomSource::new(bytes.clone());
        let mut b = BiasedRandomSource::new(bytes);
        for _ in 0..3 {
            assert_eq!(a.next_byte(), b.next_byte());
        }
        assert_eq!(a.next_u32(), b.next_u32());
        assert_eq!(a.next_byte(), b.next_byte());
        assert_eq!(a.next_byte(), Err(SourceExhausted));
    }

    #[test]
    fn bounded_draws_stay_in_range() {
        let bytes: Vec<u8> = (0..=255).collect();
        let mut source = BiasedRandomSource::new(ByteSequence::from(bytes));
        for _ in 0..32 {
            let value = source.next_u32_below(17).unwrap();
            assert!(value < 17);
        }
        let mut source = BiasedRandomSource::new(ByteSequence::from_slice(&[0xFF; 64]));
        for _ in 0..8 {
            let value = source.next_usize_in(3, 9).unwrap();
            assert!((3..=9).contains(&value));
            let unit = source.next_f64().unwrap();
            assert!((0.0..1.0).contains(&unit));
        }
    }

    #[test]
    fn recording_is_the_consumed_prefix() {
        let mut source = BiasedRandomSource::new(ByteSequence::from_slice(&[1, 2, 3, 4, 5, 6]));
        source.next_byte().unwrap();
        source.next_byte().unwrap();
        assert_eq!(source.consumed(), 2);
        assert_eq!(source.recording().as_slice(), &[1, 2]);
        // The unread tail is not part of the recording.
        assert_eq!(source.recording().len(), 2);
    }

    #[test]
    fn choose_picks_listed_items_only() {
        let items = ["a", "b", "c"];
        let mut source = BiasedRandomSource::new(ByteSequence::from_slice(&[0xFF; 40]));
        for _ in 0..10 {
            let picked = source.choose(&items).unwrap();
            assert!(items.contains(picked));
        }
    }

    #[test]
    fn exhaustion_mid_draw_is_reported() {
        // Three bytes is not enough for a u32 draw.
        let mut source = BiasedRandomSource::new(ByteSequence::from_slice(&[1, 2, 3]));
        assert_eq!(source.next_u32(), Err(SourceExhausted));
    }
}
