//! Session identifiers: short random tokens that tell archived runs apart.
//!
//! Identifiers are drawn uniformly from a 64-symbol, filename-safe alphabet.
//! They are not cryptographic. With the default length of 5 there are
//! 64^5 (about 1.07 billion) possible values, so collisions only become
//! likely after tens of thousands of sessions.

use rand::Rng;

/// Filename-safe symbols an identifier is drawn from.
pub const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Identifier length used when the configuration does not override it.
pub const DEFAULT_LENGTH: usize = 5;

/// Produces fixed-length random session identifiers.
#[derive(Debug, Clone, Copy)]
pub struct IdentifierGenerator {
    length: usize,
}

impl IdentifierGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    /// Draws a new identifier from the thread-local RNG.
    pub fn generate(&self) -> String {
        self.generate_with(&mut rand::rng())
    }

    /// Draws a new identifier from the given RNG.
    ///
    /// Each symbol is an independent uniform draw; calls share no state.
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        (0..self.length)
            .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
            .collect()
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn alphabet_has_64_unique_filename_safe_symbols() {
        let unique: HashSet<u8> = ALPHABET.iter().copied().collect();
        assert_eq!(unique.len(), 64);
        assert!(
            ALPHABET
                .iter()
                .all(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
        );
    }

    #[test]
    fn generates_fixed_length_from_alphabet() {
        let generator = IdentifierGenerator::default();
        for _ in 0..500 {
            let id = generator.generate();
            assert_eq!(id.len(), DEFAULT_LENGTH);
            assert!(id.bytes().all(|b| ALPHABET.contains(&b)), "bad id {id}");
        }
    }

    #[test]
    fn respects_configured_length() {
        let generator = IdentifierGenerator::new(12);
        assert_eq!(generator.generate().len(), 12);
        assert_eq!(IdentifierGenerator::new(0).generate(), "");
    }

    #[test]
    fn same_seed_same_identifier() {
        let generator = IdentifierGenerator::default();
        let a = generator.generate_with(&mut StdRng::seed_from_u64(7));
        let b = generator.generate_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn draws_vary() {
        let generator = IdentifierGenerator::default();
        let mut rng = StdRng::seed_from_u64(42);
        let ids: HashSet<String> = (0..100).map(|_| generator.generate_with(&mut rng)).collect();
        // 100 draws out of ~1e9 values; a handful of collisions would mean a broken sampler.
        assert!(ids.len() > 95);
    }
}
