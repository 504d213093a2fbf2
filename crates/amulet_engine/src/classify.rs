use std::fmt::Write as _;

use amulet_core::Rarity;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("classifier failed: {message}")]
pub struct ClassifyError {
    pub message: String,
}

impl ClassifyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Decides whether a post is an amulet and how rare it is.
///
/// Implementations are called concurrently from every worker thread.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Option<Rarity>, ClassifyError>;
}

impl<F> Classifier for F
where
    F: Fn(&str) -> Result<Option<Rarity>, ClassifyError> + Send + Sync,
{
    fn classify(&self, text: &str) -> Result<Option<Rarity>, ClassifyError> {
        self(text)
    }
}

/// Longest post, in UTF-8 bytes, that can still be an amulet.
pub const MAX_AMULET_BYTES: usize = 64;

/// Shortest run of `8`s in the digest that makes an amulet.
pub const MIN_EIGHTS: usize = 4;

/// The amulet rule: a short text whose SHA-256 hex digest contains a run of at
/// least four `8`s. Four eights is common, every extra eight is one rarity
/// step up, capped at the top of the scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Classifier;

impl Classifier for Sha256Classifier {
    fn classify(&self, text: &str) -> Result<Option<Rarity>, ClassifyError> {
        if text.is_empty() || text.len() > MAX_AMULET_BYTES {
            return Ok(None);
        }
        let run = longest_eight_run(&sha256_hex(text));
        Ok(rarity_for_run(run))
    }
}

pub fn rarity_for_run(run: usize) -> Option<Rarity> {
    if run < MIN_EIGHTS {
        return None;
    }
    let step = (run - MIN_EIGHTS + 1).min(Rarity::MAX.get() as usize);
    Rarity::new(step as u8)
}

pub fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

fn longest_eight_run(hex: &str) -> usize {
    let mut best = 0;
    let mut current = 0;
    for ch in hex.chars() {
        if ch == '8' {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_map_onto_the_rarity_scale() {
        assert_eq!(rarity_for_run(3), None);
        assert_eq!(rarity_for_run(4), Some(Rarity::COMMON));
        assert_eq!(rarity_for_run(5), Some(Rarity::UNCOMMON));
        assert_eq!(rarity_for_run(9), Some(Rarity::MYTHIC));
        assert_eq!(rarity_for_run(10), Some(Rarity::BEYOND));
        assert_eq!(rarity_for_run(40), Some(Rarity::BEYOND));
    }

    #[test]
    fn longest_run_is_found_anywhere() {
        assert_eq!(longest_eight_run("a88b8888c888"), 4);
        assert_eq!(longest_eight_run("abc"), 0);
        assert_eq!(longest_eight_run("88888"), 5);
    }

    #[test]
    fn digest_is_lowercase_hex() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn long_or_empty_posts_are_never_amulets() {
        let long = "x".repeat(MAX_AMULET_BYTES + 1);
        assert_eq!(Sha256Classifier.classify(&long), Ok(None));
        assert_eq!(Sha256Classifier.classify(""), Ok(None));
    }

    #[test]
    fn verdict_agrees_with_digest() {
        for text in ["If you can't write poems,\nwrite me", "hello", "amulet"] {
            let expected = rarity_for_run(longest_eight_run(&sha256_hex(text)));
            assert_eq!(Sha256Classifier.classify(text), Ok(expected));
        }
    }
}
