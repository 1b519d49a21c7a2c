//! Embedding abstraction
//!
//! One trait for everything that turns text into a fixed-dimension
//! vector. Vectors are unit-normalized by the producer so cosine
//! similarity reduces to a dot product everywhere downstream.

use async_trait::async_trait;

use crate::error::Result;
use crate::text::tokenize;

/// Turns text into a unit-normalized vector of a fixed dimension
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Vector dimension this embedder produces
    fn dim(&self) -> usize;

    /// Embed one text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Unit-normalize a vector in place; zero vectors stay zero
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity of two unit-normalized vectors
#[must_use]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Deterministic feature-hashing embedder
///
/// Tokenizes, hashes each token into a bucket with a signed weight, and
/// unit-normalizes. No model weights, no network: the offline default
/// for tests and air-gapped runs. Similar texts land near each other
/// because they share token buckets.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    /// Create an embedder with the given dimension
    #[must_use]
    pub const fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        // FNV-1a, stable across platforms
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        let index = usize::try_from(hash % self.dim as u64).unwrap_or(0);
        let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    /// Synchronous embedding used by in-process callers
    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        for token in tokenize(text) {
            let (index, sign) = self.bucket(&token);
            vector[index] += sign;
        }
        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let e = HashEmbedder::new(256);
        assert_eq!(e.embed_sync("AI adoption"), e.embed_sync("AI adoption"));
    }

    #[test]
    fn test_unit_norm() {
        let e = HashEmbedder::new(256);
        let v = e.embed_sync("markets rallied on earnings");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similar_texts_score_higher() {
        let e = HashEmbedder::new(512);
        let a = e.embed_sync("AI adoption is accelerating in enterprises");
        let b = e.embed_sync("enterprise AI adoption accelerating");
        let c = e.embed_sync("quarterly pork belly futures declined");
        assert!(cosine(&a, &b) > cosine(&a, &c));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let e = HashEmbedder::new(64);
        let v = e.embed_sync("");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
