//! Local feature-hashing embedder.
//!
//! Tokens, token bigrams and character trigrams are hashed with SHA-256 into
//! a fixed number of buckets with a sign bit, then L2-normalized. No model
//! server needed and fully deterministic, which is what tests and offline
//! ingestion want. Lexical overlap drives similarity.

use sha2::{Digest, Sha256};

const MIN_DIMENSIONS: usize = 64;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(MIN_DIMENSIONS) }
    }

    pub fn dimensions(&self) -> usize {
        self.dim
    }

    pub fn model_key(&self) -> String {
        format!("hashing-v1:{}", self.dim)
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dim];
        let normalized = text.to_lowercase();
        let tokens: Vec<&str> = normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return vec;
        }

        for token in &tokens {
            self.add_feature(&mut vec, &format!("t:{token}"), 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vec, &format!("b:{}_{}", pair[0], pair[1]), 0.8);
        }
        let compact: Vec<char> = normalized.chars().filter(|c| !c.is_whitespace()).collect();
        for tri in compact.windows(3) {
            let trigram: String = tri.iter().collect();
            self.add_feature(&mut vec, &format!("c:{trigram}"), 0.15);
        }

        let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }

    fn add_feature(&self, vec: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut first = [0u8; 8];
        first.copy_from_slice(&digest[..8]);
        let idx = (u64::from_le_bytes(first) % self.dim as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vec[idx] += sign * weight;
    }
}
