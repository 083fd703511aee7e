//! Offline feature-hashing embedder.
//!
//! Maps lowercase word tokens into a fixed number of buckets and
//! L2-normalises the counts. No network, no model download: identical texts
//! always produce identical vectors, and texts sharing vocabulary land close
//! together. Used when no embedding service is configured.

use agora_common::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingClient;

const DEFAULT_DIMENSION: usize = 256;

pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(|t| t.to_lowercase())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl EmbeddingClient for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn model_name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("Deploy an ERC20 token").await.unwrap();
        let b = embedder.embed("deploy an erc20 TOKEN").await.unwrap();
        assert_eq!(a.len(), 256);
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let embedder = HashingEmbedder::new(512);
        let task = embedder.embed_sync("mint an nft collection on polygon");
        let nft = embedder.embed_sync("nft minting collection agent");
        let chat = embedder.embed_sync("friendly conversation and emotional support");
        assert!(cosine_similarity(&task, &nft) > cosine_similarity(&task, &chat));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert!(embedder.embed_sync("").iter().all(|x| *x == 0.0));
    }
}
