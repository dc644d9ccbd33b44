//! Feature-hashing local embedder
//!
//! Deterministic, fast, no network. Serves as the offline default and as
//! the test backend; quality is far below a sentence model but preserves
//! enough lexical overlap for the corpus sizes involved.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::embedding::Embedder;
use crate::error::Result;

/// TF-weighted embedder using two-probe feature hashing
pub struct HashedEmbedder {
    dimensions: usize,
}

impl HashedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() > 1)
            .map(String::from)
            .collect()
    }

    fn bucket(token: &str, dimensions: usize) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % dimensions
    }

    /// Sign hashing reduces the impact of bucket collisions
    fn sign(token: &str) -> f32 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        format!("{}#s", token).hash(&mut hasher);
        if hasher.finish() % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }
}

impl Embedder for HashedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = Self::tokenize(text);
        let mut embedding = vec![0.0_f32; self.dimensions];

        if tokens.is_empty() {
            return Ok(embedding);
        }

        let mut tf: HashMap<&str, f32> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        for (token, count) in tf {
            // Sub-linear term frequency; short ubiquitous tokens are damped
            let tf_score = 1.0 + count.ln();
            let damp = token.len() as f32 / (2.0 + token.len() as f32);
            let weight = tf_score * damp;
            // Two probes per token halve the variance a single-bucket
            // collision introduces
            for probe in 0..2u8 {
                let salted = format!("{}#{}", token, probe);
                embedding[Self::bucket(&salted, self.dimensions)] +=
                    0.5 * weight * Self::sign(&salted);
            }
        }

        // Bigrams capture short phrases like "divine mercy"
        for window in tokens.windows(2) {
            let bigram = format!("{} {}", window[0], window[1]);
            embedding[Self::bucket(&bigram, self.dimensions)] += 0.5 * Self::sign(&bigram);
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hashed-tf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_deterministic() {
        let embedder = HashedEmbedder::new(256);
        let a = embedder.embed("mercy and forgiveness").unwrap();
        let b = embedder.embed("mercy and forgiveness").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_related_texts_closer() {
        let embedder = HashedEmbedder::new(256);
        let mercy = embedder
            .embed("the merciful one forgives all who repent")
            .unwrap();
        let mercy_too = embedder
            .embed("seek forgiveness for the merciful one pardons")
            .unwrap();
        let unrelated = embedder
            .embed("the harvest moon rises over the wheat field")
            .unwrap();

        assert!(
            cosine_similarity(&mercy, &mercy_too) > cosine_similarity(&mercy, &unrelated),
            "overlapping vocabulary should score closer"
        );
    }

    #[test]
    fn test_empty_text_zero_vector() {
        let embedder = HashedEmbedder::new(256);
        let e = embedder.embed("").unwrap();
        assert_eq!(e.len(), 256);
        assert!(e.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_unit_norm() {
        let embedder = HashedEmbedder::new(256);
        let e = embedder.embed("patience through trials and hardship").unwrap();
        let norm: f32 = e.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }
}
