//! Cluster-then-partition candidate shaping
//!
//! K-means-style grouping over candidate embeddings improves topical
//! diversity over naive top-N: the top primary and secondary passages are
//! taken per cluster instead of globally. Centroids are seeded
//! deterministically by spreading over the score-ranked candidates, so the
//! grouping is reproducible in tests.

use crate::embedding::cosine_similarity;
use crate::types::{ScanResult, ScoredEntry, SourceKind};

use super::simple_partition;

const MAX_CLUSTERS: usize = 5;
const KMEANS_ROUNDS: usize = 8;

/// Shape candidates through clustering; falls back to the simple partition
/// when too few candidates carry embeddings
pub fn cluster_partition(
    hits: Vec<ScoredEntry>,
    verses_limit: usize,
    wisdom_limit: usize,
) -> ScanResult {
    let embedded: Vec<usize> = hits
        .iter()
        .enumerate()
        .filter(|(_, h)| h.entry.embedding.as_ref().is_some_and(|e| !e.is_empty()))
        .map(|(i, _)| i)
        .collect();

    if embedded.len() <= MAX_CLUSTERS {
        return simple_partition(hits, verses_limit, wisdom_limit);
    }

    let k = MAX_CLUSTERS.min(embedded.len());
    let assignments = kmeans(&hits, &embedded, k);

    // Top 2 primary + top 1 other per cluster, by score
    let mut verses: Vec<ScoredEntry> = Vec::new();
    let mut wisdom: Vec<ScoredEntry> = Vec::new();
    for cluster in 0..k {
        let mut members: Vec<&ScoredEntry> = embedded
            .iter()
            .zip(assignments.iter())
            .filter(|(_, &a)| a == cluster)
            .map(|(&i, _)| &hits[i])
            .collect();
        members.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        verses.extend(
            members
                .iter()
                .filter(|m| m.entry.source == SourceKind::Primary)
                .take(2)
                .map(|m| (*m).clone()),
        );
        wisdom.extend(
            members
                .iter()
                .filter(|m| m.entry.source != SourceKind::Primary)
                .take(1)
                .map(|m| (*m).clone()),
        );
    }

    verses.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    wisdom.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    verses.truncate(verses_limit);
    wisdom.truncate(wisdom_limit);

    ScanResult {
        verses,
        wisdom,
        related: vec![],
        all_results: hits,
        query_embedding: None,
    }
}

/// Assign each embedded candidate to one of k clusters
fn kmeans(hits: &[ScoredEntry], embedded: &[usize], k: usize) -> Vec<usize> {
    let vectors: Vec<&[f32]> = embedded
        .iter()
        .map(|&i| hits[i].entry.embedding.as_deref().unwrap_or(&[]))
        .collect();

    // Deterministic seeding: spread initial centroids over the ranked list
    let mut centroids: Vec<Vec<f32>> = (0..k)
        .map(|c| vectors[c * vectors.len() / k].to_vec())
        .collect();

    let mut assignments = vec![0usize; vectors.len()];
    for _ in 0..KMEANS_ROUNDS {
        let mut changed = false;
        for (i, vector) in vectors.iter().enumerate() {
            let nearest = centroids
                .iter()
                .enumerate()
                .map(|(c, centroid)| (c, cosine_similarity(vector, centroid)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(c, _)| c)
                .unwrap_or(0);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&&[f32]> = vectors
                .iter()
                .zip(assignments.iter())
                .filter(|(_, &a)| a == c)
                .map(|(v, _)| v)
                .collect();
            if members.is_empty() {
                continue;
            }
            let dims = centroid.len();
            let mut mean = vec![0.0f32; dims];
            for member in &members {
                for (d, value) in member.iter().enumerate().take(dims) {
                    mean[d] += value;
                }
            }
            let n = members.len() as f32;
            for value in &mut mean {
                *value /= n;
            }
            *centroid = mean;
        }
    }
    assignments
}
