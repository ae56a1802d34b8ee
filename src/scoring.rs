use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::warn;

use crate::ai::AiBackend;
use crate::config::ScoringSettings;

/// Estimate fit between a resume and a job description as a score in [0,1].
///
/// Prefers embedding similarity when a backend is available and blends it
/// with a lexical overlap signal; any backend failure degrades silently to
/// lexical-only scoring. Lexical-only scoring is deterministic.
pub struct FitScorer {
    settings: ScoringSettings,
    backend: Option<Arc<dyn AiBackend>>,
}

impl FitScorer {
    pub fn new(settings: ScoringSettings, backend: Option<Arc<dyn AiBackend>>) -> Self {
        Self { settings, backend }
    }

    pub fn score(&self, resume_text: &str, job_description: &str) -> f64 {
        if resume_text.trim().is_empty() || job_description.trim().is_empty() {
            return 0.0;
        }

        let embedding_score = self
            .backend
            .as_deref()
            .and_then(|backend| self.embedding_similarity(backend, resume_text, job_description));

        let keyword_score = keyword_overlap(resume_text, job_description);

        let final_score = match embedding_score {
            Some(embedding) => {
                let weight = self.settings.fallback_weight.clamp(0.0, 1.0);
                embedding * (1.0 - weight) + keyword_score * weight
            }
            None => keyword_score,
        };

        // 4 decimal places for stable comparison and logging
        (final_score * 10_000.0).round() / 10_000.0
    }

    fn embedding_similarity(
        &self,
        backend: &dyn AiBackend,
        resume_text: &str,
        job_description: &str,
    ) -> Option<f64> {
        let vectors = match backend.generate_embedding(&[resume_text, job_description]) {
            Ok(vectors) => vectors,
            Err(error) => {
                warn!(%error, "embedding request failed, falling back to lexical score");
                return None;
            }
        };
        if vectors.len() != 2 {
            warn!(count = vectors.len(), "backend returned wrong embedding count");
            return None;
        }
        match cosine(&vectors[0], &vectors[1]) {
            Ok(similarity) => Some(similarity),
            Err(error) => {
                warn!(%error, "cosine similarity failed, falling back to lexical score");
                None
            }
        }
    }
}

/// Cosine similarity of two equal-length vectors. A length mismatch is a
/// contract violation on the backend's part and is reported, never truncated.
fn cosine(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(anyhow!(
            "Vectors must be the same length for cosine similarity ({} vs {})",
            a.len(),
            b.len()
        ));
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}

/// Lowercase, split on any non-alphanumeric character, drop short tokens.
/// Case folding is Unicode-aware so accented text matches across case.
fn tokenize(text: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            cleaned.extend(ch.to_lowercase());
        } else {
            cleaned.push(' ');
        }
    }
    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Multiset-intersection overlap normalized by the job description's token
/// count, clamped to 1.0.
fn keyword_overlap(resume_text: &str, job_description: &str) -> f64 {
    let resume_tokens = tokenize(resume_text);
    let job_tokens = tokenize(job_description);
    if resume_tokens.is_empty() || job_tokens.is_empty() {
        return 0.0;
    }

    let mut resume_counts: HashMap<&str, usize> = HashMap::new();
    for token in &resume_tokens {
        *resume_counts.entry(token.as_str()).or_insert(0) += 1;
    }
    let mut job_counts: HashMap<&str, usize> = HashMap::new();
    for token in &job_tokens {
        *job_counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let overlap: usize = job_counts
        .iter()
        .filter_map(|(token, job_count)| {
            resume_counts.get(token).map(|resume_count| (*job_count).min(*resume_count))
        })
        .sum();

    (overlap as f64 / job_tokens.len() as f64).min(1.0)
}
