//! Evaluation metrics shown next to stored turns on the history page.
//!
//! [`initialize_metrics`] prepares the tokenizer resource (built-in stopwords
//! plus an optional user list) and returns a [`Scorer`]. Failure to prepare
//! it is never fatal: [`initialize_metrics_or_warn`] logs the problem and the
//! history page simply renders without scores.
//!
//! # Tokenization
//!
//! Text is split on whitespace and punctuation. Each CJK character
//! (kana, kanji, hangul) becomes its own token, so Japanese answers score
//! sensibly without a morphological analyzer. ASCII letters are lowercased.
//!
//! # Scores
//!
//! | Score | Compares | Range |
//! |-------|----------|-------|
//! | `word_count` | answer tokens | count |
//! | `relevance` | question vs answer, content-token F1 | 0..1 |
//! | `bleu` | answer vs reference answer, sentence BLEU-4 | 0..1 |
//! | `similarity` | answer vs reference answer, term-frequency cosine | 0..1 |
//!
//! The reference answer comes from a sample record whose question matches the
//! turn's question; without one, `bleu` and `similarity` are `None`.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::config::MetricsConfig;
use crate::error::MetricsInitError;

const MAX_NGRAM: usize = 4;

const BUILTIN_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "i",
    "in", "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when",
    "where", "which", "who", "why", "with", "you", "の", "は", "が", "を", "に", "で", "と",
    "も", "へ", "や", "か", "ね", "よ", "す", "ま",
];

/// Per-turn scores rendered on the history page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnScores {
    pub word_count: usize,
    pub relevance: f64,
    pub bleu: Option<f64>,
    pub similarity: Option<f64>,
}

/// Tokenizer resource plus the scoring functions built on it.
#[derive(Debug, Clone)]
pub struct Scorer {
    stopwords: HashSet<String>,
}

/// Builds the scoring resource. Calling it again yields an equivalent scorer.
pub fn initialize_metrics(config: &MetricsConfig) -> Result<Scorer, MetricsInitError> {
    let mut stopwords: HashSet<String> =
        BUILTIN_STOPWORDS.iter().map(|s| s.to_string()).collect();

    if let Some(path) = &config.stopwords_path {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MetricsInitError(format!("cannot read stopwords {}: {}", path.display(), e))
        })?;
        stopwords.extend(
            content
                .lines()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        );
    }

    Ok(Scorer { stopwords })
}

/// Like [`initialize_metrics`], but failures become a warning and `None`.
pub fn initialize_metrics_or_warn(config: &MetricsConfig) -> Option<Scorer> {
    if !config.enabled {
        info!("metrics disabled; history will render without scores");
        return None;
    }
    match initialize_metrics(config) {
        Ok(scorer) => Some(scorer),
        Err(e) => {
            warn!(error = %e, "continuing without history metrics");
            None
        }
    }
}

impl Scorer {
    pub fn score_turn(&self, question: &str, answer: &str, reference: Option<&str>) -> TurnScores {
        let answer_tokens = tokenize(answer);
        let question_content = self.content_tokens(&tokenize(question));
        let answer_content = self.content_tokens(&answer_tokens);

        let (bleu, similarity) = match reference {
            Some(reference) => {
                let reference_tokens = tokenize(reference);
                let reference_content = self.content_tokens(&reference_tokens);
                (
                    Some(bleu(&reference_tokens, &answer_tokens)),
                    Some(cosine_similarity(
                        &term_frequencies(&reference_content),
                        &term_frequencies(&answer_content),
                    )),
                )
            }
            None => (None, None),
        };

        TurnScores {
            word_count: answer_tokens.len(),
            relevance: overlap_f1(&question_content, &answer_content),
            bleu,
            similarity,
        }
    }

    fn content_tokens(&self, tokens: &[String]) -> Vec<String> {
        tokens
            .iter()
            .filter(|t| !self.stopwords.contains(t.as_str()))
            .cloned()
            .collect()
    }
}

/// Splits text into word tokens; CJK characters are one token each.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    for c in text.chars() {
        if is_cjk(c) {
            flush(&mut word, &mut tokens);
            tokens.push(c.to_string());
        } else if c.is_alphanumeric() || c == '\'' {
            word.extend(c.to_lowercase());
        } else {
            flush(&mut word, &mut tokens);
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

fn flush(word: &mut String, tokens: &mut Vec<String>) {
    let trimmed = word.trim_matches('\'');
    if !trimmed.is_empty() {
        tokens.push(trimmed.to_string());
    }
    word.clear();
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}'   // hiragana
        | '\u{30A0}'..='\u{30FF}' // katakana
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{FF66}'..='\u{FF9D}')
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for gram in tokens.windows(n) {
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}

/// Sentence BLEU-4 with add-one smoothing on orders above 1.
pub fn bleu(reference: &[String], candidate: &[String]) -> f64 {
    if reference.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let mut log_precision = 0.0;
    for n in 1..=MAX_NGRAM {
        let cand = ngram_counts(candidate, n);
        let refs = ngram_counts(reference, n);
        let total: usize = cand.values().sum();
        let clipped: usize = cand
            .iter()
            .map(|(gram, count)| (*count).min(refs.get(gram).copied().unwrap_or(0)))
            .sum();

        let precision = if n == 1 {
            if clipped == 0 {
                return 0.0;
            }
            clipped as f64 / total as f64
        } else {
            (clipped + 1) as f64 / (total + 1) as f64
        };
        log_precision += precision.ln() / MAX_NGRAM as f64;
    }

    let c = candidate.len() as f64;
    let r = reference.len() as f64;
    let brevity_penalty = if c > r { 1.0 } else { (1.0 - r / c).exp() };

    brevity_penalty * log_precision.exp()
}

fn term_frequencies(tokens: &[String]) -> HashMap<&str, f64> {
    let mut tf = HashMap::new();
    for t in tokens {
        *tf.entry(t.as_str()).or_insert(0.0) += 1.0;
    }
    tf
}

/// Cosine similarity between two sparse term-frequency vectors.
///
/// Returns 0.0 when either vector is empty.
pub fn cosine_similarity<'a>(a: &HashMap<&'a str, f64>, b: &HashMap<&'a str, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
        .sum();
    let norm_a: f64 = a.values().map(|w| w * w).sum();
    let norm_b: f64 = b.values().map(|w| w * w).sum();

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// F1 of the multiset overlap between two token lists.
fn overlap_f1(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut remaining: HashMap<&str, usize> = HashMap::new();
    for t in a {
        *remaining.entry(t.as_str()).or_insert(0) += 1;
    }
    let mut common = 0usize;
    for t in b {
        if let Some(n) = remaining.get_mut(t.as_str()) {
            if *n > 0 {
                *n -= 1;
                common += 1;
            }
        }
    }
    if common == 0 {
        return 0.0;
    }

    let precision = common as f64 / b.len() as f64;
    let recall = common as f64 / a.len() as f64;
    2.0 * precision * recall / (precision + recall)
}
