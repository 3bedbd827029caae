//! Relevance scoring for the heterogeneous collections.
//!
//! Every collection type implements [`Searchable`]: it exposes the text a
//! query is matched against and, where it has one, the deal that owns it.
//! [`score`] is a pure function of `(query, record, scope, weights)`.
//!
//! # Scoring Rule
//!
//! ```text
//! score = deal_match_weight   if scope is a named deal and record.deal == scope
//!       + term_weight         for each query term found in the searchable text
//!       + phrase_weight       if the whole query appears in the searchable text
//! ```
//!
//! Query terms are the lowercased words of the query longer than
//! `min_term_len - 1` characters, deduplicated in order. Matching is plain
//! substring containment on lowercased text.
//!
//! # Ranking
//!
//! [`rank`] sorts by descending score with a stable sort, so ties keep the
//! collection's original order. What happens to zero scores is decided by the
//! caller through [`ZeroScores`].

use crate::models::{ChecklistItem, DealScope, Document, Site, TaskRecord};

/// Weights of the scoring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringWeights {
    pub deal_match: u32,
    pub term: u32,
    pub phrase: u32,
    /// Minimum length of a significant query term.
    pub min_term_len: usize,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            deal_match: 5,
            term: 1,
            phrase: 3,
            min_term_len: 4,
        }
    }
}

/// A query prepared for scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    phrase: String,
    terms: Vec<String>,
}

impl Query {
    pub fn parse(raw: &str, min_term_len: usize) -> Self {
        let phrase = raw.trim().to_lowercase();
        let mut terms: Vec<String> = Vec::new();
        for word in phrase.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.chars().count() >= min_term_len && !terms.iter().any(|t| t == word) {
                terms.push(word.to_string());
            }
        }
        Self { phrase, terms }
    }

    /// Lowercased, trimmed query.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// True when the query contains `needle` (case-insensitive).
    pub fn mentions(&self, needle: &str) -> bool {
        self.phrase.contains(&needle.to_lowercase())
    }
}

/// A record the scorer can match against.
pub trait Searchable {
    /// Lowercased text the query is matched against.
    fn searchable_text(&self) -> String;

    /// Deal that owns this record, if the record carries one.
    fn deal(&self) -> Option<&str> {
        None
    }
}

impl Searchable for Document {
    fn searchable_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.filename,
            self.deal.as_deref().unwrap_or(""),
            self.summary,
            self.text_snippet
        )
        .to_lowercase()
    }

    fn deal(&self) -> Option<&str> {
        self.deal.as_deref()
    }
}

impl Searchable for TaskRecord {
    fn searchable_text(&self) -> String {
        self.key.original_key.to_lowercase()
    }

    fn deal(&self) -> Option<&str> {
        Some(&self.key.deal_name)
    }
}

impl Searchable for ChecklistItem {
    fn searchable_text(&self) -> String {
        format!("{} {}", self.task, self.category).to_lowercase()
    }
}

impl Searchable for Site {
    fn searchable_text(&self) -> String {
        format!(
            "{} {}",
            self.task,
            self.deal_association.as_deref().unwrap_or("")
        )
        .to_lowercase()
    }

    fn deal(&self) -> Option<&str> {
        self.deal_association.as_deref()
    }
}

impl<T: Searchable + ?Sized> Searchable for &T {
    fn searchable_text(&self) -> String {
        (**self).searchable_text()
    }

    fn deal(&self) -> Option<&str> {
        (**self).deal()
    }
}

/// Score one record against a query.
pub fn score<T: Searchable + ?Sized>(
    query: &Query,
    record: &T,
    scope: &DealScope,
    weights: &ScoringWeights,
) -> u32 {
    let text = record.searchable_text();
    let mut total = 0;

    if let (Some(wanted), Some(owner)) = (scope.deal_name(), record.deal()) {
        if wanted == owner {
            total += weights.deal_match;
        }
    }

    for term in query.terms() {
        if text.contains(term.as_str()) {
            total += weights.term;
        }
    }

    if !query.phrase().is_empty() && text.contains(query.phrase()) {
        total += weights.phrase;
    }

    total
}

/// Treatment of records that scored zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroScores {
    /// Drop them.
    Exclude,
    /// Keep them after every positive score, in original order.
    Keep,
}

/// Position in the input slice plus the record's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranked {
    pub index: usize,
    pub score: u32,
}

/// Score, filter, and order `records`, then truncate to `limit`.
pub fn rank<T: Searchable>(
    query: &Query,
    records: &[T],
    scope: &DealScope,
    weights: &ScoringWeights,
    zeros: ZeroScores,
    limit: usize,
) -> Vec<Ranked> {
    let all: Vec<Ranked> = records
        .iter()
        .enumerate()
        .map(|(index, r)| Ranked {
            index,
            score: score(query, r, scope, weights),
        })
        .collect();

    let mut ranked: Vec<Ranked> = match zeros {
        ZeroScores::Keep => all,
        ZeroScores::Exclude => all.into_iter().filter(|r| r.score > 0).collect(),
    };

    // Stable: equal scores keep collection order.
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(limit);
    ranked
}
