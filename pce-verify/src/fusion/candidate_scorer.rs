//! Candidate Scorer & Filter
//!
//! Queries the terminology service once per candidate term, scores every
//! returned name against the term that produced it, drops formulation
//! mismatches and merges the survivors into a single ranked list.
//!
//! # Concurrency
//! Per-term lookups run through `futures::stream::buffer_unordered` with a
//! bounded worker count. The merge keeps the maximum score and the earliest
//! (term index, result position) per name, so completion order never affects
//! the output.

use crate::error::{bounded, LookupError};
use crate::fusion::formulation::formulation_mismatch;
use crate::fusion::similarity::{SimilarityScorer, TokenSetScorer};
use crate::types::{TerminologyCandidate, TerminologyLookup};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Tunables for one scoring pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScorerSettings {
    /// Minimum merged score for a name to survive (0-100)
    pub acceptance_threshold: u8,
    /// Worker pool size for per-term lookups
    pub max_concurrent_lookups: usize,
    /// Budget for a single lookup call
    pub lookup_timeout: Duration,
}

/// Merged state for one terminology name
#[derive(Debug, Clone, Copy)]
struct MergedScore {
    score: u8,
    first_seen: (usize, usize),
}

pub struct CandidateScorer {
    lookup: Arc<dyn TerminologyLookup>,
    similarity: Arc<dyn SimilarityScorer>,
    settings: ScorerSettings,
}

impl CandidateScorer {
    pub fn new(lookup: Arc<dyn TerminologyLookup>, settings: ScorerSettings) -> Self {
        Self {
            lookup,
            similarity: Arc::new(TokenSetScorer),
            settings,
        }
    }

    /// Replace the default token-set scorer
    pub fn with_similarity(mut self, similarity: Arc<dyn SimilarityScorer>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Look up one term; failures and timeouts count as "no matches"
    async fn lookup_term(&self, term: &str) -> Vec<String> {
        match bounded(self.settings.lookup_timeout, self.lookup.lookup(term)).await {
            Ok(names) => names,
            Err(LookupError::Timeout(budget)) => {
                warn!(
                    collaborator = self.lookup.name(),
                    term = %term,
                    timeout_ms = budget.as_millis() as u64,
                    "Terminology lookup timed out; treating as no matches"
                );
                Vec::new()
            }
            Err(e) => {
                warn!(
                    collaborator = self.lookup.name(),
                    term = %term,
                    error = %e,
                    "Terminology lookup failed; treating as no matches"
                );
                Vec::new()
            }
        }
    }

    /// Score all terms against the terminology service
    ///
    /// Returns candidates at or above the acceptance threshold, ordered by
    /// descending score with ties in first-seen order.
    pub async fn score(&self, text: &str, terms: &[String]) -> Vec<TerminologyCandidate> {
        let workers = self.settings.max_concurrent_lookups.max(1);

        let responses: Vec<(usize, &String, Vec<String>)> = stream::iter(terms.iter().enumerate())
            .map(|(term_idx, term)| async move { (term_idx, term, self.lookup_term(term).await) })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut merged: HashMap<String, MergedScore> = HashMap::new();

        for (term_idx, term, names) in responses {
            for (pos, name) in names.into_iter().enumerate() {
                if name.trim().is_empty() {
                    continue;
                }
                if let Some(keyword) = formulation_mismatch(&name, text) {
                    debug!(
                        term = %term,
                        name = %name,
                        keyword = keyword,
                        "Rejected candidate: formulation not evidenced in text"
                    );
                    continue;
                }

                let score = self.similarity.score(term, &name).min(100);
                let seen = (term_idx, pos);
                merged
                    .entry(name)
                    .and_modify(|m| {
                        m.score = m.score.max(score);
                        m.first_seen = m.first_seen.min(seen);
                    })
                    .or_insert(MergedScore {
                        score,
                        first_seen: seen,
                    });
            }
        }

        let mut ranked: Vec<(String, MergedScore)> = merged
            .into_iter()
            .filter(|(_, m)| m.score >= self.settings.acceptance_threshold)
            .collect();
        ranked.sort_by(|(_, a), (_, b)| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.first_seen.cmp(&b.first_seen))
        });

        debug!(
            terms = terms.len(),
            candidates = ranked.len(),
            "Candidate scoring complete"
        );

        ranked
            .into_iter()
            .map(|(name, m)| TerminologyCandidate::new(name, m.score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct TableLookup(Vec<(&'static str, Vec<&'static str>)>);

    /// Table lookup that stalls `slow_term` before answering
    struct SlowTermLookup {
        table: TableLookup,
        slow_term: &'static str,
        delay: Duration,
    }

    #[async_trait]
    impl TerminologyLookup for SlowTermLookup {
        fn name(&self) -> &'static str {
            "slow-table"
        }

        async fn lookup(&self, term: &str) -> Result<Vec<String>, LookupError> {
            if term == self.slow_term {
                tokio::time::sleep(self.delay).await;
            }
            self.table.lookup(term).await
        }

        async fn resolve_identifier(&self, _name: &str) -> Result<Option<String>, LookupError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl TerminologyLookup for TableLookup {
        fn name(&self) -> &'static str {
            "table"
        }

        async fn lookup(&self, term: &str) -> Result<Vec<String>, LookupError> {
            if term == "broken" {
                return Err(LookupError::Network("connection refused".into()));
            }
            Ok(self
                .0
                .iter()
                .find(|(t, _)| *t == term)
                .map(|(_, names)| names.iter().map(|n| n.to_string()).collect())
                .unwrap_or_default())
        }

        async fn resolve_identifier(&self, _name: &str) -> Result<Option<String>, LookupError> {
            Ok(None)
        }
    }

    fn settings() -> ScorerSettings {
        ScorerSettings {
            acceptance_threshold: 50,
            max_concurrent_lookups: 4,
            lookup_timeout: Duration::from_secs(1),
        }
    }

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_duplicate_names_merged_with_max_score() {
        let lookup = TableLookup(vec![
            ("hydrocodone", vec!["Hydrocodone/Acetaminophen"]),
            ("acetaminophen", vec!["Hydrocodone/Acetaminophen", "Acetaminophen"]),
        ]);
        let scorer = CandidateScorer::new(Arc::new(lookup), settings());

        let ranked = scorer
            .score("hydrocodone acetaminophen", &terms(&["hydrocodone", "acetaminophen"]))
            .await;

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "Hydrocodone/Acetaminophen");
        assert_eq!(ranked[0].score, 100);
        assert_eq!(ranked[1].name, "Acetaminophen");
    }

    #[tokio::test]
    async fn test_formulation_mismatch_filtered() {
        let lookup = TableLookup(vec![(
            "hydrocodone",
            vec!["Hydrocodone Polistirex Suspension", "Hydrocodone Tablet"],
        )]);
        let scorer = CandidateScorer::new(Arc::new(lookup), settings());

        let ranked = scorer.score("hydrocodone 5mg", &terms(&["hydrocodone"])).await;
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "Hydrocodone Tablet");
    }

    #[tokio::test]
    async fn test_low_scores_below_threshold_dropped() {
        let lookup = TableLookup(vec![("metformin", vec!["Lisinopril 10 MG Oral Tablet"])]);
        let scorer = CandidateScorer::new(Arc::new(lookup), settings());
        assert!(scorer.score("metformin", &terms(&["metformin"])).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_lookup_counts_as_empty() {
        let lookup = TableLookup(vec![("ibuprofen", vec!["Ibuprofen"])]);
        let scorer = CandidateScorer::new(Arc::new(lookup), settings());

        let ranked = scorer
            .score("broken ibuprofen", &terms(&["broken", "ibuprofen"]))
            .await;
        assert_eq!(ranked, vec![TerminologyCandidate::new("Ibuprofen", 100)]);
    }

    #[tokio::test]
    async fn test_ties_keep_first_seen_order() {
        let lookup = TableLookup(vec![
            ("zzzz", vec!["Zzzz Beta"]),
            ("aaaa", vec!["Aaaa Alpha"]),
        ]);
        let scorer = CandidateScorer::new(Arc::new(lookup), settings());

        let ranked = scorer.score("", &terms(&["zzzz", "aaaa"])).await;
        assert_eq!(ranked[0].name, "Zzzz Beta");
        assert_eq!(ranked[1].name, "Aaaa Alpha");
    }

    #[tokio::test]
    async fn test_ranking_independent_of_completion_order() {
        let lookup = SlowTermLookup {
            table: TableLookup(vec![
                ("zzzz", vec!["Zzzz Beta", "Aaaa Zzzz Combo"]),
                ("aaaa", vec!["Aaaa Alpha", "Aaaa Zzzz Combo"]),
            ]),
            slow_term: "zzzz",
            delay: Duration::from_millis(50),
        };
        let scorer = CandidateScorer::new(Arc::new(lookup), settings());

        let ranked = scorer.score("", &terms(&["zzzz", "aaaa"])).await;
        let names: Vec<&str> = ranked.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Zzzz Beta", "Aaaa Zzzz Combo", "Aaaa Alpha"]);
    }
}
