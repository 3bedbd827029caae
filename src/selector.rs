//! Evidence selection.
//!
//! Turns a query plus a dataset snapshot into the bounded evidence set handed
//! to the context composer.
//!
//! # Pipeline
//!
//! 1. **Scope filter** (tasks only): keep tasks whose deal matches the deal
//!    scope and whose department matches the department scope (unset = Other).
//!    Documents and sites are never hard-filtered by deal; a matching deal
//!    only boosts their score.
//! 2. **Score and rank** each collection with [`crate::scoring::rank`].
//! 3. **Truncate** to the per-collection cap after ranking.
//!
//! Zero-score records are dropped. The one exception is a degenerate query
//! under deal scope `All`: when nothing in any collection scored, each
//! collection falls back to its head so the context is never empty.
//!
//! Integration templates are only eligible when the query mentions a trigger
//! word (`integration`, `plan`) or one of its terms matches a template.

use serde::{Deserialize, Serialize};

use crate::config::RetrievalConfig;
use crate::infer::{self, DealAssociation};
use crate::models::{
    ChecklistItem, DatasetSnapshot, DealScope, DepartmentScope, Document, Site, TaskRecord,
};
use crate::scoring::{rank, Query, ScoringWeights, ZeroScores};

/// Maximum evidence items per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceCaps {
    pub documents: usize,
    pub tasks: usize,
    pub sites: usize,
    pub templates: usize,
}

impl Default for EvidenceCaps {
    fn default() -> Self {
        Self {
            documents: 8,
            tasks: 15,
            sites: 10,
            templates: 10,
        }
    }
}

/// Tuning parameters for [`select`], decoupled from the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionParams {
    pub weights: ScoringWeights,
    pub caps: EvidenceCaps,
    /// Under scope `All`, return the head of every collection when no record
    /// in any collection scored above zero.
    pub fallback_to_head: bool,
    pub template_triggers: Vec<String>,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            caps: EvidenceCaps::default(),
            fallback_to_head: true,
            template_triggers: vec!["integration".to_string(), "plan".to_string()],
        }
    }
}

impl From<&RetrievalConfig> for SelectionParams {
    fn from(cfg: &RetrievalConfig) -> Self {
        Self {
            weights: ScoringWeights {
                deal_match: cfg.deal_match_weight,
                term: cfg.term_weight,
                phrase: cfg.phrase_weight,
                min_term_len: cfg.min_term_len,
            },
            caps: cfg.caps,
            fallback_to_head: cfg.fallback_to_head,
            template_triggers: cfg.template_triggers.clone(),
        }
    }
}

/// A selected record with its score and resolved deal association.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored<T> {
    pub record: T,
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub association: Option<DealAssociation>,
}

/// The evidence chosen for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evidence {
    pub documents: Vec<Scored<Document>>,
    pub tasks: Vec<Scored<TaskRecord>>,
    pub sites: Vec<Scored<Site>>,
    pub templates: Vec<Scored<ChecklistItem>>,
}

impl Evidence {
    /// The selected documents, in rank order. This is the provenance record
    /// returned alongside an answer.
    pub fn documents(&self) -> Vec<Document> {
        self.documents.iter().map(|d| d.record.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
            && self.tasks.is_empty()
            && self.sites.is_empty()
            && self.templates.is_empty()
    }
}

/// Select the evidence for `query` under the given scopes.
pub fn select(
    query: &str,
    snapshot: &DatasetSnapshot,
    deal_scope: &DealScope,
    department_scope: &DepartmentScope,
    params: &SelectionParams,
) -> Evidence {
    let query = Query::parse(query, params.weights.min_term_len);
    let weights = &params.weights;
    let caps = &params.caps;

    let tasks = scoped_tasks(snapshot, deal_scope, department_scope);
    let mut task_ranks = rank(
        &query,
        &tasks,
        deal_scope,
        weights,
        ZeroScores::Exclude,
        caps.tasks,
    );
    let mut document_ranks = rank(
        &query,
        &snapshot.documents,
        deal_scope,
        weights,
        ZeroScores::Exclude,
        caps.documents,
    );
    let mut site_ranks = rank(
        &query,
        &snapshot.sites,
        deal_scope,
        weights,
        ZeroScores::Exclude,
        caps.sites,
    );

    let triggered = params
        .template_triggers
        .iter()
        .any(|t| !t.is_empty() && query.mentions(t));
    let template_zeros = if triggered {
        ZeroScores::Keep
    } else {
        ZeroScores::Exclude
    };
    let templates: Vec<Scored<ChecklistItem>> = rank(
        &query,
        &snapshot.checklist,
        &DealScope::All,
        weights,
        template_zeros,
        caps.templates,
    )
    .into_iter()
    .map(|r| Scored {
        record: snapshot.checklist[r.index].clone(),
        score: r.score,
        association: None,
    })
    .collect();

    // Degenerate query: nothing scored anywhere, so show the head of each
    // collection instead of an empty context.
    let nothing_matched = task_ranks.is_empty()
        && document_ranks.is_empty()
        && site_ranks.is_empty()
        && templates.iter().all(|t| t.score == 0);
    if params.fallback_to_head && *deal_scope == DealScope::All && nothing_matched {
        task_ranks = rank(
            &query,
            &tasks,
            deal_scope,
            weights,
            ZeroScores::Keep,
            caps.tasks,
        );
        document_ranks = rank(
            &query,
            &snapshot.documents,
            deal_scope,
            weights,
            ZeroScores::Keep,
            caps.documents,
        );
        site_ranks = rank(
            &query,
            &snapshot.sites,
            deal_scope,
            weights,
            ZeroScores::Keep,
            caps.sites,
        );
    }

    let tasks: Vec<Scored<TaskRecord>> = task_ranks
        .into_iter()
        .map(|r| {
            let task = tasks[r.index];
            Scored {
                record: task.clone(),
                score: r.score,
                association: Some(DealAssociation::given(task.key.deal_name.clone())),
            }
        })
        .collect();

    let documents: Vec<Scored<Document>> = document_ranks
        .into_iter()
        .map(|r| {
            let doc = &snapshot.documents[r.index];
            Scored {
                record: doc.clone(),
                score: r.score,
                association: infer::document_association(doc, &snapshot.deals),
            }
        })
        .collect();

    let sites: Vec<Scored<Site>> = site_ranks
        .into_iter()
        .map(|r| {
            let site = &snapshot.sites[r.index];
            Scored {
                record: site.clone(),
                score: r.score,
                association: infer::site_association(site, &snapshot.deals),
            }
        })
        .collect();

    tracing::debug!(
        deal_scope = %deal_scope,
        department_scope = %department_scope,
        documents = documents.len(),
        tasks = tasks.len(),
        sites = sites.len(),
        templates = templates.len(),
        templates_triggered = triggered,
        "selected evidence"
    );

    Evidence {
        documents,
        tasks,
        sites,
        templates,
    }
}

/// Tasks inside the deal and department scopes, in collection order.
///
/// Under scope `All`, tasks whose deal prefix matches no known deal are kept
/// and reported; under a named deal they fall out of the prefix filter.
fn scoped_tasks<'a>(
    snapshot: &'a DatasetSnapshot,
    deal_scope: &DealScope,
    department_scope: &DepartmentScope,
) -> Vec<&'a TaskRecord> {
    let mut orphaned = 0usize;
    let tasks: Vec<&TaskRecord> = snapshot
        .tasks
        .iter()
        .filter(|t| deal_scope.admits(&t.key.deal_name))
        .filter(|t| department_scope.admits(t.entry.department))
        .inspect(|t| {
            if !snapshot.is_known_deal(&t.key.deal_name) {
                orphaned += 1;
            }
        })
        .collect();

    if orphaned > 0 {
        tracing::warn!(
            orphaned,
            "tasks reference a deal prefix that matches no known deal"
        );
    }
    tasks
}
