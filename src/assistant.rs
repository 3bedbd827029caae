//! The transaction assistant: public entry point of the engine.
//!
//! ```text
//! query / run_deal_tool
//!        │
//!        ▼
//!  SnapshotProvider ──► selector::select ──► context::compose ──► Synthesizer
//!   (value snapshot)     (scope + rank)       (context block)      (one call)
//!                                                                      │
//!                                                   ChatResponse ◄─────┘
//! ```
//!
//! Both entry points always return a [`ChatResponse`]; failures surface as
//! fallback text with empty evidence. Each call takes its own snapshot, so
//! concurrent calls share nothing mutable.

use serde::Serialize;
use std::sync::Arc;

use crate::completion::CompletionService;
use crate::config::Config;
use crate::context::{self, SYSTEM_INSTRUCTION};
use crate::error::AssistantError;
use crate::models::{DatasetSnapshot, DealScope, DepartmentScope};
use crate::selector::{self, Evidence, SelectionParams};
use crate::snapshot::SnapshotProvider;
use crate::synthesizer::{ChatResponse, Synthesizer};
use crate::tools::DealTool;

/// Everything computed for a query before the completion call.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedQuery {
    pub question: String,
    pub deal_scope: String,
    pub department_scope: String,
    pub evidence: Evidence,
    pub context: String,
    pub prompt: String,
}

pub struct TransactionAssistant {
    snapshots: Arc<dyn SnapshotProvider>,
    synthesizer: Synthesizer,
    params: SelectionParams,
    snippet_chars: usize,
}

impl TransactionAssistant {
    pub fn new(
        snapshots: Arc<dyn SnapshotProvider>,
        service: Arc<dyn CompletionService>,
        config: &Config,
    ) -> Self {
        Self {
            snapshots,
            synthesizer: Synthesizer::new(
                service,
                config.completion.temperature,
                config.completion.max_output_tokens,
            ),
            params: SelectionParams::from(&config.retrieval),
            snippet_chars: config.retrieval.snippet_chars,
        }
    }

    pub fn model_name(&self) -> &str {
        self.synthesizer.model_name()
    }

    pub fn data_source(&self) -> String {
        self.snapshots.describe()
    }

    /// Take a fresh value snapshot of the datasets.
    pub fn snapshot(&self) -> anyhow::Result<DatasetSnapshot> {
        self.snapshots.snapshot()
    }

    /// Select evidence and compose the prompt without calling the model.
    pub fn prepare(
        &self,
        snapshot: &DatasetSnapshot,
        question: &str,
        retrieval_query: &str,
        deal_scope: &DealScope,
        department_scope: &DepartmentScope,
    ) -> PreparedQuery {
        let evidence = selector::select(
            retrieval_query,
            snapshot,
            deal_scope,
            department_scope,
            &self.params,
        );
        let context = context::compose(
            snapshot,
            &evidence,
            deal_scope,
            department_scope,
            self.snippet_chars,
        );
        let prompt = context::build_prompt(&context, question);
        PreparedQuery {
            question: question.to_string(),
            deal_scope: deal_scope.to_string(),
            department_scope: department_scope.to_string(),
            evidence,
            context,
            prompt,
        }
    }

    /// Dry run of [`query`](Self::query).
    pub fn prepare_query(
        &self,
        user_text: &str,
        deal_scope: &DealScope,
        department_scope: &DepartmentScope,
    ) -> anyhow::Result<PreparedQuery> {
        let snapshot = self.snapshots.snapshot()?;
        Ok(self.prepare(&snapshot, user_text, user_text, deal_scope, department_scope))
    }

    /// Dry run of [`run_deal_tool`](Self::run_deal_tool).
    pub fn prepare_tool(
        &self,
        tool: DealTool,
        deal_name: &str,
        department_scope: &DepartmentScope,
    ) -> anyhow::Result<PreparedQuery> {
        let snapshot = self.snapshots.snapshot()?;
        Ok(self.prepare_tool_with(&snapshot, tool, deal_name, department_scope))
    }

    fn prepare_tool_with(
        &self,
        snapshot: &DatasetSnapshot,
        tool: DealTool,
        deal_name: &str,
        department_scope: &DepartmentScope,
    ) -> PreparedQuery {
        // Tools always run against exactly one deal.
        let scope = DealScope::Deal(deal_name.trim().to_string());
        self.prepare(
            snapshot,
            &tool.instruction(deal_name.trim()),
            tool.retrieval_query(),
            &scope,
            department_scope,
        )
    }

    /// Answer a free-text question.
    pub async fn query(
        &self,
        user_text: &str,
        deal_scope: &DealScope,
        department_scope: &DepartmentScope,
    ) -> ChatResponse {
        let snapshot = match self.snapshots.snapshot() {
            Ok(s) => s,
            Err(e) => return self.snapshot_failure(e),
        };
        let prepared = self.prepare(&snapshot, user_text, user_text, deal_scope, department_scope);
        self.answer(prepared).await
    }

    /// Run a deal tool. The deal scope is forced to `deal_name` regardless of
    /// any scope the caller is currently browsing with.
    pub async fn run_deal_tool(
        &self,
        tool: DealTool,
        deal_name: &str,
        department_scope: &DepartmentScope,
    ) -> ChatResponse {
        let snapshot = match self.snapshots.snapshot() {
            Ok(s) => s,
            Err(e) => return self.snapshot_failure(e),
        };
        if !snapshot.is_known_deal(deal_name.trim()) {
            tracing::warn!(
                deal = deal_name,
                tool = %tool,
                "deal tool invoked for a deal not on the roadmap"
            );
        }
        let prepared = self.prepare_tool_with(&snapshot, tool, deal_name, department_scope);
        self.answer(prepared).await
    }

    async fn answer(&self, prepared: PreparedQuery) -> ChatResponse {
        tracing::debug!(
            documents = prepared.evidence.documents.len(),
            tasks = prepared.evidence.tasks.len(),
            sites = prepared.evidence.sites.len(),
            templates = prepared.evidence.templates.len(),
            context_chars = prepared.context.chars().count(),
            "prepared query"
        );
        self.synthesizer
            .synthesize(
                SYSTEM_INSTRUCTION,
                &prepared.context,
                &prepared.question,
                prepared.evidence.documents(),
            )
            .await
    }

    fn snapshot_failure(&self, e: anyhow::Error) -> ChatResponse {
        let err = AssistantError::Snapshot(format!("{:#}", e));
        tracing::warn!(
            error = %err,
            source = %self.snapshots.describe(),
            "returning fallback answer"
        );
        ChatResponse::fallback(&err)
    }
}
