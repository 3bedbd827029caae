use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use links_transaction_ai::assistant::TransactionAssistant;
use links_transaction_ai::completion::{
    Completion, CompletionService, GeminiClient, GenerationOptions,
};
use links_transaction_ai::config::{CompletionConfig, Config};
use links_transaction_ai::context::{NO_MATCHES, SYSTEM_INSTRUCTION};
use links_transaction_ai::error::{AssistantError, FailureClass};
use links_transaction_ai::models::{DatasetSnapshot, DealScope, Department, DepartmentScope};
use links_transaction_ai::snapshot::{parse_list, parse_task_map, StaticSnapshot};
use links_transaction_ai::tools::DealTool;

// ─── Test double ────────────────────────────────────────────────────

/// Records every call and replies with a fixed text.
struct Recording {
    reply: Option<String>,
    credential: bool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    options: Mutex<Vec<GenerationOptions>>,
}

impl Recording {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
            credential: true,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
        })
    }

    fn silent() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            credential: true,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
        })
    }

    fn without_credential() -> Arc<Self> {
        Arc::new(Self {
            reply: Some("should never be returned".to_string()),
            credential: false,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionService for Recording {
    fn model_name(&self) -> &str {
        "recording"
    }

    fn preflight(&self) -> Result<(), AssistantError> {
        if self.credential {
            Ok(())
        } else {
            Err(AssistantError::Configuration("API key is not set".to_string()))
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Completion, AssistantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.options.lock().unwrap().push(options.clone());
        Ok(Completion {
            text: self.reply.clone(),
        })
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

fn mock_snapshot() -> DatasetSnapshot {
    let deals = parse_list(
        r#"{"deals": [
            {"deal_name": "Rich's 7-Site Deal", "status": "Closing", "closing_date": "2023-11-15"},
            {"deal_name": "Slappy's 5-Site Deal", "status": "Diligence", "closing_date": "2023-12-01"},
            {"deal_name": "Arcadia", "status": "Integration", "closing_date": "2023-10-01"},
            {"deal_name": "Clean As a Whistle", "status": "PSA", "closing_date": "2024-01-15"},
            {"deal_name": "Take 5 Anderson", "status": "Diligence", "closing_date": "2023-12-20"},
            {"deal_name": "Top Edge", "status": "PSA", "closing_date": "2024-02-01"}
        ]}"#,
        "deals",
    )
    .unwrap();

    let tasks = parse_task_map(
        r#"{
            "Rich's 7-Site Deal_R-1_Wire $1,000,000 Earnest Money": {"status": "Completed", "date": "2023-09-01", "notes": "Confirmed receipt.", "department": "Finance"},
            "Rich's 7-Site Deal_R-2_Phase I ESA Review": {"status": "Completed", "date": "2023-09-15", "notes": "No REC identified.", "department": "Legal"},
            "Rich's 7-Site Deal_R-3_Title Commitment Review": {"status": "In Progress", "date": "2023-10-20", "notes": "Waiting on objection response.", "department": "Legal"},
            "Slappy's 5-Site Deal_R-2_Equipment Audit": {"status": "In Progress", "date": "2023-10-25", "notes": "Site 3 pending access.", "department": "Ops"},
            "Slappy's 5-Site Deal_CHK_POS Migration": {"status": "Not Started", "date": "", "notes": ""},
            "Arcadia_Ops_Signage Installation": {"status": "Completed", "date": "2023-10-10", "notes": "Rebranding complete.", "department": "Ops"},
            "Top Edge_R-1_Title Review": true,
            "Clean As a Whistle_R-1_PSA Negotiation": {"status": "In Progress", "date": "2023-11-05", "notes": "Redlines with counsel.", "department": "Legal"}
        }"#,
    )
    .unwrap();

    let documents = parse_list(
        r#"[
            {"filename": "Richs_Portfolio_PSA_Executed.pdf", "deal": "Rich's 7-Site Deal", "needs_ocr": false, "type": "PSA",
             "summary": "Purchase and Sale Agreement for 7 car wash sites.", "text_snippet": "Section 2.1 Purchase Price."},
            {"filename": "Richs_Phase1_ESA_Report.pdf", "deal": "Rich's 7-Site Deal", "needs_ocr": false,
             "summary": "Phase I ESA for the Baytown site.", "text_snippet": "No RECs."},
            {"filename": "Arcadia_Phase1_ESA.pdf", "deal": "Arcadia", "needs_ocr": false, "type": "ESA",
             "summary": "Phase I ESA dated March 4, 2021. No Recognized Environmental Conditions (RECs) found.",
             "text_snippet": "Assessment revealed no evidence of RECs in connection with the property."},
            {"filename": "Slappy_Site3_Title_Commitment.pdf", "deal": "Slappy's 5-Site Deal", "needs_ocr": true, "type": "Title",
             "summary": "Title Commitment for Slappy's Bryant Irvin location.", "text_snippet": "Schedule B-II Exceptions: 14."},
            {"filename": "Top_Edge_Financials_2022.xlsx", "needs_ocr": false,
             "summary": "P&L Statement for FY 2022. EBITDA: $450k.", "text_snippet": "Net Income: $320,000."}
        ]"#,
        "documents",
    )
    .unwrap();

    let checklist = parse_list(
        r#"[
            {"task": "Setup DRB Tunnel Controller", "category": "Equipment", "priority": "High"},
            {"task": "Order Rebranding Signage", "category": "Marketing", "priority": "High"},
            {"task": "Transfer Utility Accounts", "category": "Utilities", "priority": "Medium"},
            {"task": "Configure POS Menu", "category": "IT", "priority": "High"},
            {"task": "Staff Training - Links Culture", "category": "HR", "priority": "Medium"}
        ]"#,
        "checklist",
    )
    .unwrap();

    let sites = parse_list(
        r#"[
            {"task": "Rich's Car Wash (Baytown)", "status": "Under Contract", "date": "2023-09-01", "deal_association": "Rich's 7-Site Deal"},
            {"task": "Slappy's McCart", "status": "Diligence", "date": "2023-10-05", "deal_association": "Slappy's 5-Site Deal"},
            {"task": "Arcadia, FL", "status": "Integrated", "date": "2023-08-15"}
        ]"#,
        "sites",
    )
    .unwrap();

    DatasetSnapshot {
        deals,
        tasks,
        documents,
        checklist,
        sites,
    }
}

fn assistant_with(
    snapshot: DatasetSnapshot,
    service: Arc<dyn CompletionService>,
) -> TransactionAssistant {
    TransactionAssistant::new(
        Arc::new(StaticSnapshot::new(snapshot)),
        service,
        &Config::default(),
    )
}

fn filenames(docs: &[links_transaction_ai::models::Document]) -> Vec<&str> {
    docs.iter().map(|d| d.filename.as_str()).collect()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_esa_query_ranks_scoped_deal_first() {
    let service = Recording::replying("No RECs were found for Arcadia (Arcadia_Phase1_ESA.pdf).");
    let assistant = assistant_with(mock_snapshot(), service.clone());

    let scope = DealScope::Deal("Arcadia".to_string());
    let response = assistant.query("ESA", &scope, &DepartmentScope::All).await;

    assert!(response.failure.is_none());
    let names = filenames(&response.evidence);
    let arcadia = names.iter().position(|n| *n == "Arcadia_Phase1_ESA.pdf").unwrap();
    let richs = names.iter().position(|n| *n == "Richs_Phase1_ESA_Report.pdf").unwrap();
    assert_eq!(arcadia, 0);
    assert!(arcadia < richs);
    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn test_evidence_is_selector_output_not_model_citations() {
    // The reply cites nothing; evidence still carries the selected documents.
    let service = Recording::replying("Not in the current dataset.");
    let assistant = assistant_with(mock_snapshot(), service.clone());

    let prepared = assistant
        .prepare_query("title commitment", &DealScope::All, &DepartmentScope::All)
        .unwrap();
    let response = assistant
        .query("title commitment", &DealScope::All, &DepartmentScope::All)
        .await;

    assert_eq!(response.evidence, prepared.evidence.documents());
    assert_eq!(filenames(&response.evidence), vec!["Slappy_Site3_Title_Commitment.pdf"]);
}

#[tokio::test]
async fn test_generation_settings_and_system_instruction() {
    let service = Recording::replying("ok");
    let assistant = assistant_with(mock_snapshot(), service.clone());

    assistant
        .query("What is the EBITDA for Top Edge?", &DealScope::All, &DepartmentScope::All)
        .await;
    assistant
        .query("integration plan", &DealScope::All, &DepartmentScope::All)
        .await;

    let options = service.options.lock().unwrap();
    assert_eq!(options.len(), 2);
    for o in options.iter() {
        assert_eq!(o.system_instruction, SYSTEM_INSTRUCTION);
        assert!((o.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(o.max_output_tokens, 2048);
    }
}

#[tokio::test]
async fn test_inferred_document_association_stated_in_context() {
    let service = Recording::replying("ok");
    let assistant = assistant_with(mock_snapshot(), service.clone());

    assistant
        .query("EBITDA", &DealScope::All, &DepartmentScope::All)
        .await;
    let prompt = service.last_prompt();
    assert!(prompt.contains("- File: Top_Edge_Financials_2022.xlsx"));
    assert!(prompt.contains("Deal: Top Edge (inferred)"));
    assert!(prompt.ends_with("User Question: \"EBITDA\"\n\nAnswer:"));
}

#[tokio::test]
async fn test_tool_forces_deal_focus() {
    let service = Recording::replying("Missing: survey, title commitment.");
    let assistant = assistant_with(mock_snapshot(), service.clone());

    let response = assistant
        .run_deal_tool(DealTool::MissingDocs, "Top Edge", &DepartmentScope::All)
        .await;

    assert_eq!(response.text, "Missing: survey, title commitment.");
    let prompt = service.last_prompt();
    assert!(prompt.contains("DEAL FOCUS: Top Edge"));
    assert!(!prompt.contains("DEAL FOCUS: All deals"));
    assert!(prompt.contains("missing or outstanding diligence documents for Top Edge"));

    let prepared = assistant
        .prepare_tool(DealTool::MissingDocs, "Top Edge", &DepartmentScope::All)
        .unwrap();
    for task in &prepared.evidence.tasks {
        assert_eq!(task.record.key.deal_name, "Top Edge");
    }
}

#[tokio::test]
async fn test_tool_names_resolve_from_any_case() {
    let service = Recording::replying("ok");
    let assistant = assistant_with(mock_snapshot(), service.clone());

    for name in ["verifyTitle", "risk_analysis"] {
        let tool: DealTool = name.parse().unwrap();
        let response = assistant
            .run_deal_tool(tool, "Slappy's 5-Site Deal", &DepartmentScope::All)
            .await;
        assert_eq!(response.text, "ok");
    }
    assert_eq!(service.calls(), 2);
}

#[tokio::test]
async fn test_empty_snapshot_resolves_with_placeholders() {
    let service = Recording::replying("Not in the current dataset.");
    let assistant = assistant_with(DatasetSnapshot::default(), service.clone());

    let response = assistant
        .query("anything", &DealScope::All, &DepartmentScope::All)
        .await;

    assert!(!response.text.is_empty());
    assert!(response.evidence.is_empty());
    assert_eq!(service.last_prompt().matches(NO_MATCHES).count(), 5);
}

#[tokio::test]
async fn test_empty_model_text_is_fallback() {
    let service = Recording::silent();
    let assistant = assistant_with(mock_snapshot(), service.clone());

    let response = assistant
        .query("ESA", &DealScope::All, &DepartmentScope::All)
        .await;
    assert_eq!(response.failure, Some(FailureClass::Empty));
    assert!(!response.text.is_empty());
    assert!(response.evidence.is_empty());
    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn test_missing_credential_short_circuits() {
    let service = Recording::without_credential();
    let assistant = assistant_with(mock_snapshot(), service.clone());

    let response = assistant
        .query("ESA", &DealScope::All, &DepartmentScope::All)
        .await;
    assert_eq!(response.failure, Some(FailureClass::Configuration));
    assert!(response.evidence.is_empty());
    assert_eq!(service.calls(), 0);

    let tool_response = assistant
        .run_deal_tool(DealTool::RiskAnalysis, "Arcadia", &DepartmentScope::All)
        .await;
    assert_eq!(tool_response.failure, Some(FailureClass::Configuration));
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn test_gemini_without_key_never_reaches_network() {
    // Points at a closed port: a network attempt would classify as Network.
    let config = CompletionConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        max_retries: 0,
        ..CompletionConfig::default()
    };
    let client = Arc::new(GeminiClient::new(&config, None).unwrap());
    let assistant = assistant_with(mock_snapshot(), client);

    let response = assistant
        .query("ESA", &DealScope::All, &DepartmentScope::All)
        .await;
    assert_eq!(response.failure, Some(FailureClass::Configuration));
}

#[tokio::test]
async fn test_unreachable_service_resolves_with_fallback() {
    let config = CompletionConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        max_retries: 0,
        timeout_secs: 5,
        ..CompletionConfig::default()
    };
    let client = Arc::new(GeminiClient::new(&config, Some("test-key".to_string())).unwrap());
    let assistant = assistant_with(mock_snapshot(), client);

    let response = assistant
        .query("ESA", &DealScope::Deal("Arcadia".to_string()), &DepartmentScope::All)
        .await;
    assert!(!response.text.is_empty());
    assert!(response.evidence.is_empty());
    assert_eq!(response.failure, Some(FailureClass::Network));
}

#[test]
fn test_task_scope_properties_hold_for_every_deal_and_department() {
    let snapshot = mock_snapshot();
    let assistant = assistant_with(snapshot.clone(), Recording::replying("ok"));
    let queries = ["", "title", "review", "ESA status", "integration plan", "zzzz"];

    for query in queries {
        for deal in &snapshot.deals {
            let scope = DealScope::Deal(deal.deal_name.clone());
            let prepared =
                assistant.prepare(&snapshot, query, query, &scope, &DepartmentScope::All);
            for t in &prepared.evidence.tasks {
                assert_eq!(t.record.key.deal_name, deal.deal_name, "query {:?}", query);
            }
        }
        for department in Department::ALL {
            let scope = DepartmentScope::Only(department);
            let prepared = assistant.prepare(&snapshot, query, query, &DealScope::All, &scope);
            for t in &prepared.evidence.tasks {
                assert_eq!(t.record.entry.effective_department(), department);
            }
        }
    }
}

#[test]
fn test_legacy_task_flag_counts_as_completed() {
    let snapshot = mock_snapshot();
    let task = snapshot
        .tasks
        .iter()
        .find(|t| t.key.deal_name == "Top Edge")
        .unwrap();
    assert_eq!(task.key.phase_code, "R-1");
    assert_eq!(task.key.task_name, "Title Review");
    assert_eq!(
        task.entry.status,
        links_transaction_ai::models::TaskStatus::Completed
    );
}

#[test]
fn test_caps_hold_for_large_collections() {
    let mut snapshot = mock_snapshot();
    let base_docs = snapshot.documents.clone();
    let base_tasks = snapshot.tasks.clone();
    let base_sites = snapshot.sites.clone();
    let base_templates = snapshot.checklist.clone();
    for _ in 0..10 {
        snapshot.documents.extend(base_docs.iter().cloned());
        snapshot.tasks.extend(base_tasks.iter().cloned());
        snapshot.sites.extend(base_sites.iter().cloned());
        snapshot.checklist.extend(base_templates.iter().cloned());
    }

    let assistant = assistant_with(snapshot.clone(), Recording::replying("ok"));
    for query in ["", "integration plan for title review", "ESA", "Slappy"] {
        for scope in [DealScope::All, DealScope::Deal("Rich's 7-Site Deal".to_string())] {
            let e = assistant
                .prepare(&snapshot, query, query, &scope, &DepartmentScope::All)
                .evidence;
            assert!(e.documents.len() <= 8);
            assert!(e.tasks.len() <= 15);
            assert!(e.sites.len() <= 10);
            assert!(e.templates.len() <= 10);
        }
    }
}

#[tokio::test]
async fn test_concurrent_queries_are_independent() {
    let service = Recording::replying("ok");
    let assistant = Arc::new(assistant_with(mock_snapshot(), service.clone()));

    let a = assistant.clone();
    let b = assistant.clone();
    let (ra, rb) = tokio::join!(
        async move { a.query("ESA", &DealScope::All, &DepartmentScope::All).await },
        async move {
            b.run_deal_tool(DealTool::VerifyTitle, "Slappy's 5-Site Deal", &DepartmentScope::All)
                .await
        }
    );
    assert_eq!(ra.text, "ok");
    assert_eq!(rb.text, "ok");
    assert_eq!(service.calls(), 2);
}
