//! Context composition.
//!
//! Renders the selected evidence into the plain-text context block the
//! language model answers from, plus the fixed system instruction.
//!
//! # Layout
//!
//! ```text
//! DEPARTMENT PERSPECTIVE: Legal
//! DEAL FOCUS: Arcadia
//!
//! === DEAL ROADMAP ===                       (full roster, never filtered)
//! === SITE PROFILES ===
//! === TASK STATUS ===
//! === DOCUMENT EVIDENCE ===
//! === INTEGRATION TEMPLATES (...) ===        (generic recommendations)
//! ```
//!
//! Sections always appear in this order. An empty section contains the
//! literal [`NO_MATCHES`] line so the model never infers absence from
//! omission. Associations that were derived rather than given carry an
//! `(inferred)` marker.

use std::fmt::Write;

use crate::infer::{self, DealAssociation};
use crate::models::{DatasetSnapshot, DealScope, DepartmentScope};
use crate::selector::Evidence;

/// Placeholder line for a section with no evidence.
pub const NO_MATCHES: &str = "No matches in the current dataset.";

pub const ROADMAP_HEADER: &str = "=== DEAL ROADMAP ===";
pub const SITES_HEADER: &str = "=== SITE PROFILES ===";
pub const TASKS_HEADER: &str = "=== TASK STATUS ===";
pub const DOCUMENTS_HEADER: &str = "=== DOCUMENT EVIDENCE ===";
pub const TEMPLATES_HEADER: &str =
    "=== INTEGRATION TEMPLATES (generic recommendations, not deal-specific) ===";

/// Behavioural contract sent with every completion call. Identical across calls.
pub const SYSTEM_INSTRUCTION: &str = "\
You are LINKS Transaction AI, the internal acquisitions assistant for Links Car Wash.
Tone: confident, helpful, efficient, clear.

Answer questions about the deal pipeline using ONLY the provided context data.

Rules:
- Never fabricate. If the answer is not in the context, say \"Not in the current dataset.\"
- A section that reads \"No matches in the current dataset.\" means nothing was found there; do not guess what it would contain.
- When a deal association is marked (inferred), say that the link was inferred rather than recorded.
- When referencing document content, cite the document filename.
- Integration templates are generic recommendations, never deal-specific facts.
- Frame recommendations for the stated department perspective.
- Do not give legal advice.
- Be direct. Use clean structured formatting (bullets, short paragraphs, tables) when asked for lists or tables.";

/// Build the context block for one query.
///
/// `snippet_chars` bounds every free-text field (summary, snippet, notes).
pub fn compose(
    snapshot: &DatasetSnapshot,
    evidence: &Evidence,
    deal_scope: &DealScope,
    department_scope: &DepartmentScope,
    snippet_chars: usize,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "DEPARTMENT PERSPECTIVE: {}", department_scope);
    let deal_focus = match deal_scope {
        DealScope::All => "All deals".to_string(),
        DealScope::Deal(name) => name.clone(),
    };
    let _ = writeln!(out, "DEAL FOCUS: {}", deal_focus);

    // ═══ Roadmap ═══
    section(&mut out, ROADMAP_HEADER);
    if snapshot.deals.is_empty() {
        placeholder(&mut out);
    }
    for deal in &snapshot.deals {
        let closing = if deal.closing_date.trim().is_empty() {
            "n/a"
        } else {
            deal.closing_date.as_str()
        };
        let _ = writeln!(
            out,
            "- {} | status: {} | closing: {}",
            deal.deal_name, deal.status, closing
        );
    }

    // ═══ Sites ═══
    section(&mut out, SITES_HEADER);
    if evidence.sites.is_empty() {
        placeholder(&mut out);
    }
    for site in &evidence.sites {
        let s = &site.record;
        let _ = write!(out, "- {} | status: {}", s.task, or_na(&s.status));
        if !s.date.trim().is_empty() {
            let _ = write!(out, " | date: {}", s.date);
        }
        let _ = writeln!(out, " | deal: {}", association(site.association.as_ref()));
    }

    // ═══ Tasks ═══
    section(&mut out, TASKS_HEADER);
    if evidence.tasks.is_empty() {
        placeholder(&mut out);
    }
    for task in &evidence.tasks {
        let t = &task.record;
        let department = t
            .entry
            .department
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Other (unset)".to_string());
        let _ = write!(
            out,
            "- [{}] {} / {}: {} | dept: {}",
            t.key.deal_name, t.key.phase_code, t.key.task_name, t.entry.status, department
        );
        if !t.entry.date.trim().is_empty() {
            let _ = write!(out, " | date: {}", t.entry.date);
        }
        if let Some(target) = t.entry.target_date.as_deref().filter(|s| !s.trim().is_empty()) {
            let _ = write!(out, " | target: {}", target);
        }
        if !t.entry.notes.trim().is_empty() {
            let _ = write!(out, " | notes: {}", truncate(&t.entry.notes, snippet_chars));
        }
        out.push('\n');
    }

    // ═══ Documents ═══
    section(&mut out, DOCUMENTS_HEADER);
    if evidence.documents.is_empty() {
        placeholder(&mut out);
    }
    for doc in &evidence.documents {
        let d = &doc.record;
        let doc_type = infer::document_type(d)
            .map(|t| t.to_string())
            .unwrap_or_else(|| "Unclassified".to_string());
        let _ = writeln!(out, "- File: {}", d.filename);
        let _ = writeln!(out, "  Deal: {}", association(doc.association.as_ref()));
        let _ = writeln!(out, "  Type: {}", doc_type);
        if d.needs_ocr {
            let _ = writeln!(out, "  Note: scanned document, text extraction pending (OCR)");
        }
        let _ = writeln!(out, "  Summary: {}", or_na(&truncate(&d.summary, snippet_chars)));
        let _ = writeln!(out, "  Snippet: {}", or_na(&truncate(&d.text_snippet, snippet_chars)));
    }

    // ═══ Templates ═══
    section(&mut out, TEMPLATES_HEADER);
    if evidence.templates.is_empty() {
        placeholder(&mut out);
    }
    for item in &evidence.templates {
        let t = &item.record;
        let _ = writeln!(
            out,
            "- (recommendation) {} | category: {} | priority: {}",
            t.task, t.category, t.priority
        );
    }

    out
}

/// Combine the context block and the user's question into the final prompt.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Context Data:\n{}\n\nUser Question: \"{}\"\n\nAnswer:",
        context.trim_end(),
        question.trim()
    )
}

fn section(out: &mut String, header: &str) {
    out.push('\n');
    out.push_str(header);
    out.push('\n');
}

fn placeholder(out: &mut String) {
    out.push_str(NO_MATCHES);
    out.push('\n');
}

fn association(assoc: Option<&DealAssociation>) -> String {
    match assoc {
        Some(a) if a.inferred => format!("{} (inferred)", a.deal_name),
        Some(a) => a.deal_name.clone(),
        None => "unassigned".to_string(),
    }
}

fn or_na(s: &str) -> &str {
    if s.trim().is_empty() {
        "n/a"
    } else {
        s
    }
}

/// Truncate to at most `max` characters on a char boundary, marking the cut.
fn truncate(s: &str, max: usize) -> String {
    let s = s.trim();
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
