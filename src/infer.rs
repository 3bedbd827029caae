//! Deal-association inference and document classification.
//!
//! Documents and sites carry an optional deal reference. When it is absent
//! the engine can still guess the deal from the filename or site name. Any
//! such guess is returned as a tagged [`DealAssociation`] with
//! `inferred: true`, so the context block can say so explicitly.
//!
//! # Matching
//!
//! Text is normalized (lowercase, apostrophes dropped, every other
//! non-alphanumeric character becomes a word break) and matched on whole
//! words:
//!
//! 1. The full normalized deal name (`"top edge"` in `top_edge_financials`).
//! 2. Otherwise the deal's leading word when longer than three characters,
//!    ignoring a trailing plural/possessive `s` (`"richs"` in
//!    `Rich's Car Wash (Baytown)`).
//!
//! If more than one deal matches at a stage the result is `None`: an
//! ambiguous guess is worse than no guess.

use serde::Serialize;

use crate::models::{Deal, DocType, Document, Site};

/// A deal reference plus whether it was given or derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DealAssociation {
    pub deal_name: String,
    pub inferred: bool,
}

impl DealAssociation {
    pub fn given(deal_name: impl Into<String>) -> Self {
        Self {
            deal_name: deal_name.into(),
            inferred: false,
        }
    }

    pub fn inferred(deal_name: impl Into<String>) -> Self {
        Self {
            deal_name: deal_name.into(),
            inferred: true,
        }
    }
}

/// Resolve the deal of a document: its `deal` field, else a guess from the filename.
pub fn document_association(doc: &Document, deals: &[Deal]) -> Option<DealAssociation> {
    associate(doc.deal.as_deref(), &doc.filename, deals)
}

/// Resolve the deal of a site: its `deal_association`, else a guess from the site name.
pub fn site_association(site: &Site, deals: &[Deal]) -> Option<DealAssociation> {
    associate(site.deal_association.as_deref(), &site.task, deals)
}

/// Use `explicit` when present and non-blank, otherwise infer from `text`.
pub fn associate(explicit: Option<&str>, text: &str, deals: &[Deal]) -> Option<DealAssociation> {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => Some(DealAssociation::given(name)),
        None => infer_deal(text, deals).map(DealAssociation::inferred),
    }
}

/// Guess which deal `text` refers to. Returns `None` when nothing or more
/// than one deal matches.
pub fn infer_deal(text: &str, deals: &[Deal]) -> Option<String> {
    let haystack = normalize(text);
    if haystack.is_empty() {
        return None;
    }
    let padded = format!(" {} ", haystack);

    let full: Vec<&Deal> = deals
        .iter()
        .filter(|d| {
            let name = normalize(&d.deal_name);
            !name.is_empty() && padded.contains(&format!(" {} ", name))
        })
        .collect();
    if let Some(found) = unique(text, full) {
        return found;
    }

    let words: Vec<&str> = haystack.split(' ').map(stem).collect();
    let leading: Vec<&Deal> = deals
        .iter()
        .filter(|d| match leading_word(&d.deal_name) {
            Some(word) => words.contains(&stem(&word)),
            None => false,
        })
        .collect();
    unique(text, leading).unwrap_or(None)
}

/// `Some(Some(name))` on a single match, `Some(None)` when ambiguous, `None`
/// when nothing matched.
fn unique(text: &str, matches: Vec<&Deal>) -> Option<Option<String>> {
    match matches.len() {
        0 => None,
        1 => Some(Some(matches[0].deal_name.clone())),
        n => {
            tracing::warn!(
                text,
                candidates = n,
                "ambiguous deal inference; leaving association unset"
            );
            Some(None)
        }
    }
}

fn leading_word(deal_name: &str) -> Option<String> {
    let normalized = normalize(deal_name);
    let first = normalized.split(' ').next()?;
    if first.len() > 3 && !first.chars().all(|c| c.is_ascii_digit()) {
        Some(first.to_string())
    } else {
        None
    }
}

fn stem(word: &str) -> &str {
    if word.len() > 4 && word.ends_with('s') {
        &word[..word.len() - 1]
    } else {
        word
    }
}

/// Lowercase, drop apostrophes, and collapse every other non-alphanumeric
/// run into a single space.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c == '\'' || c == '\u{2019}' {
            continue;
        }
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Classify a document from its filename or storage path.
pub fn classify_document(filename: &str) -> Option<DocType> {
    let lower = filename.to_lowercase();
    if lower.contains("psa") {
        Some(DocType::Psa)
    } else if lower.contains("title") {
        Some(DocType::Title)
    } else if lower.contains("survey") {
        Some(DocType::Survey)
    } else if lower.contains("esa") || lower.contains("environmental") {
        Some(DocType::Esa)
    } else if lower.contains("financial") || lower.contains("p&l") || lower.contains("ebitda") {
        Some(DocType::Financial)
    } else {
        None
    }
}

/// The document's declared type, else its classified type.
pub fn document_type(doc: &Document) -> Option<DocType> {
    doc.doc_type.or_else(|| classify_document(&doc.filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DealStatus;

    fn deals() -> Vec<Deal> {
        [
            "Rich's 7-Site Deal",
            "Slappy's 5-Site Deal",
            "Arcadia",
            "Clean As a Whistle",
            "Take 5 Anderson",
            "Top Edge",
        ]
        .iter()
        .map(|n| Deal {
            deal_name: n.to_string(),
            status: DealStatus::Diligence,
            closing_date: String::new(),
        })
        .collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Rich's 7-Site Deal"), "richs 7 site deal");
        assert_eq!(normalize("vdr/top_edge/Top_Edge_P&L.xlsx"), "vdr top edge top edge p l xlsx");
        assert_eq!(normalize("  --  "), "");
    }

    #[test]
    fn test_infer_full_name() {
        assert_eq!(
            infer_deal("Top_Edge_Financials_2022.xlsx", &deals()).as_deref(),
            Some("Top Edge")
        );
        assert_eq!(
            infer_deal("vdr/clean_as_a_whistle/psa.pdf", &deals()).as_deref(),
            Some("Clean As a Whistle")
        );
        assert_eq!(
            infer_deal("Take 5 Anderson Site", &deals()).as_deref(),
            Some("Take 5 Anderson")
        );
    }

    #[test]
    fn test_infer_leading_word() {
        assert_eq!(
            infer_deal("Rich's Car Wash (Baytown)", &deals()).as_deref(),
            Some("Rich's 7-Site Deal")
        );
        assert_eq!(
            infer_deal("Slappy_Site3_Title_Commitment.pdf", &deals()).as_deref(),
            Some("Slappy's 5-Site Deal")
        );
        assert_eq!(infer_deal("Arcadia, FL", &deals()).as_deref(), Some("Arcadia"));
    }

    #[test]
    fn test_infer_no_match() {
        assert_eq!(infer_deal("Quarterly board deck.pdf", &deals()), None);
        assert_eq!(infer_deal("", &deals()), None);
        assert_eq!(infer_deal("Arcadia", &[]), None);
    }

    #[test]
    fn test_infer_ambiguous_is_none() {
        let mut ds = deals();
        ds.push(Deal {
            deal_name: "Arcadia North".to_string(),
            status: DealStatus::Psa,
            closing_date: String::new(),
        });
        // Both "Arcadia" and "Arcadia North" lead with "arcadia"; only the
        // first is a full-name match for this text.
        assert_eq!(infer_deal("Arcadia, FL", &ds).as_deref(), Some("Arcadia"));
        // Neither full name appears; both leading words match.
        assert_eq!(infer_deal("arcadias_site_plan.pdf", &ds), None);
    }

    #[test]
    fn test_explicit_association_is_not_inferred() {
        let site = Site {
            task: "Arcadia, FL".to_string(),
            status: "Integrated".to_string(),
            date: String::new(),
            deal_association: Some("Arcadia".to_string()),
        };
        assert_eq!(
            site_association(&site, &deals()),
            Some(DealAssociation::given("Arcadia"))
        );

        let unassigned = Site {
            deal_association: Some("  ".to_string()),
            ..site
        };
        assert_eq!(
            site_association(&unassigned, &deals()),
            Some(DealAssociation::inferred("Arcadia"))
        );
    }

    #[test]
    fn test_classify_document() {
        assert_eq!(classify_document("Richs_Portfolio_PSA_Executed.pdf"), Some(DocType::Psa));
        assert_eq!(classify_document("Slappy_Site3_Title_Commitment.pdf"), Some(DocType::Title));
        assert_eq!(classify_document("ALTA Survey.pdf"), Some(DocType::Survey));
        assert_eq!(classify_document("Phase1_Environmental.pdf"), Some(DocType::Esa));
        assert_eq!(classify_document("2022 P&L.xlsx"), Some(DocType::Financial));
        assert_eq!(classify_document("notes.txt"), None);
    }
}
