//! Deal tools: named single-deal analysis presets.
//!
//! A tool is not a separate pipeline. It supplies a fixed instruction
//! (sent as the user question) and a keyword query (used for evidence
//! selection), and the call always runs scoped to one deal.
//!
//! | Tool | Purpose |
//! |------|---------|
//! | `verifyTitle` | Title commitment and survey status, open exceptions |
//! | `summarizeESA` | Environmental site assessment findings |
//! | `missingDocs` | Outstanding diligence documents |
//! | `riskAnalysis` | Ranked deal risks against the closing timeline |
//!
//! Names are matched case-insensitively and ignore `_` / `-`, so
//! `risk_analysis` and `RiskAnalysis` both resolve.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DealTool {
    VerifyTitle,
    SummarizeEsa,
    MissingDocs,
    RiskAnalysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown deal tool: '{0}'. Use verifyTitle, summarizeESA, missingDocs, or riskAnalysis.")]
pub struct UnknownTool(pub String);

/// Serializable tool info for the `/tools/list` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

impl DealTool {
    pub const ALL: [DealTool; 4] = [
        DealTool::VerifyTitle,
        DealTool::SummarizeEsa,
        DealTool::MissingDocs,
        DealTool::RiskAnalysis,
    ];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            DealTool::VerifyTitle => "verifyTitle",
            DealTool::SummarizeEsa => "summarizeESA",
            DealTool::MissingDocs => "missingDocs",
            DealTool::RiskAnalysis => "riskAnalysis",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DealTool::VerifyTitle => "Check title commitments and surveys for open exceptions",
            DealTool::SummarizeEsa => "Summarize environmental site assessment findings",
            DealTool::MissingDocs => "List diligence documents not yet received",
            DealTool::RiskAnalysis => "Rank deal risks against the closing timeline",
        }
    }

    /// Keywords used to rank evidence for this tool.
    pub fn retrieval_query(&self) -> &'static str {
        match self {
            DealTool::VerifyTitle => "title commitment survey exceptions",
            DealTool::SummarizeEsa => "ESA environmental phase1 assessment",
            DealTool::MissingDocs => "missing documents outstanding diligence review",
            DealTool::RiskAnalysis => "risk blocked title environmental financials",
        }
    }

    /// The analytical task, phrased as the question for `deal_name`.
    pub fn instruction(&self, deal_name: &str) -> String {
        match self {
            DealTool::VerifyTitle => format!(
                "Verify the title status for {deal}. Review the title commitment, survey and related \
                 tasks; list open exceptions, missing title items and who owns them.",
                deal = deal_name
            ),
            DealTool::SummarizeEsa => format!(
                "Summarize the environmental site assessment (ESA) findings for {deal}: recognized \
                 environmental conditions, recommended follow-up, and any site without a Phase I report.",
                deal = deal_name
            ),
            DealTool::MissingDocs => format!(
                "Identify missing or outstanding diligence documents for {deal}. Compare the document \
                 evidence with the open tasks and list what has not been received.",
                deal = deal_name
            ),
            DealTool::RiskAnalysis => format!(
                "Give a risk analysis for {deal}: blocked or overdue tasks, document gaps, title or \
                 environmental concerns, and timeline risk to the closing date. Rank risks by severity.",
                deal = deal_name
            ),
        }
    }

    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

impl fmt::Display for DealTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DealTool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        DealTool::ALL
            .iter()
            .copied()
            .find(|t| t.name().to_lowercase() == wanted)
            .ok_or_else(|| UnknownTool(s.to_string()))
    }
}

/// Info for every tool, in display order.
pub fn tool_infos() -> Vec<ToolInfo> {
    DealTool::ALL.iter().map(DealTool::info).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_names() {
        for tool in DealTool::ALL {
            assert_eq!(tool.name().parse::<DealTool>(), Ok(tool));
        }
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!("risk_analysis".parse::<DealTool>(), Ok(DealTool::RiskAnalysis));
        assert_eq!("summarize-esa".parse::<DealTool>(), Ok(DealTool::SummarizeEsa));
        assert_eq!(" MISSINGDOCS ".parse::<DealTool>(), Ok(DealTool::MissingDocs));
    }

    #[test]
    fn test_unknown_tool() {
        let err = "forecast".parse::<DealTool>().unwrap_err();
        assert_eq!(err, UnknownTool("forecast".to_string()));
        assert!(err.to_string().contains("verifyTitle"));
    }

    #[test]
    fn test_instruction_names_deal() {
        for tool in DealTool::ALL {
            assert!(tool.instruction("Top Edge").contains("Top Edge"));
        }
    }

    #[test]
    fn test_tool_infos() {
        let infos = tool_infos();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["verifyTitle", "summarizeESA", "missingDocs", "riskAnalysis"]);
    }
}
