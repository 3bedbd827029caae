//! Core data models for the deal datasets.
//!
//! These types mirror the five collections the sync layer publishes
//! (deals, diligence tasks, documents, integration checklist templates and
//! site records). The engine treats every value as a read-only snapshot.
//!
//! Field names follow the JSON files the data room exports
//! (`deal_name`, `text_snippet`, `deal_association`, ...), so the same
//! structs deserialize the exported files and serialize API responses.

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Read an explicit `null` as the field's default, the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Lifecycle stage of an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DealStatus {
    #[serde(rename = "PSA")]
    Psa,
    #[default]
    Diligence,
    Closing,
    Integration,
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DealStatus::Psa => "PSA",
            DealStatus::Diligence => "Diligence",
            DealStatus::Closing => "Closing",
            DealStatus::Integration => "Integration",
        };
        f.write_str(s)
    }
}

/// One acquisition transaction on the roadmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    #[serde(alias = "name")]
    pub deal_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: DealStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub closing_date: String,
}

/// Department facet used to scope tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Department {
    Exec,
    Ops,
    Legal,
    Finance,
    #[serde(rename = "HR")]
    Hr,
    Dev,
    #[serde(other)]
    Other,
}

impl Department {
    pub const ALL: [Department; 7] = [
        Department::Exec,
        Department::Ops,
        Department::Legal,
        Department::Finance,
        Department::Hr,
        Department::Dev,
        Department::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Exec => "Exec",
            Department::Ops => "Ops",
            Department::Legal => "Legal",
            Department::Finance => "Finance",
            Department::Hr => "HR",
            Department::Dev => "Dev",
            Department::Other => "Other",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Department::ALL
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown department: '{}'. Use All, Exec, Ops, Legal, Finance, HR, Dev, or Other.",
                    s
                )
            })
    }
}

/// Progress of a diligence task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[serde(rename = "Not Started")]
    #[default]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Blocked,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::NotStarted => "Not Started",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Blocked => "Blocked",
        };
        f.write_str(s)
    }
}

/// Structured form of the `"{deal}_{phase}_{task}"` task key.
///
/// Parsed once at the dataset boundary; nothing downstream splits keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskKey {
    pub deal_name: String,
    pub phase_code: String,
    pub task_name: String,
    pub original_key: String,
}

impl TaskKey {
    /// Parse a composite key. Missing parts fall back to `Unknown Deal`,
    /// `Misc`, and the whole key respectively.
    ///
    /// Deal names that themselves contain `_` are not recoverable here; the
    /// first segment is taken as the deal.
    pub fn parse(key: &str) -> Self {
        let mut parts = key.splitn(3, '_');
        let deal_name = parts
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown Deal")
            .to_string();
        let phase_code = parts
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("Misc")
            .to_string();
        let task_name = parts
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(key)
            .to_string();
        Self {
            deal_name,
            phase_code,
            task_name,
            original_key: key.to_string(),
        }
    }
}

/// Value half of a task entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    #[serde(
        rename = "targetDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_date: Option<String>,
    #[serde(
        rename = "updatedBy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_by: Option<String>,
}

impl TaskEntry {
    /// Department used for scoping; unset counts as [`Department::Other`].
    pub fn effective_department(&self) -> Department {
        self.department.unwrap_or(Department::Other)
    }
}

/// A diligence task: parsed key plus its status entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub key: TaskKey,
    pub entry: TaskEntry,
}

impl TaskRecord {
    pub fn new(key: &str, entry: TaskEntry) -> Self {
        Self {
            key: TaskKey::parse(key),
            entry,
        }
    }
}

/// Document category in the virtual data room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocType {
    #[serde(rename = "PSA")]
    Psa,
    #[serde(rename = "ESA")]
    Esa,
    Title,
    Survey,
    Financial,
    #[serde(other)]
    Other,
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocType::Psa => "PSA",
            DocType::Esa => "ESA",
            DocType::Title => "Title",
            DocType::Survey => "Survey",
            DocType::Financial => "Financial",
            DocType::Other => "Other",
        };
        f.write_str(s)
    }
}

/// A data-room document with its extracted text.
///
/// `deal` may be absent; any association derived later is an inference,
/// never ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    #[serde(default, alias = "deal_name")]
    pub deal: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<DocType>,
    #[serde(default, alias = "description", deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, alias = "snippet", deserialize_with = "null_as_default")]
    pub text_snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub needs_ocr: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        rename = "uploadedAt",
        alias = "uploaded_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub uploaded_at: Option<String>,
}

/// Priority of an integration checklist template item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        };
        f.write_str(s)
    }
}

/// Generic integration checklist template item. Not tied to any deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub task: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,
}

/// A car-wash site record. `task` holds the site name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub task: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_association: Option<String>,
}

/// Deal filter applied to a query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DealScope {
    #[default]
    All,
    Deal(String),
}

impl DealScope {
    /// `"All"` (any case) or an empty string means no deal filter.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            DealScope::All
        } else {
            DealScope::Deal(trimmed.to_string())
        }
    }

    pub fn deal_name(&self) -> Option<&str> {
        match self {
            DealScope::All => None,
            DealScope::Deal(name) => Some(name),
        }
    }

    /// Whether a record owned by `deal` is inside this scope.
    pub fn admits(&self, deal: &str) -> bool {
        match self {
            DealScope::All => true,
            DealScope::Deal(name) => name == deal,
        }
    }
}

impl fmt::Display for DealScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DealScope::All => f.write_str("All"),
            DealScope::Deal(name) => f.write_str(name),
        }
    }
}

/// Department filter applied to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepartmentScope {
    #[default]
    All,
    Only(Department),
}

impl DepartmentScope {
    /// Unset departments are treated as [`Department::Other`].
    pub fn admits(&self, department: Option<Department>) -> bool {
        match self {
            DepartmentScope::All => true,
            DepartmentScope::Only(wanted) => department.unwrap_or(Department::Other) == *wanted,
        }
    }
}

impl fmt::Display for DepartmentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepartmentScope::All => f.write_str("All"),
            DepartmentScope::Only(d) => d.fmt(f),
        }
    }
}

impl FromStr for DepartmentScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(DepartmentScope::All);
        }
        match trimmed.parse::<Department>() {
            Ok(d) => Ok(DepartmentScope::Only(d)),
            Err(e) => bail!("{}", e),
        }
    }
}

/// One consistent value snapshot of all five collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSnapshot {
    pub deals: Vec<Deal>,
    pub tasks: Vec<TaskRecord>,
    pub documents: Vec<Document>,
    pub checklist: Vec<ChecklistItem>,
    pub sites: Vec<Site>,
}

impl DatasetSnapshot {
    pub fn is_known_deal(&self, name: &str) -> bool {
        self.deals.iter().any(|d| d.deal_name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
            && self.tasks.is_empty()
            && self.documents.is_empty()
            && self.checklist.is_empty()
            && self.sites.is_empty()
    }
}
