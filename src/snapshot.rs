//! Dataset snapshot providers.
//!
//! The engine never holds a live reference to the datasets. Each query asks a
//! [`SnapshotProvider`] for a fresh value snapshot of all five collections.
//!
//! Two providers ship with the crate:
//!
//! | Provider | Source |
//! |----------|--------|
//! | [`JsonDirSnapshot`] | Directory holding the exported data-room JSON files |
//! | [`StaticSnapshot`] | A snapshot already in memory (tests, embedding callers) |
//!
//! # File Layout
//!
//! | File | Collection | Accepted shapes |
//! |------|------------|-----------------|
//! | `roadmap.json` | deals | `[...]` or `{"deals": [...]}` |
//! | `task_status.json` | tasks | `{"<deal>_<phase>_<task>": entry}` |
//! | `documents.json` | documents | `[...]` or `{"documents": [...]}` |
//! | `checklist_data.json` | checklist templates | `[...]` or `{"checklist": [...]}` |
//! | `monday_data.json` | sites | `[...]` or `{"sites": [...]}` |
//!
//! A task entry may be a full object or a legacy flag (`true`, `"true"`),
//! which maps to `Completed`; anything else maps to `Not Started`.
//! Task order in the file is preserved.

use anyhow::{Context, Result};
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;

use crate::models::{
    ChecklistItem, DatasetSnapshot, Deal, Document, Site, TaskEntry, TaskRecord, TaskStatus,
};

pub const ROADMAP_FILE: &str = "roadmap.json";
pub const TASKS_FILE: &str = "task_status.json";
pub const DOCUMENTS_FILE: &str = "documents.json";
pub const CHECKLIST_FILE: &str = "checklist_data.json";
pub const SITES_FILE: &str = "monday_data.json";

/// Supplies one consistent snapshot of the datasets per call.
pub trait SnapshotProvider: Send + Sync {
    /// Short label for logs and error messages.
    fn describe(&self) -> String;

    /// Take a value snapshot of all five collections.
    fn snapshot(&self) -> Result<DatasetSnapshot>;
}

/// A snapshot held in memory and cloned per call.
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshot {
    data: DatasetSnapshot,
}

impl StaticSnapshot {
    pub fn new(data: DatasetSnapshot) -> Self {
        Self { data }
    }
}

impl SnapshotProvider for StaticSnapshot {
    fn describe(&self) -> String {
        "in-memory snapshot".to_string()
    }

    fn snapshot(&self) -> Result<DatasetSnapshot> {
        Ok(self.data.clone())
    }
}

/// Reads the exported JSON files from a directory on every call.
#[derive(Debug, Clone)]
pub struct JsonDirSnapshot {
    dir: PathBuf,
}

impl JsonDirSnapshot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_file(&self, name: &str) -> Result<Option<String>> {
        let path = self.dir.join(name);
        if !path.exists() {
            tracing::warn!(
                file = %path.display(),
                "dataset file missing; treating collection as empty"
            );
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read dataset file: {}", path.display()))?;
        Ok(Some(content))
    }

    fn load_list<T: DeserializeOwned>(&self, name: &str, wrapper: &str) -> Result<Vec<T>> {
        match self.read_file(name)? {
            Some(content) => parse_list(&content, wrapper)
                .with_context(|| format!("Failed to parse {}", self.dir.join(name).display())),
            None => Ok(Vec::new()),
        }
    }
}

impl SnapshotProvider for JsonDirSnapshot {
    fn describe(&self) -> String {
        format!("json directory {}", self.dir.display())
    }

    fn snapshot(&self) -> Result<DatasetSnapshot> {
        let deals: Vec<Deal> = self.load_list(ROADMAP_FILE, "deals")?;
        let documents: Vec<Document> = self.load_list(DOCUMENTS_FILE, "documents")?;
        let checklist: Vec<ChecklistItem> = self.load_list(CHECKLIST_FILE, "checklist")?;
        let sites: Vec<Site> = self.load_list(SITES_FILE, "sites")?;
        let tasks = match self.read_file(TASKS_FILE)? {
            Some(content) => parse_task_map(&content).with_context(|| {
                format!("Failed to parse {}", self.dir.join(TASKS_FILE).display())
            })?,
            None => Vec::new(),
        };

        tracing::debug!(
            deals = deals.len(),
            tasks = tasks.len(),
            documents = documents.len(),
            checklist = checklist.len(),
            sites = sites.len(),
            "loaded dataset snapshot"
        );

        Ok(DatasetSnapshot {
            deals,
            tasks,
            documents,
            checklist,
            sites,
        })
    }
}

/// Parse a collection stored either as a bare array or wrapped as
/// `{"<wrapper>": [...]}`.
pub fn parse_list<T: DeserializeOwned>(content: &str, wrapper: &str) -> Result<Vec<T>> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let items = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => map
            .remove(wrapper)
            .ok_or_else(|| anyhow::anyhow!("expected an array or an object with '{}'", wrapper))?,
        serde_json::Value::Null => return Ok(Vec::new()),
        _ => anyhow::bail!("expected an array or an object with '{}'", wrapper),
    };
    Ok(serde_json::from_value(items)?)
}

/// Parse `task_status.json` into task records, keeping file order.
///
/// Object values are full task entries and must deserialize. Scalar values
/// are the legacy completion flag: `true` / `"true"` is Completed, anything
/// else Not Started.
pub fn parse_task_map(content: &str) -> Result<Vec<TaskRecord>> {
    let TaskMap(entries) = serde_json::from_str(content)?;
    entries
        .into_iter()
        .map(|(key, raw)| Ok(TaskRecord::new(&key, task_entry(&key, raw)?)))
        .collect()
}

fn task_entry(key: &str, raw: serde_json::Value) -> Result<TaskEntry> {
    match raw {
        serde_json::Value::Object(_) => serde_json::from_value(raw)
            .with_context(|| format!("invalid entry for task '{}'", key)),
        serde_json::Value::Bool(done) => Ok(legacy_entry(done)),
        serde_json::Value::String(s) => Ok(legacy_entry(s.trim().eq_ignore_ascii_case("true"))),
        serde_json::Value::Null | serde_json::Value::Number(_) => Ok(legacy_entry(false)),
        serde_json::Value::Array(_) => {
            anyhow::bail!("invalid entry for task '{}': expected an object or a flag", key)
        }
    }
}

fn legacy_entry(done: bool) -> TaskEntry {
    TaskEntry {
        status: if done {
            TaskStatus::Completed
        } else {
            TaskStatus::NotStarted
        },
        ..TaskEntry::default()
    }
}

/// Ordered `key → value` pairs of the task map.
struct TaskMap(Vec<(String, serde_json::Value)>);

impl<'de> Deserialize<'de> for TaskMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TaskMapVisitor;

        impl<'de> Visitor<'de> for TaskMapVisitor {
            type Value = TaskMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping task keys to task entries")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<TaskMap, E> {
                Ok(TaskMap(Vec::new()))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TaskMap, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, serde_json::Value>()? {
                    entries.push((key, value));
                }
                Ok(TaskMap(entries))
            }
        }

        deserializer.deserialize_any(TaskMapVisitor)
    }
}
