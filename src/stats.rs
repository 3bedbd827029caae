//! Deal readiness and portfolio statistics.
//!
//! Gives a quick read on the pipeline: per-deal task progress and the
//! portfolio KPIs shown on the dashboard. Used by `lta stats` and
//! `GET /stats`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{DatasetSnapshot, DealScope, DealStatus, DepartmentScope, TaskStatus};
use crate::snapshot::SnapshotProvider;

/// Site statuses that count as active diligence.
pub const DILIGENCE_SITE_STATUSES: [&str; 2] = ["Under Contract", "Diligence"];

/// Task progress for one deal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealProgress {
    pub deal_name: String,
    pub status: DealStatus,
    pub closing_date: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub blocked_tasks: usize,
    /// Not completed, within the department scope.
    pub open_tasks: usize,
    /// `round(completed / total * 100)`, 0 without tasks.
    pub readiness_percent: u32,
}

/// Dashboard KPIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    /// Deals on the roadmap.
    pub active_deals: usize,
    pub sites_in_diligence: usize,
    /// Tasks currently in progress.
    pub critical_path_tasks: usize,
    /// Deals with status Closing.
    pub closing: Vec<String>,
    pub department_scope: String,
    pub deals: Vec<DealProgress>,
    pub computed_at: DateTime<Utc>,
}

pub fn readiness_percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as u32
    }
}

/// Progress for every deal on the roadmap, in roadmap order.
pub fn deal_progress(
    snapshot: &DatasetSnapshot,
    department_scope: &DepartmentScope,
) -> Vec<DealProgress> {
    snapshot
        .deals
        .iter()
        .map(|deal| {
            let scope = DealScope::Deal(deal.deal_name.clone());
            let tasks: Vec<_> = snapshot
                .tasks
                .iter()
                .filter(|t| scope.admits(&t.key.deal_name))
                .collect();
            let completed = tasks
                .iter()
                .filter(|t| t.entry.status == TaskStatus::Completed)
                .count();
            let blocked = tasks
                .iter()
                .filter(|t| t.entry.status == TaskStatus::Blocked)
                .count();
            let open = tasks
                .iter()
                .filter(|t| t.entry.status != TaskStatus::Completed)
                .filter(|t| department_scope.admits(t.entry.department))
                .count();

            DealProgress {
                deal_name: deal.deal_name.clone(),
                status: deal.status,
                closing_date: deal.closing_date.clone(),
                total_tasks: tasks.len(),
                completed_tasks: completed,
                blocked_tasks: blocked,
                open_tasks: open,
                readiness_percent: readiness_percent(completed, tasks.len()),
            }
        })
        .collect()
}

pub fn portfolio_summary(
    snapshot: &DatasetSnapshot,
    department_scope: &DepartmentScope,
) -> PortfolioSummary {
    PortfolioSummary {
        active_deals: snapshot.deals.len(),
        sites_in_diligence: snapshot
            .sites
            .iter()
            .filter(|s| DILIGENCE_SITE_STATUSES.contains(&s.status.as_str()))
            .count(),
        critical_path_tasks: snapshot
            .tasks
            .iter()
            .filter(|t| t.entry.status == TaskStatus::InProgress)
            .count(),
        closing: snapshot
            .deals
            .iter()
            .filter(|d| d.status == DealStatus::Closing)
            .map(|d| d.deal_name.clone())
            .collect(),
        department_scope: department_scope.to_string(),
        deals: deal_progress(snapshot, department_scope),
        computed_at: Utc::now(),
    }
}

/// Run the stats command: take a snapshot and print a summary.
pub fn run_stats(
    snapshots: &dyn SnapshotProvider,
    department_scope: &DepartmentScope,
) -> Result<()> {
    let snapshot = snapshots.snapshot()?;
    let summary = portfolio_summary(&snapshot, department_scope);

    println!("Links Transaction AI — Portfolio Stats");
    println!("======================================");
    println!();
    println!("  Data:          {}", snapshots.describe());
    println!("  As of:         {}", summary.computed_at.format("%Y-%m-%d %H:%M UTC"));
    println!();
    println!("  Active deals:        {}", summary.active_deals);
    println!("  Sites in diligence:  {}", summary.sites_in_diligence);
    println!("  Critical path tasks: {}", summary.critical_path_tasks);
    println!(
        "  Closing:             {}",
        if summary.closing.is_empty() {
            "none".to_string()
        } else {
            summary.closing.join(", ")
        }
    );

    if !summary.deals.is_empty() {
        println!();
        println!("  By deal (open tasks for {}):", summary.department_scope);
        println!(
            "  {:<24} {:<12} {:>6} {:>6} {:>8} {:>6} {:>7}",
            "DEAL", "STATUS", "TASKS", "DONE", "BLOCKED", "OPEN", "READY"
        );
        println!("  {}", "-".repeat(76));

        for d in &summary.deals {
            println!(
                "  {:<24} {:<12} {:>6} {:>6} {:>8} {:>6} {:>6}%",
                truncate_name(&d.deal_name, 24),
                d.status.to_string(),
                d.total_tasks,
                d.completed_tasks,
                d.blocked_tasks,
                d.open_tasks,
                d.readiness_percent
            );
        }
    }

    println!();
    Ok(())
}

fn truncate_name(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        name.to_string()
    } else {
        let cut: String = name.chars().take(width - 1).collect();
        format!("{}…", cut)
    }
}
