//! # Links Transaction AI CLI (`lta`)
//!
//! The `lta` binary asks the deal assistant questions, previews the evidence
//! it would ground an answer on, runs deal tools, prints pipeline stats, and
//! starts the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! lta --config ./config/lta.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lta ask "<question>"` | Answer a question from the deal data |
//! | `lta evidence "<question>"` | Show the selected evidence without calling the model |
//! | `lta tool list` | List deal tools |
//! | `lta tool run <tool> <deal>` | Run a deal tool against one deal |
//! | `lta stats` | Deal readiness and portfolio KPIs |
//! | `lta serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Ask across all deals
//! lta ask "What is the ESA status for Arcadia?"
//!
//! # Legal perspective, scoped to one deal
//! lta ask "What is blocking closing?" --deal "Top Edge" --department Legal
//!
//! # Inspect the composed prompt
//! lta evidence "integration plan" --prompt
//!
//! # Run a deal tool
//! lta tool run riskAnalysis "Slappy's 5-Site Deal"
//! ```
//!
//! Logging goes to stderr. Set `LTA_LOG` (e.g. `LTA_LOG=debug`) or pass
//! `--verbose` for more detail.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use links_transaction_ai::assistant::{PreparedQuery, TransactionAssistant};
use links_transaction_ai::completion::create_service;
use links_transaction_ai::config::{self, Config};
use links_transaction_ai::models::{DealScope, DepartmentScope};
use links_transaction_ai::selector::Scored;
use links_transaction_ai::snapshot::JsonDirSnapshot;
use links_transaction_ai::synthesizer::ChatResponse;
use links_transaction_ai::tools::{tool_infos, DealTool};
use links_transaction_ai::{server, stats};

const DEFAULT_CONFIG: &str = "./config/lta.toml";

/// Links Transaction AI: grounded answers over the acquisitions pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without one, built-in defaults are used and data is read from
/// `./data`.
#[derive(Parser)]
#[command(
    name = "lta",
    about = "Links Transaction AI — grounded answers over the acquisitions pipeline",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Log at debug level (overridden by `LTA_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from the deal data.
    Ask {
        question: String,

        /// Deal to focus on (`All` for every deal).
        #[arg(long, default_value = "All")]
        deal: String,

        /// Department perspective: All, Exec, Ops, Legal, Finance, HR, Dev, Other.
        #[arg(long, default_value = "All")]
        department: String,
    },

    /// Show the evidence a question would be answered from. No model call.
    Evidence {
        question: String,

        #[arg(long, default_value = "All")]
        deal: String,

        #[arg(long, default_value = "All")]
        department: String,

        /// Also print the full composed prompt.
        #[arg(long)]
        prompt: bool,
    },

    /// Deal tools (single-deal analysis presets).
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },

    /// Deal readiness and portfolio KPIs.
    Stats {
        /// Department used for open-task counts.
        #[arg(long, default_value = "All")]
        department: String,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum ToolAction {
    /// List the available deal tools.
    List,
    /// Run a deal tool against one deal.
    Run {
        /// Tool name, e.g. `verifyTitle` or `risk_analysis`.
        tool: String,
        /// Deal name as it appears on the roadmap.
        deal: String,

        #[arg(long, default_value = "All")]
        department: String,

        /// Show the evidence and prompt instead of calling the model.
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_env("LTA_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// The default config path may be absent; an explicit one must exist.
fn load_config(path: &Path) -> Result<Config> {
    if path == Path::new(DEFAULT_CONFIG) {
        config::load_config_or_default(path)
    } else {
        config::load_config(path)
    }
}

fn build_assistant(cfg: &Config) -> Result<TransactionAssistant> {
    let snapshots = Arc::new(JsonDirSnapshot::new(cfg.data.dir.clone()));
    let service = create_service(&cfg.completion)?;
    Ok(TransactionAssistant::new(snapshots, service, cfg))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    // Commands that don't require config
    if let Commands::Tool {
        action: ToolAction::List,
    } = &cli.command
    {
        println!("{:<16} DESCRIPTION", "TOOL");
        for t in tool_infos() {
            println!("{:<16} {}", t.name, t.description);
        }
        return Ok(());
    }

    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Ask {
            question,
            deal,
            department,
        } => {
            let department: DepartmentScope = department.parse()?;
            let assistant = build_assistant(&cfg)?;
            let response = assistant
                .query(&question, &DealScope::parse(&deal), &department)
                .await;
            print_response(&response);
        }
        Commands::Evidence {
            question,
            deal,
            department,
            prompt,
        } => {
            let department: DepartmentScope = department.parse()?;
            let assistant = build_assistant(&cfg)?;
            let prepared =
                assistant.prepare_query(&question, &DealScope::parse(&deal), &department)?;
            print_prepared(&prepared, prompt);
        }
        Commands::Tool { action } => match action {
            ToolAction::Run {
                tool,
                deal,
                department,
                dry_run,
            } => {
                let tool: DealTool = tool.parse()?;
                let department: DepartmentScope = department.parse()?;
                if deal.trim().is_empty() {
                    anyhow::bail!("deal must not be empty");
                }
                let assistant = build_assistant(&cfg)?;
                if dry_run {
                    let prepared = assistant.prepare_tool(tool, &deal, &department)?;
                    print_prepared(&prepared, true);
                } else {
                    let response = assistant.run_deal_tool(tool, &deal, &department).await;
                    print_response(&response);
                }
            }
            ToolAction::List => {
                // Handled above (before config loading)
                unreachable!()
            }
        },
        Commands::Stats { department } => {
            let department: DepartmentScope = department.parse()?;
            let snapshots = JsonDirSnapshot::new(cfg.data.dir.clone());
            stats::run_stats(&snapshots, &department)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn print_response(response: &ChatResponse) {
    println!("{}", response.text.trim_end());
    if !response.evidence.is_empty() {
        println!();
        println!("Evidence:");
        for doc in &response.evidence {
            println!("  - {}", doc.filename);
        }
    }
}

fn print_prepared(prepared: &PreparedQuery, show_prompt: bool) {
    let e = &prepared.evidence;
    println!(
        "Deal focus: {} | Department: {}",
        prepared.deal_scope, prepared.department_scope
    );
    println!();

    print_bucket("Documents", &e.documents, |d| d.filename.clone());
    print_bucket("Tasks", &e.tasks, |t| t.key.original_key.clone());
    print_bucket("Sites", &e.sites, |s| s.task.clone());
    print_bucket("Templates", &e.templates, |t| t.task.clone());

    if show_prompt {
        println!("--- prompt ---");
        println!("{}", prepared.prompt);
    }
}

fn print_bucket<T>(label: &str, items: &[Scored<T>], name: impl Fn(&T) -> String) {
    println!("{} ({}):", label, items.len());
    for item in items {
        let deal = match &item.association {
            Some(a) if a.inferred => format!("  [{} (inferred)]", a.deal_name),
            Some(a) => format!("  [{}]", a.deal_name),
            None => String::new(),
        };
        println!("  {:>3}  {}{}", item.score, name(&item.record), deal);
    }
    println!();
}
