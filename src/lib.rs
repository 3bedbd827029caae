//! # Links Transaction AI
//!
//! Retrieval-and-synthesis engine behind the Links Car Wash acquisitions
//! assistant.
//!
//! Given a free-text question and a snapshot of the five deal datasets
//! (deals, diligence tasks, data-room documents, integration checklist
//! templates, site records), the engine selects a bounded evidence set,
//! composes a context block, and asks a language model for a grounded
//! answer that cites document filenames.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Snapshot    │──▶│   Selector   │──▶│   Context    │──▶│ Synthesizer  │
//! │ JSON / mem   │   │ scope+score  │   │   composer   │   │  (Gemini)    │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                                                 │
//!                      ┌──────────────────────────────────────────┤
//!                      ▼                                          ▼
//!                 ┌──────────┐                              ┌──────────┐
//!                 │   CLI    │                              │   HTTP   │
//!                 │  (lta)   │                              │  (axum)  │
//!                 └──────────┘                              └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export API_KEY=...                          # Gemini credential
//! lta ask "What is the ESA status for Arcadia?"
//! lta evidence "integration plan" --prompt    # dry run, no model call
//! lta tool run missingDocs "Top Edge"
//! lta stats --department Legal
//! lta serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Dataset types and query scopes |
//! | [`snapshot`] | Snapshot providers and tolerant dataset parsing |
//! | [`infer`] | Deal-association inference, document classification |
//! | [`scoring`] | Relevance scoring and ranking |
//! | [`selector`] | Evidence selection with per-collection caps |
//! | [`context`] | System instruction, context block, prompt |
//! | [`completion`] | Completion service trait and Gemini client |
//! | [`synthesizer`] | One-call answer synthesis with fallbacks |
//! | [`error`] | Failure classes and fallback texts |
//! | [`tools`] | Deal tool presets |
//! | [`assistant`] | `query` / `run_deal_tool` entry points |
//! | [`stats`] | Deal readiness and portfolio KPIs |
//! | [`config`] | TOML configuration parsing |
//! | [`server`] | HTTP JSON server |

pub mod assistant;
pub mod completion;
pub mod config;
pub mod context;
pub mod error;
pub mod infer;
pub mod models;
pub mod scoring;
pub mod selector;
pub mod server;
pub mod snapshot;
pub mod stats;
pub mod synthesizer;
pub mod tools;
