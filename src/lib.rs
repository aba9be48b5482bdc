//! # qa-chat
//!
//! A small question-answering chat application with conversation history,
//! user feedback, and a managed set of reference Q&A samples, plus a
//! standalone accuracy check for an offline-trained classifier.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────────┐   ┌──────────┐
//! │  Browser   │──▶│ PageController │──▶│  SQLite  │
//! │  / CLI     │   │ chat/history/  │   │  turns + │
//! └────────────┘   │ sample_data    │   │  samples │
//!                  └───────┬────────┘   └──────────┘
//!                          ▼
//!                  ┌────────────────┐
//!                  │   Generator    │  (OpenAI-compatible
//!                  │ TextGenerator  │   completions API)
//!                  └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qachat init                       # create database and seed samples
//! qachat ask "日本の首都はどこですか？"
//! qachat history --scores
//! qachat serve                      # web UI at [server].bind
//! accuracy-check                    # verify models/titanic_model.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed errors at module seams |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`store`] | Turns and sample records |
//! | [`seed`] | Initial sample data |
//! | [`metrics`] | Scoring of stored turns |
//! | [`generation`] | Text-generation backends |
//! | [`controller`] | Page state machine |
//! | [`render`] | HTML rendering |
//! | [`server`] | Web UI and JSON API |
//! | [`check`] | Classifier accuracy/latency check |

pub mod ask;
pub mod check;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod export;
pub mod generation;
pub mod history;
pub mod metrics;
pub mod migrate;
pub mod models;
pub mod render;
pub mod samples;
pub mod seed;
pub mod server;
pub mod stats;
pub mod store;
