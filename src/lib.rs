//! # Vector Agent
//!
//! A retrieval-augmented chat agent over a private knowledge base, with
//! web search as a fallback when the knowledge base has nothing close.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌────────────┐
//! │   Loader    │──▶│  Ingestion   │──▶│ Knowledge  │
//! │ files/imgs  │   │ Chunk+Embed  │   │ Base (SQL) │
//! └─────────────┘   └──────────────┘   └─────┬──────┘
//!                                            │
//!   message ──▶ Contextualize ──▶ Retrieve ◀─┘──▶ Web (fallback)
//!                                    │
//!                                    ▼
//!                              Assemble ──▶ Answer
//!                                            │
//!                         ┌──────────────────┤
//!                         ▼                  ▼
//!                    ┌──────────┐      ┌──────────┐
//!                    │   CLI    │      │   HTTP   │
//!                    │ (vagent) │      │  (axum)  │
//!                    └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vagent init                       # create database
//! vagent ingest ./docs              # chunk and embed local files
//! vagent ask "what does the runbook say about restarts?"
//! vagent serve                      # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Core data types |
//! | [`error`] | Engine error taxonomy and call deadlines |
//! | [`traits`] | Knowledge base, web search, model and history seams |
//! | [`contextualize`] | Follow-up question rewriting |
//! | [`retrieval`] | Knowledge base search with web fallback |
//! | [`assemble`] | Prompt context rendering |
//! | [`answer`] | Answer generation and dummy mode |
//! | [`engine`] | One chat turn end to end |
//! | [`chunk`] | Sliding-window chunking |
//! | [`ingest`] | Ingestion pipeline and image captioning |
//! | [`loader`] | Filesystem document loading |
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Knowledge-base backends |
//! | [`history`] | Chat history stores |
//! | [`llm`] | Gemini client |
//! | [`web`] | DuckDuckGo client |
//! | [`bootstrap`] | Wiring from config |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod assemble;
pub mod bootstrap;
pub mod chunk;
pub mod config;
pub mod contextualize;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod history;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod retrieval;
pub mod server;
pub mod store;
pub mod traits;
pub mod web;
