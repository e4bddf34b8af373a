//! # storebot
//!
//! A retail shopping assistant that answers free-text queries by routing
//! each one to the better of two retrieval-and-generation strategies:
//!
//! - **FAQ answering** — retrieval-augmented generation over a
//!   similarity-indexed FAQ collection, grounded strictly in the retrieved
//!   context.
//! - **Product answering** — natural-language-to-SQL over a fixed,
//!   read-only `product` schema, with a safety gate that keeps any
//!   non-`SELECT` statement away from the store.
//!
//! ## Pipeline
//!
//! ```text
//! query ──▶ IntentRouter ──┬─▶ FaqEngine ─────────────▶ answer
//!                          └─▶ SqlChain ─▶ Synthesizer ─▶ answer
//! ```
//!
//! Each request runs the pipeline strictly sequentially; the FAQ index,
//! the product store, and the encoder/completion services are shared,
//! externally-synchronized resources.
//!
//! ## Quick Start
//!
//! ```bash
//! storebot init                 # build the product DB from the bulk CSV
//! storebot ingest               # ingest the FAQ CSV into the collection
//! storebot ask "What is your return policy?"
//! storebot serve                # start the HTTP front door
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`traits`] | Encoder and completion capability seams |
//! | [`llm`] | Groq/OpenAI-compatible HTTP client |
//! | [`embedding`] | Vector similarity and BLOB codecs |
//! | [`router`] | Semantic intent routing |
//! | [`faq`] | FAQ ingestion and grounded answering |
//! | [`sql`] | NL2SQL compile / extract / validate / execute |
//! | [`synth`] | Tabular rows → natural-language answer |
//! | [`pipeline`] | The dispatcher |
//! | [`server`] | HTTP front door |

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod faq;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod router;
pub mod server;
pub mod sql;
pub mod synth;
pub mod traits;
