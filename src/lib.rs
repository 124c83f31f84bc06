//! # Ticket Responder
//!
//! Drafts replies to support tickets from similar past tickets.
//!
//! A submitted ticket is embedded and written to a vector index, the most
//! similar stored tickets are retrieved, a language model drafts a reply
//! using them as context, and the reply is emailed to the submitter through
//! a webhook relay.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌────────────────────────────────────────────┐
//! POST            │                 Pipeline                   │
//! /submit-ticket ─▶ embed ─▶ upsert ─▶ query ─▶ respond ─▶ notify│
//!                 └───┬────────┬────────┬─────────┬─────────┬──┘
//!                     ▼        ▼        ▼         ▼         ▼
//!                 Together  Pinecone Pinecone  Together   Webhook
//!                 embeddings index    index    chat       relay
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export TOGETHER_API_KEY=... PINECONE_API_KEY=... INDEX_HOST=... ZAPIER_WEBHOOK_URL=...
//! ticketd seed ./tickets.jsonl --limit 10   # load historical tickets
//! ticketd serve                             # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`models`] | Tickets, vectors, and matches |
//! | [`error`] | Pipeline error kinds |
//! | [`embedding`] | Embedding provider |
//! | [`index`] | Vector index clients |
//! | [`responder`] | Prompt layout and reply generation |
//! | [`notifier`] | Webhook email delivery |
//! | [`pipeline`] | Stage orchestration |
//! | [`seed`] | Bulk loading of historical tickets |
//! | [`server`] | HTTP server |

pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod notifier;
pub mod pipeline;
pub mod responder;
pub mod seed;
pub mod server;
