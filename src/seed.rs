//! Bulk loading of historical tickets into the index.
//!
//! Reads a JSON-lines file of past tickets, embeds each one's composed text,
//! and upserts the successful ones in a single batch under their own ids.
//! A record whose embedding fails is reported and skipped; a failed batch
//! write fails the whole run.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::embedding::Embedder;
use crate::index::TicketIndex;
use crate::models::{SupportTicket, TicketMetadata, TicketVector};

/// Default number of records loaded by `ticketd seed`.
pub const DEFAULT_SEED_LIMIT: usize = 10;

/// One historical ticket.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedRecord {
    /// Dataset identifier; numbers and strings are both accepted.
    pub id: serde_json::Value,
    pub subject: String,
    pub body: String,
    pub priority: String,
    #[serde(default)]
    pub product_names: Vec<String>,
    #[serde(default)]
    pub email: String,
}

impl SeedRecord {
    /// The record's id as an index identifier.
    pub fn index_id(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn to_ticket(&self) -> SupportTicket {
        SupportTicket {
            subject: self.subject.clone(),
            body: self.body.clone(),
            priority: self.priority.clone(),
            product_names: self.product_names.clone(),
            email: self.email.clone(),
        }
    }
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub read: usize,
    pub upserted: usize,
    pub failed: usize,
}

/// Parses JSON-lines records. Blank lines are ignored.
pub fn parse_seed_records(content: &str) -> Result<Vec<SeedRecord>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid seed record on line {}", i + 1))
        })
        .collect()
}

pub fn read_seed_file(path: &Path) -> Result<Vec<SeedRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    parse_seed_records(&content)
}

/// Embeds and upserts the first `limit` records.
pub async fn seed_index(
    embedder: &dyn Embedder,
    index: &dyn TicketIndex,
    records: &[SeedRecord],
    limit: usize,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    let mut vectors = Vec::new();

    for record in records.iter().take(limit) {
        report.read += 1;
        let ticket = record.to_ticket();
        match embedder.embed(&ticket.composed_text()).await {
            Ok(values) => vectors.push(TicketVector {
                id: record.index_id(),
                values,
                metadata: TicketMetadata::from(&ticket),
            }),
            Err(e) => {
                tracing::warn!(id = %record.index_id(), error = %format!("{:#}", e), "skipping seed record");
                report.failed += 1;
            }
        }
    }

    if !vectors.is_empty() {
        index
            .upsert(&vectors)
            .await
            .context("failed to upsert seed tickets")?;
        report.upserted = vectors.len();
    }

    tracing::info!(
        model = embedder.model_name(),
        read = report.read,
        upserted = report.upserted,
        failed = report.failed,
        "seeding finished"
    );
    Ok(report)
}
