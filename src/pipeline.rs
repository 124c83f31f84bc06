//! Ticket submission pipeline.
//!
//! Sequences the four collaborators for one ticket:
//!
//! ```text
//! Received ─▶ Embedded ─▶ Upserted ─▶ Queried ─▶ Responded ─▶ Notified ─▶ Complete
//!     │           │           │          │           │            │
//!     └───────────┴───────────┴──────────┴───────────┴────────────┴──▶ Failed(stage, cause)
//! ```
//!
//! 1. Compose the ticket text (subject, priority, products, body) and embed it.
//! 2. Upsert that vector under the content-derived id, with the ticket as metadata.
//! 3. Embed the **body only** and query the index for the `top_k` nearest tickets.
//! 4. Draft a reply from the body and the matches.
//! 5. Send the reply to the submitter.
//!
//! The ticket is written before the query runs, so it is visible to its own
//! query and can come back as its own nearest match. The write embeds the
//! composed text while the query embeds only the body.
//!
//! The first failure aborts the remaining stages. A completed upsert is not
//! rolled back.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::embedding::{Embedder, TogetherEmbedder};
use crate::error::{PipelineError, Stage};
use crate::index::{create_index, TicketIndex};
use crate::models::{ProcessedTicket, SupportTicket, TicketVector};
use crate::notifier::{Notifier, WebhookNotifier};
use crate::responder::{ChatResponder, Responder};

/// Subject line of every reply email.
pub const RESPONSE_SUBJECT: &str = "Support Ticket Response";

/// Progress of one ticket through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Embedded,
    Upserted,
    Queried,
    Responded,
    Notified,
    Complete,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Received => "received",
            PipelineState::Embedded => "embedded",
            PipelineState::Upserted => "upserted",
            PipelineState::Queried => "queried",
            PipelineState::Responded => "responded",
            PipelineState::Notified => "notified",
            PipelineState::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// The submission pipeline and the collaborator handles it drives.
///
/// Handles are shared, read-only, and safe to use from concurrent requests.
#[derive(Clone)]
pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn TicketIndex>,
    responder: Arc<dyn Responder>,
    notifier: Arc<dyn Notifier>,
    top_k: usize,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn TicketIndex>,
        responder: Arc<dyn Responder>,
        notifier: Arc<dyn Notifier>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            responder,
            notifier,
            top_k,
        }
    }

    /// Builds every collaborator client from a validated [`Config`].
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Arc::new(TogetherEmbedder::new(&config.embedding)?),
            create_index(&config.index)?,
            Arc::new(ChatResponder::new(&config.completion)?),
            Arc::new(WebhookNotifier::new(&config.notifier)?),
            config.index.top_k,
        ))
    }

    /// Identifier of the model embedding tickets and queries.
    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    /// Runs `ticket` through every stage.
    ///
    /// # Errors
    ///
    /// Returns the [`PipelineError`] of the first stage that fails; later
    /// stages are not attempted.
    pub async fn process(
        &self,
        ticket: &SupportTicket,
    ) -> std::result::Result<ProcessedTicket, PipelineError> {
        let mut state = PipelineState::Received;
        let composed = ticket.composed_text();
        let ticket_id = ticket.index_id();
        tracing::info!(%ticket_id, %state, priority = %ticket.priority, "processing ticket");

        let values = self
            .embedder
            .embed(&composed)
            .await
            .map_err(|e| Stage::Embed.fail(e))?;
        state = advance(state, PipelineState::Embedded, &ticket_id);

        let vector = TicketVector::from_ticket(ticket, values);
        self.index
            .upsert(std::slice::from_ref(&vector))
            .await
            .map_err(|e| Stage::Upsert.fail(e))?;
        state = advance(state, PipelineState::Upserted, &ticket_id);

        let query_vector = self
            .embedder
            .embed(&ticket.body)
            .await
            .map_err(|e| Stage::Embed.fail(e))?;
        let similar = self
            .index
            .query(&query_vector, self.top_k)
            .await
            .map_err(|e| Stage::Query.fail(e))?;
        tracing::info!(%ticket_id, matches = similar.len(), "similar tickets retrieved");
        state = advance(state, PipelineState::Queried, &ticket_id);

        let response = self
            .responder
            .respond(&ticket.body, &similar)
            .await
            .map_err(|e| Stage::Respond.fail(e))?;
        state = advance(state, PipelineState::Responded, &ticket_id);

        self.notifier
            .notify(&ticket.email, RESPONSE_SUBJECT, &response)
            .await
            .map_err(|e| Stage::Notify.fail(e))?;
        state = advance(state, PipelineState::Notified, &ticket_id);

        advance(state, PipelineState::Complete, &ticket_id);
        Ok(ProcessedTicket {
            ticket_id,
            response,
            similar,
        })
    }
}

fn advance(from: PipelineState, to: PipelineState, ticket_id: &str) -> PipelineState {
    tracing::info!(%ticket_id, %from, %to, "pipeline transition");
    to
}
