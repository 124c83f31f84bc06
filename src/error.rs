//! Pipeline error taxonomy.
//!
//! Collaborator clients report failures as [`anyhow::Error`] with context.
//! The pipeline folds each one into a [`PipelineError`] tagged with the
//! stage that produced it, which is what the HTTP layer reports.

use std::fmt;

use thiserror::Error;

/// A stage of the submission pipeline that calls out to a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embed,
    Upsert,
    Query,
    Respond,
    Notify,
}

impl Stage {
    /// Wraps a collaborator failure as this stage's error kind.
    ///
    /// The full context chain is kept in the message (`"outer: inner"`).
    pub fn fail(self, err: anyhow::Error) -> PipelineError {
        let message = format!("{:#}", err);
        match self {
            Stage::Embed => PipelineError::Embedding(message),
            Stage::Upsert => PipelineError::IndexWrite(message),
            Stage::Query => PipelineError::IndexQuery(message),
            Stage::Respond => PipelineError::Generation(message),
            Stage::Notify => PipelineError::Notification(message),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Embed => "embed",
            Stage::Upsert => "upsert",
            Stage::Query => "query",
            Stage::Respond => "respond",
            Stage::Notify => "notify",
        };
        f.write_str(name)
    }
}

/// Errors that abort a ticket submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The embedding service was unreachable, failed, or got invalid input.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Writing the ticket vector to the index failed.
    #[error("Index upsert error: {0}")]
    IndexWrite(String),

    /// Querying the index for similar tickets failed.
    #[error("Index query error: {0}")]
    IndexQuery(String),

    /// The completion service failed to draft a response.
    #[error("Response generation error: {0}")]
    Generation(String),

    /// The webhook relay rejected or never received the notification.
    #[error("Email notification error: {0}")]
    Notification(String),
}

impl PipelineError {
    /// The stage this error was raised from.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Embedding(_) => Stage::Embed,
            PipelineError::IndexWrite(_) => Stage::Upsert,
            PipelineError::IndexQuery(_) => Stage::Query,
            PipelineError::Generation(_) => Stage::Respond,
            PipelineError::Notification(_) => Stage::Notify,
        }
    }
}
