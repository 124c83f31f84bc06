//! Recording fakes for the four pipeline collaborators.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use ticket_responder::embedding::Embedder;
use ticket_responder::index::{InMemoryIndex, TicketIndex};
use ticket_responder::models::{SimilarTicketMatch, SupportTicket, TicketVector};
use ticket_responder::notifier::Notifier;
use ticket_responder::pipeline::Pipeline;
use ticket_responder::responder::Responder;

/// Ordered log of collaborator calls, shared by every fake in one test.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

const DIMS: usize = 32;

/// Bag-of-words vector: each lowercase word bumps one of `DIMS` buckets.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
            % DIMS;
        v[bucket] += 1.0;
    }
    v
}

pub struct FakeEmbedder {
    pub log: CallLog,
    /// Calls numbered at or above this fail; `usize::MAX` never fails.
    pub fail_from: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_from: AtomicUsize::new(usize::MAX),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_always(&self) {
        self.fail_from.store(0, Ordering::SeqCst);
    }

    pub fn fail_after(&self, successes: usize) {
        self.fail_from.store(successes, Ordering::SeqCst);
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-bow"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.log.push(format!("embed:{}", text));
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.fail_from.load(Ordering::SeqCst) {
            bail!("embedding service unavailable");
        }
        Ok(bag_of_words(text))
    }
}

/// Wraps an [`InMemoryIndex`] and records every call.
pub struct RecordingIndex {
    pub inner: InMemoryIndex,
    pub log: CallLog,
    pub fail_upsert: AtomicBool,
    pub fail_query: AtomicBool,
    /// Answer every query with no matches, as an empty index would.
    pub empty_results: AtomicBool,
}

impl RecordingIndex {
    pub fn new(log: CallLog) -> Self {
        Self {
            inner: InMemoryIndex::new(),
            log,
            fail_upsert: AtomicBool::new(false),
            fail_query: AtomicBool::new(false),
            empty_results: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TicketIndex for RecordingIndex {
    async fn upsert(&self, vectors: &[TicketVector]) -> Result<()> {
        for v in vectors {
            self.log.push(format!("upsert:{}", v.id));
        }
        if self.fail_upsert.load(Ordering::SeqCst) {
            bail!("index write rejected");
        }
        self.inner.upsert(vectors).await
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SimilarTicketMatch>> {
        self.log.push(format!("query:{}", top_k));
        if self.fail_query.load(Ordering::SeqCst) {
            bail!("index query timed out");
        }
        if self.empty_results.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        self.inner.query(vector, top_k).await
    }
}

pub struct FakeResponder {
    pub log: CallLog,
    pub fail: AtomicBool,
    pub seen: Mutex<Vec<(String, Vec<SimilarTicketMatch>)>>,
}

impl FakeResponder {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail: AtomicBool::new(false),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Responder for FakeResponder {
    async fn respond(&self, issue: &str, similar: &[SimilarTicketMatch]) -> Result<String> {
        self.log.push(format!("respond:{}", similar.len()));
        self.seen
            .lock()
            .unwrap()
            .push((issue.to_string(), similar.to_vec()));
        if self.fail.load(Ordering::SeqCst) {
            bail!("completion service returned 503");
        }
        let subjects: Vec<String> = similar
            .iter()
            .filter_map(|m| m.metadata.subject.clone())
            .collect();
        Ok(format!(
            "Re: {} (see: {})",
            issue,
            subjects.join("; ")
        ))
    }
}

pub struct FakeNotifier {
    pub log: CallLog,
    pub fail: AtomicBool,
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl FakeNotifier {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, email: &str, subject: &str, body: &str) -> Result<()> {
        self.log.push(format!("notify:{}", email));
        if self.fail.load(Ordering::SeqCst) {
            bail!("webhook returned 500 Internal Server Error");
        }
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// All fakes for one test, plus the pipeline wired to them.
pub struct Harness {
    pub log: CallLog,
    pub embedder: Arc<FakeEmbedder>,
    pub index: Arc<RecordingIndex>,
    pub responder: Arc<FakeResponder>,
    pub notifier: Arc<FakeNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            embedder: Arc::new(FakeEmbedder::new(log.clone())),
            index: Arc::new(RecordingIndex::new(log.clone())),
            responder: Arc::new(FakeResponder::new(log.clone())),
            notifier: Arc::new(FakeNotifier::new(log.clone())),
            log,
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.embedder.clone(),
            self.index.clone(),
            self.responder.clone(),
            self.notifier.clone(),
            3,
        )
    }
}

pub fn login_ticket() -> SupportTicket {
    SupportTicket {
        subject: "Login fails".into(),
        body: "Cannot log in after reset".into(),
        priority: "high".into(),
        product_names: vec!["Auth".into()],
        email: "u@x.com".into(),
    }
}

/// A prior ticket about the same login problem.
pub fn prior_login_ticket() -> SupportTicket {
    SupportTicket {
        subject: "Login fails".into(),
        body: "Cannot log in after password reset on web".into(),
        priority: "medium".into(),
        product_names: vec!["Auth".into()],
        email: "old@x.com".into(),
    }
}

/// Stores `ticket` directly in the index, bypassing the call log.
pub async fn preload(index: &RecordingIndex, ticket: &SupportTicket) -> String {
    let vector = TicketVector::from_ticket(ticket, bag_of_words(&ticket.composed_text()));
    let id = vector.id.clone();
    index.inner.upsert(&[vector]).await.unwrap();
    id
}
