//! Deterministic in-memory collaborator fakes.
//!
//! Design decisions (kept intentionally simple/deterministic, same spirit as
//! the workspace's paper-broker fake):
//! - No randomness. No real timestamps — callers pass in or read back what
//!   they configured.
//! - Every fake records the calls it received so tests can assert on them.
//! - Responses are pre-programmed, consumed in FIFO order per key (or, for
//!   the decoder, looked up by exact source URL).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use nf_pipeline::{
    DecodedEntry, DecoderFailure, PublishFailure, Publisher, RankFailure, Ranker, SourceDecoder,
    TrainingExample,
};

// ---------------------------------------------------------------------------
// FakeDecoder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeDecoder {
    responses: Mutex<HashMap<String, VecDeque<Result<Vec<DecodedEntry>, DecoderFailure>>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the given source URL. Multiple calls to the same
    /// URL consume responses in the order they were queued; once exhausted,
    /// the last queued response repeats.
    pub fn push_entries(&self, source_url: &str, entries: Vec<DecodedEntry>) {
        self.responses
            .lock()
            .unwrap()
            .entry(source_url.to_string())
            .or_default()
            .push_back(Ok(entries));
    }

    pub fn push_failure(&self, source_url: &str, failure: DecoderFailure) {
        self.responses
            .lock()
            .unwrap()
            .entry(source_url.to_string())
            .or_default()
            .push_back(Err(failure));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceDecoder for FakeDecoder {
    async fn fetch_entries(&self, source_url: &str) -> Result<Vec<DecodedEntry>, DecoderFailure> {
        self.calls.lock().unwrap().push(source_url.to_string());

        let mut responses = self.responses.lock().unwrap();
        let queue = responses
            .get_mut(source_url)
            .unwrap_or_else(|| panic!("FakeDecoder: no response queued for {source_url}"));

        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

// ---------------------------------------------------------------------------
// FakeRanker
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeRanker {
    responses: Mutex<HashMap<String, VecDeque<Result<f64, RankFailure>>>>,
    calls: Mutex<Vec<String>>,
    training_set: Mutex<Option<Result<Vec<TrainingExample>, RankFailure>>>,
}

impl FakeRanker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program the response for the next `training_set()` call. Not tied to
    /// any `link`, unlike `rank_url`'s per-link queue.
    pub fn set_training_set(&self, examples: Vec<TrainingExample>) {
        *self.training_set.lock().unwrap() = Some(Ok(examples));
    }

    pub fn push_rank(&self, link: &str, rank: f64) {
        self.responses
            .lock()
            .unwrap()
            .entry(link.to_string())
            .or_default()
            .push_back(Ok(rank));
    }

    pub fn push_failure(&self, link: &str, failure: RankFailure) {
        self.responses
            .lock()
            .unwrap()
            .entry(link.to_string())
            .or_default()
            .push_back(Err(failure));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ranker for FakeRanker {
    async fn rank_url(&self, link: &str) -> Result<f64, RankFailure> {
        self.calls.lock().unwrap().push(link.to_string());

        let mut responses = self.responses.lock().unwrap();
        let queue = responses
            .get_mut(link)
            .unwrap_or_else(|| panic!("FakeRanker: no response queued for {link}"));

        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }

    async fn training_set(&self) -> Result<Vec<TrainingExample>, RankFailure> {
        self.training_set
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ---------------------------------------------------------------------------
// FakePublisher
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakePublisher {
    responses: Mutex<VecDeque<Result<(), PublishFailure>>>,
    published: Mutex<Vec<String>>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_success(&self) {
        self.responses.lock().unwrap().push_back(Ok(()));
    }

    pub fn push_failure(&self, failure: PublishFailure) {
        self.responses.lock().unwrap().push_back(Err(failure));
    }

    pub fn published_messages(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, message: &str) -> Result<(), PublishFailure> {
        self.published.lock().unwrap().push(message.to_string());

        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.pop_front().unwrap()
        } else {
            responses
                .front()
                .cloned()
                .unwrap_or(Ok(()))
        }
    }
}
