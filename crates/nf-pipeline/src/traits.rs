//! Collaborator boundary: the three pluggable interfaces the dispatcher loops
//! delegate to. Real implementations live in `nf-runtime` (HTTP-backed);
//! deterministic fakes live in `nf-testkit`. The dispatchers themselves are
//! generic over these traits and never depend on a concrete transport.

use async_trait::async_trait;

/// One entry discovered in a source's feed, already reduced to the two
/// fields the Store cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEntry {
    pub guid: String,
    pub payload: String,
}

/// Why a `SourceDecoder` could not produce entries for a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderFailure {
    Fetch(String),
    Parse(String),
}

impl std::fmt::Display for DecoderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderFailure::Fetch(msg) => write!(f, "DECODER_FETCH_FAILED: {msg}"),
            DecoderFailure::Parse(msg) => write!(f, "DECODER_PARSE_FAILED: {msg}"),
        }
    }
}

impl std::error::Error for DecoderFailure {}

/// Fetches and parses one source's feed into entries.
///
/// Implementations are opaque beyond this contract: the PollingScheduler
/// does not know or care whether a source is RSS, Atom, or anything else.
#[async_trait]
pub trait SourceDecoder: Send + Sync {
    async fn fetch_entries(&self, source_url: &str) -> Result<Vec<DecodedEntry>, DecoderFailure>;
}

/// Why a `Ranker` could not produce a score for an item.
#[derive(Debug, Clone, PartialEq)]
pub enum RankFailure {
    Http(String),
    Timeout,
    Decode(String),
}

impl std::fmt::Display for RankFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankFailure::Http(msg) => write!(f, "RANK_HTTP_FAILED: {msg}"),
            RankFailure::Timeout => write!(f, "RANK_TIMEOUT"),
            RankFailure::Decode(msg) => write!(f, "RANK_DECODE_FAILED: {msg}"),
        }
    }
}

impl std::error::Error for RankFailure {}

/// One labeled example from the ranker's training set: a previously-scored
/// URL and the score it was given.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub url: String,
    pub score: f64,
}

/// Scores one item's link. The dispatcher extracts the link from the item
/// payload; the ranker only ever sees a URL.
///
/// `training_set` is part of the ranker's protocol (spec §6) but is not
/// called by any dispatcher iteration; it exists at the trait boundary so a
/// future retraining workflow has somewhere to call without widening this
/// trait again.
#[async_trait]
pub trait Ranker: Send + Sync {
    async fn rank_url(&self, link: &str) -> Result<f64, RankFailure>;

    async fn training_set(&self) -> Result<Vec<TrainingExample>, RankFailure>;
}

/// Why a `Publisher` could not deliver a message.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishFailure {
    RateLimited(String),
    Other(String),
}

impl PublishFailure {
    /// Mirrors the substring sniffing the original news-feed service used to
    /// distinguish a rate limit from any other delivery failure.
    pub fn classify(raw_error: &str) -> PublishFailure {
        let lower = raw_error.to_ascii_lowercase();
        if lower.contains("rate limit") || lower.contains("too many") {
            PublishFailure::RateLimited(raw_error.to_string())
        } else {
            PublishFailure::Other(raw_error.to_string())
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PublishFailure::RateLimited(_))
    }
}

impl std::fmt::Display for PublishFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishFailure::RateLimited(msg) => write!(f, "PUBLISH_RATE_LIMITED: {msg}"),
            PublishFailure::Other(msg) => write!(f, "PUBLISH_FAILED: {msg}"),
        }
    }
}

impl std::error::Error for PublishFailure {}

/// Delivers one already-formatted message to the outside world.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, message: &str) -> Result<(), PublishFailure>;
}
