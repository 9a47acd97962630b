//! The three pipeline dispatchers (polling, scoring, publishing) and the
//! trait boundary they use to talk to the outside world.

pub mod message;
pub mod rss;
pub mod traits;
pub mod workers;

pub use traits::{
    DecodedEntry, DecoderFailure, PublishFailure, Publisher, RankFailure, Ranker, SourceDecoder,
    TrainingExample,
};
pub use workers::{decode_feed_bytes, poll_once, publish_once, score_once, PollOutcome, PublishOutcome, ScoreOutcome};
