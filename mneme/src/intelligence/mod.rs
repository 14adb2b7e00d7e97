pub mod dedup;
pub mod facts;
pub mod intent;
pub mod scorer;
pub mod utils;

pub use dedup::Deduplicator;
pub use facts::FactExtractor;
pub use intent::{classify, Intent};
pub use scorer::{decode_score, ImportanceScorer, MemoryScore, ScoreDecodeError, ScoreError};
