pub mod breaker;
pub mod classifier;
pub mod fanout;
pub mod knowledge_base;

pub use breaker::{CircuitBreaker, CircuitState, GuardedLookup};
pub use fanout::{check_all, pair_key, unordered_pairs, FanOutReport, InteractionFinding, SkippedPair};
pub use knowledge_base::{KnowledgeBaseLookup, KnowledgeBaseSettings};
pub use reqwest::Url;
