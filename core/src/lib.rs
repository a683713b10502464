//! In-memory full-text index with exact, stemmed and wildcard tiers, a tiered
//! ranker and edit-distance suggestions.

pub mod config;
pub mod distance;
pub mod engine;
pub mod error;
pub mod index;
pub mod persist;
pub mod processors;
pub mod query;
pub mod ranker;
pub mod word;

pub use config::IndexOptions;
pub use engine::{
    Collections, Direction, Engine, EngineBuilder, FeedDocument, FindParams, Performance,
    ResultDocument, ResultSet, SortBy,
};
pub use error::{Error, Result};
pub use index::{DocIndex, Document, Hits, InvertedIndex, MetaValue, Metadata, Posting, WordIndex};
pub use query::{Expression, Modifier};
pub use ranker::{FieldOptions, PropertyRanker, RankedDocument, Ranker, RankerOptions, StandardRanker, Tier};
pub use word::{FieldProcessor, Word, WordPipeline, WordProcessor};
