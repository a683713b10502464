//! The search engine: a frozen configuration, the word pipeline, the index
//! and a ranker, plus the feed and find entry points.

use crate::config::IndexOptions;
use crate::error::Result;
use crate::index::{DocIndex, InvertedIndex, MetaValue, Metadata};
use crate::persist;
use crate::query::{self, Expression};
use crate::ranker::{PropertyRanker, Ranker, StandardRanker, Tier};
use crate::word::{FieldProcessor, WordPipeline, WordProcessor};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A document to index. Fields are addressed by position; an empty field is
/// skipped but keeps its index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDocument {
    pub id: String,
    pub metadata: Metadata,
    pub fields: Vec<String>,
}

impl FeedDocument {
    pub fn new<I, S>(id: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { id: id.into(), metadata: Metadata::new(), fields: fields.into_iter().map(Into::into).collect() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum SortBy {
    #[default]
    Weight,
    /// Rank by a numeric metadata property.
    Property(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Direction {
    #[default]
    Descending,
    Ascending,
}

pub type Predicate<'a> = Box<dyn Fn(&Metadata) -> bool + 'a>;

/// Parameters of a [`Engine::find`] call. Built from a plain expression with
/// `From`, then refined with the builder methods.
#[derive(Default)]
pub struct FindParams<'a> {
    pub expression: String,
    /// Applied to postings before ranking.
    pub filter: Option<Predicate<'a>>,
    /// Applied to ranked documents after `collect_all` is counted.
    pub reduce: Option<Predicate<'a>>,
    /// Metadata keys counted over the reduced documents.
    pub collect: Vec<String>,
    /// Metadata keys counted over the filtered documents.
    pub collect_all: Vec<String>,
    pub sort_by: SortBy,
    pub direction: Direction,
    pub limit: Option<usize>,
}

impl<'a> FindParams<'a> {
    pub fn new(expression: impl Into<String>) -> Self {
        Self { expression: expression.into(), ..Self::default() }
    }

    pub fn filter(mut self, f: impl Fn(&Metadata) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(f));
        self
    }

    pub fn reduce(mut self, f: impl Fn(&Metadata) -> bool + 'a) -> Self {
        self.reduce = Some(Box::new(f));
        self
    }

    pub fn collect<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collect = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn collect_all<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collect_all = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl<'a> From<&str> for FindParams<'a> {
    fn from(expression: &str) -> Self {
        Self::new(expression)
    }
}

impl<'a> From<String> for FindParams<'a> {
    fn from(expression: String) -> Self {
        Self::new(expression)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultDocument {
    pub id: String,
    pub doc: DocIndex,
    pub weight: f64,
    pub expressions: Vec<Option<Tier>>,
    pub metadata: Metadata,
}

/// Value counts per collected metadata key, keyed by the value's display
/// form. List values count each element.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Collections {
    pub filtered: BTreeMap<String, BTreeMap<String, usize>>,
    pub reduced: BTreeMap<String, BTreeMap<String, usize>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Performance {
    pub find: Duration,
    pub rank: Duration,
    pub filter: Duration,
    pub sort: Duration,
    pub total: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultSet {
    pub expressions: Vec<Expression>,
    pub documents: Vec<ResultDocument>,
    /// Ranked documents before reduce and limit.
    pub total_hits: usize,
    pub returned_hits: usize,
    pub collections: Collections,
    pub performance: Performance,
}

/// Collects options, processors and a ranker, then freezes them into an
/// [`Engine`].
pub struct EngineBuilder {
    options: IndexOptions,
    field_processors: Vec<FieldProcessor>,
    pre_processors: Vec<WordProcessor>,
    processors: Vec<WordProcessor>,
    ranker: Option<Box<dyn Ranker>>,
}

impl EngineBuilder {
    pub fn new(options: IndexOptions) -> Self {
        Self {
            options,
            field_processors: Vec::new(),
            pre_processors: Vec::new(),
            processors: Vec::new(),
            ranker: None,
        }
    }

    pub fn add_field_processor(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.field_processors.push(Box::new(f));
        self
    }

    /// Pre-processors shape the preprocessed form, which keys exact matches.
    pub fn add_word_preprocessor(mut self, f: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.pre_processors.push(Box::new(f));
        self
    }

    /// Processors shape the processed form, which keys stemmed matches.
    pub fn add_word_processor(mut self, f: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.processors.push(Box::new(f));
        self
    }

    pub fn ranker(mut self, ranker: impl Ranker + 'static) -> Self {
        self.ranker = Some(Box::new(ranker));
        self
    }

    pub fn build(self) -> Result<Engine> {
        self.options.validate()?;
        let options = Arc::new(self.options);
        let pipeline = WordPipeline::new(options.clone(), self.field_processors, self.pre_processors, self.processors)?;
        Ok(Engine {
            index: InvertedIndex::new(options.clone()),
            options,
            pipeline,
            ranker: self.ranker.unwrap_or_else(|| Box::new(StandardRanker::default())),
        })
    }
}

pub struct Engine {
    options: Arc<IndexOptions>,
    pipeline: WordPipeline,
    index: InvertedIndex,
    ranker: Box<dyn Ranker>,
}

impl Engine {
    /// An engine with no processors and the standard ranker.
    pub fn new(options: IndexOptions) -> Result<Self> {
        EngineBuilder::new(options).build()
    }

    pub fn builder(options: IndexOptions) -> EngineBuilder {
        EngineBuilder::new(options)
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn pipeline(&self) -> &WordPipeline {
        &self.pipeline
    }

    pub fn document_count(&self) -> usize {
        self.index.num_docs()
    }

    /// Index `documents`, then prune the suggestion corpus. Returns the number
    /// of documents indexed.
    pub fn feed<I>(&mut self, documents: I) -> usize
    where
        I: IntoIterator<Item = FeedDocument>,
    {
        let n = self.append(documents);
        self.index.compress();
        n
    }

    /// Index `documents` without pruning the suggestion corpus. Call
    /// [`compress`](Self::compress) after the last batch.
    pub fn append<I>(&mut self, documents: I) -> usize
    where
        I: IntoIterator<Item = FeedDocument>,
    {
        let start = Instant::now();
        let mut n = 0;
        for doc in documents {
            self.index_document(doc);
            n += 1;
        }
        tracing::info!(
            documents = n,
            total_documents = self.index.num_docs(),
            words = self.index.num_words(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "indexed documents"
        );
        n
    }

    pub fn compress(&mut self) -> usize {
        self.index.compress()
    }

    fn index_document(&mut self, doc: FeedDocument) {
        let FeedDocument { id, metadata, fields } = doc;
        let doc_index = self.index.populate_document(id, metadata);
        let window = self.options.concatenate_words;

        for (field_index, field) in fields.iter().enumerate() {
            if field.is_empty() {
                continue;
            }
            let field_index = field_index as u32;
            let prepared = self.pipeline.prepare_field(field);
            let mut history: VecDeque<&str> = VecDeque::with_capacity(window);

            for raw in self.pipeline.tokens(&prepared) {
                if let Some(word) = self.pipeline.process_word(raw) {
                    self.index.index_word(&word, doc_index, field_index, false);
                }
                if window < 2 {
                    continue;
                }
                // every suffix of the window, joined, as an augmented word
                history.push_back(raw);
                if history.len() > 1 {
                    for start in 0..history.len() - 1 {
                        let joined: String = history.range(start..).copied().collect();
                        if let Some(word) = self.pipeline.process_word(&joined) {
                            self.index.index_word(&word, doc_index, field_index, true);
                        }
                    }
                    if history.len() >= window {
                        history.pop_front();
                    }
                }
            }
        }
    }

    pub fn find<'a>(&self, params: impl Into<FindParams<'a>>) -> ResultSet {
        let params = params.into();
        let started = Instant::now();

        let expressions = query::resolve(&params.expression, &self.pipeline, &self.index, params.filter.as_deref());
        let find = started.elapsed();

        let rank_started = Instant::now();
        let ranked = match &params.sort_by {
            SortBy::Weight => self.ranker.rank(&expressions, self.index.documents()),
            SortBy::Property(key) => PropertyRanker::new(key.clone()).rank(&expressions, self.index.documents()),
        };
        let rank = rank_started.elapsed();

        let filter_started = Instant::now();
        let total_hits = ranked.len();
        let mut documents: Vec<ResultDocument> = ranked
            .into_iter()
            .filter_map(|r| {
                let doc = self.index.document(r.doc)?;
                Some(ResultDocument {
                    id: doc.external_id.clone(),
                    doc: r.doc,
                    weight: r.weight,
                    expressions: r.expressions,
                    metadata: doc.metadata.clone(),
                })
            })
            .collect();

        let mut collections = Collections::default();
        count_values(&mut collections.filtered, &params.collect_all, &documents);
        if let Some(reduce) = &params.reduce {
            documents.retain(|d| reduce(&d.metadata));
        }
        count_values(&mut collections.reduced, &params.collect, &documents);

        let sort_started = Instant::now();
        match params.direction {
            Direction::Descending => documents.sort_by(|a, b| b.weight.total_cmp(&a.weight)),
            Direction::Ascending => documents.sort_by(|a, b| a.weight.total_cmp(&b.weight)),
        }
        let sort = sort_started.elapsed();

        if let Some(limit) = params.limit {
            documents.truncate(limit);
        }
        let returned_hits = documents.len();
        let filter = filter_started.elapsed();
        let total = started.elapsed();

        tracing::debug!(
            expression = %params.expression,
            expressions = expressions.len(),
            total_hits,
            returned_hits,
            elapsed_us = total.as_micros() as u64,
            "find"
        );

        ResultSet {
            expressions,
            documents,
            total_hits,
            returned_hits,
            collections,
            performance: Performance { find, rank, filter, sort, total },
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        persist::encode(&self.index)
    }

    /// Replace the index with a decoded snapshot. On error the current index
    /// is left untouched.
    #[allow(clippy::wrong_self_convention)]
    pub fn from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let (header, mut index) = persist::decode(bytes)?;
        index.set_options(self.options.clone());
        self.index = index;
        tracing::info!(num_docs = header.num_docs, created_at = %header.created_at, bytes = bytes.len(), "restored index snapshot");
        Ok(())
    }

    pub fn to_disk<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        persist::write_snapshot(path, &bytes)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "saved index snapshot");
        Ok(())
    }

    #[allow(clippy::wrong_self_convention)]
    pub fn from_disk<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = persist::read_snapshot(path.as_ref())?;
        self.from_bytes(&bytes)
    }
}

fn count_values(into: &mut BTreeMap<String, BTreeMap<String, usize>>, keys: &[String], documents: &[ResultDocument]) {
    for key in keys {
        let counts = into.entry(key.clone()).or_default();
        for doc in documents {
            match doc.metadata.get(key) {
                None => {}
                Some(value) if !value.is_truthy() => {}
                Some(MetaValue::List(items)) => {
                    for item in items {
                        *counts.entry(item.to_string()).or_insert(0) += 1;
                    }
                }
                Some(value) => *counts.entry(value.to_string()).or_insert(0) += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(opts: IndexOptions) -> Engine {
        Engine::new(opts).unwrap()
    }

    #[test]
    fn build_rejects_invalid_options() {
        let opts = IndexOptions { concatenate_words: 0, ..Default::default() };
        assert!(Engine::new(opts).is_err());
    }

    #[test]
    fn identical_fields_make_independent_documents() {
        let mut e = engine(IndexOptions::default());
        e.feed(vec![FeedDocument::new("a", ["same text here"]), FeedDocument::new("b", ["same text here"])]);
        let docs = e.index().documents();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].field_word_counts, docs[1].field_word_counts);
        assert_ne!(docs[0].external_id, docs[1].external_id);
    }

    #[test]
    fn empty_fields_keep_their_position() {
        let mut e = engine(IndexOptions::default());
        e.feed(vec![FeedDocument::new("a", ["", "second field"])]);
        assert_eq!(e.index().documents()[0].field_word_counts, vec![0, 2]);
        let result = e.find("second");
        assert_eq!(result.documents.len(), 1);
        assert_eq!(e.index().postings(e.index().word_index("second").unwrap())[0].field, 1);
    }

    #[test]
    fn zero_expressions_is_an_empty_result() {
        let mut e = engine(IndexOptions::default());
        e.feed(vec![FeedDocument::new("a", ["some text"])]);
        for q in ["", "   ", "a", "+ -"] {
            let r = e.find(q);
            assert!(r.expressions.is_empty(), "{q:?}");
            assert!(r.documents.is_empty());
            assert_eq!(r.total_hits, 0);
        }
    }

    #[test]
    fn direction_and_limit() {
        let mut e = engine(IndexOptions::default());
        e.feed(vec![FeedDocument::new("slow", ["rust"]), FeedDocument::new("quick", ["rust fast"])]);
        let ids = |r: &ResultSet| r.documents.iter().map(|d| d.id.clone()).collect::<Vec<_>>();

        let desc = e.find("rust fast");
        assert_eq!(ids(&desc), vec!["quick", "slow"]);
        assert_eq!(desc.documents[0].weight, 3.0);

        let asc = e.find(FindParams::new("rust fast").direction(Direction::Ascending).limit(1));
        assert_eq!(asc.total_hits, 2);
        assert_eq!(asc.returned_hits, 1);
        assert_eq!(ids(&asc), vec!["slow"]);

        let none = e.find(FindParams::new("rust").limit(0));
        assert_eq!(none.total_hits, 2);
        assert_eq!(none.returned_hits, 0);
        assert!(none.documents.is_empty());
    }

    #[test]
    fn concatenated_window_is_bounded() {
        let opts = IndexOptions { concatenate_words: 2, ..Default::default() };
        let mut e = engine(opts);
        e.feed(vec![FeedDocument::new("a", ["fot boll plan"])]);
        assert!(e.index().word_index("fotboll").is_some());
        assert!(e.index().word_index("bollplan").is_some());
        assert!(e.index().word_index("fotbollplan").is_none());
    }

    #[test]
    fn collections_count_list_elements() {
        let mut e = engine(IndexOptions::default());
        e.feed(vec![
            FeedDocument::new("a", ["text"]).with_metadata("tags", vec!["x", "y"]),
            FeedDocument::new("b", ["text"]).with_metadata("tags", vec!["y"]),
            FeedDocument::new("c", ["text"]),
        ]);
        let r = e.find(FindParams::new("text").collect_all(["tags"]).collect(["tags"]).reduce(|m| {
            m.get("tags").map_or(false, |t| t.contains(&"x".into()))
        }));
        assert_eq!(r.collections.filtered["tags"], BTreeMap::from([("x".to_string(), 1), ("y".to_string(), 2)]));
        assert_eq!(r.collections.reduced["tags"], BTreeMap::from([("x".to_string(), 1), ("y".to_string(), 1)]));
        assert_eq!(r.total_hits, 3);
        assert_eq!(r.returned_hits, 1);
    }

    #[test]
    fn collections_skip_falsy_values() {
        let mut e = engine(IndexOptions::default());
        e.feed(vec![
            FeedDocument::new("a", ["text"]).with_metadata("n", 2).with_metadata("s", "x").with_metadata("f", true),
            FeedDocument::new("b", ["text"]).with_metadata("n", 0).with_metadata("s", "").with_metadata("f", false),
        ]);
        let r = e.find(FindParams::new("text").collect_all(["n", "s", "f"]));
        let one = |k: &str| BTreeMap::from([(k.to_string(), 1)]);
        assert_eq!(r.collections.filtered["n"], one("2"));
        assert_eq!(r.collections.filtered["s"], one("x"));
        assert_eq!(r.collections.filtered["f"], one("true"));
    }
}
