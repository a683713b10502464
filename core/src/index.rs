use crate::config::IndexOptions;
use crate::distance;
use crate::word::Word;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

pub type DocIndex = u32;
pub type WordIndex = u32;

/// Suggestions at this edit distance or further are not offered.
pub const SUGGESTION_DISTANCE_LIMIT: usize = 5;

/// A metadata value attached to a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<MetaValue>),
}

pub type Metadata = BTreeMap<String, MetaValue>;

impl MetaValue {
    /// False for `Null`, `false`, `0`, NaN and the empty string. Lists are
    /// always truthy, even when empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            MetaValue::Null => false,
            MetaValue::Bool(b) => *b,
            MetaValue::Number(n) => *n != 0.0 && !n.is_nan(),
            MetaValue::Text(s) => !s.is_empty(),
            MetaValue::List(_) => true,
        }
    }

    /// Numeric view used by the property ranker. Booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Number(n) => Some(*n),
            MetaValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MetaValue]> {
        match self {
            MetaValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// True for a list holding `needle`, or for a scalar equal to it.
    pub fn contains(&self, needle: &MetaValue) -> bool {
        match self {
            MetaValue::List(items) => items.iter().any(|v| v == needle),
            other => other == needle,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Null => f.write_str("null"),
            MetaValue::Bool(b) => write!(f, "{b}"),
            MetaValue::Number(n) => write!(f, "{n}"),
            MetaValue::Text(s) => f.write_str(s),
            MetaValue::List(items) => {
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Number(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Number(v as f64)
    }
}

impl From<i32> for MetaValue {
    fn from(v: i32) -> Self {
        MetaValue::Number(f64::from(v))
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Text(v)
    }
}

impl<T: Into<MetaValue>> From<Vec<T>> for MetaValue {
    fn from(v: Vec<T>) -> Self {
        MetaValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for MetaValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => MetaValue::Null,
            Value::Bool(b) => MetaValue::Bool(b),
            Value::Number(n) => n.as_f64().map_or(MetaValue::Null, MetaValue::Number),
            Value::String(s) => MetaValue::Text(s),
            Value::Array(items) => MetaValue::List(items.into_iter().map(Into::into).collect()),
            // nested objects are kept as their JSON text
            Value::Object(map) => MetaValue::Text(Value::Object(map).to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub external_id: String,
    pub metadata: Metadata,
    /// Indexed words per field, augmented words included.
    pub field_word_counts: Vec<u32>,
}

impl Document {
    pub fn field_word_count(&self, field: u32) -> u32 {
        self.field_word_counts.get(field as usize).copied().unwrap_or(0)
    }
}

/// Where and how often a word form occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc: DocIndex,
    pub field: u32,
    pub count: u32,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct WordEntry {
    /// Sorted by (doc, field), one entry per pair.
    postings: Vec<Posting>,
    /// Set once the word's substrings are in the wildcard tier.
    partials_indexed: bool,
}

/// Original words with occurrence counts, in first-seen order.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SuggestionCorpus {
    words: Vec<(String, u32)>,
    positions: HashMap<String, usize>,
}

impl SuggestionCorpus {
    fn bump(&mut self, word: &str) {
        match self.positions.get(word) {
            Some(&pos) => self.words[pos].1 += 1,
            None => {
                self.positions.insert(word.to_string(), self.words.len());
                self.words.push((word.to_string(), 1));
            }
        }
    }

    fn prune(&mut self, min_count: u32) -> usize {
        let before = self.words.len();
        self.words.retain(|(_, count)| *count >= min_count);
        if self.words.len() != before {
            self.positions = self.words.iter().enumerate().map(|(i, (w, _))| (w.clone(), i)).collect();
        }
        before - self.words.len()
    }
}

/// Per-tier postings for one query word.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hits {
    pub exact: Vec<Posting>,
    pub processed: Vec<Posting>,
    pub partial: Vec<Posting>,
}

impl Hits {
    /// True when the word matched on its exact or processed form.
    pub fn is_direct(&self) -> bool {
        !self.exact.is_empty() || !self.processed.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.is_direct() && self.partial.is_empty()
    }
}

/// Documents, posting lists and the exact, processed and wildcard lookup
/// tiers, plus the suggestion corpus.
///
/// Posting lists live in a dense arena addressed by [`WordIndex`]; every tier
/// maps string keys to indexes into it. Everything is append-only.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    #[serde(skip)]
    options: Arc<IndexOptions>,
    documents: Vec<Document>,
    words: Vec<WordEntry>,
    exact: HashMap<String, WordIndex>,
    processed: HashMap<String, Vec<WordIndex>>,
    partial: HashMap<String, Vec<WordIndex>>,
    suggestions: SuggestionCorpus,
}

impl InvertedIndex {
    pub fn new(options: Arc<IndexOptions>) -> Self {
        Self { options, ..Self::default() }
    }

    pub(crate) fn set_options(&mut self, options: Arc<IndexOptions>) {
        self.options = options;
    }

    pub fn populate_document(&mut self, external_id: impl Into<String>, metadata: Metadata) -> DocIndex {
        self.documents.push(Document { external_id: external_id.into(), metadata, field_word_counts: Vec::new() });
        (self.documents.len() - 1) as DocIndex
    }

    /// Record one occurrence of `word` in `(doc, field)` under its
    /// preprocessed form. Panics if `doc` was not returned by
    /// [`populate_document`](Self::populate_document).
    pub fn populate_exact(&mut self, word: &Word, doc: DocIndex, field: u32, track_suggestion: bool) -> WordIndex {
        self.upsert_exact(word, doc, field, track_suggestion).0
    }

    fn upsert_exact(&mut self, word: &Word, doc: DocIndex, field: u32, track_suggestion: bool) -> (WordIndex, bool) {
        let (wi, created) = match self.exact.get(&word.preprocessed) {
            Some(&wi) => (wi, false),
            None => {
                let wi = self.words.len() as WordIndex;
                self.words.push(WordEntry::default());
                self.exact.insert(word.preprocessed.clone(), wi);
                (wi, true)
            }
        };

        let postings = &mut self.words[wi as usize].postings;
        match postings.binary_search_by_key(&(doc, field), |p| (p.doc, p.field)) {
            Ok(pos) => postings[pos].count += 1,
            Err(pos) => postings.insert(pos, Posting { doc, field, count: 1 }),
        }

        let counts = &mut self.documents[doc as usize].field_word_counts;
        if counts.len() <= field as usize {
            counts.resize(field as usize + 1, 0);
        }
        counts[field as usize] += 1;

        if track_suggestion {
            self.suggestions.bump(&word.original);
        }
        (wi, created)
    }

    pub fn populate_processed(&mut self, processed: &str, wi: WordIndex) {
        insert_into_bucket(&mut self.processed, processed, wi);
    }

    pub fn populate_partial(&mut self, substring: &str, wi: WordIndex) {
        insert_into_bucket(&mut self.partial, substring, wi);
    }

    /// Index one occurrence in every tier it belongs to.
    ///
    /// Augmented words go to the exact and processed tiers only and never
    /// enter the suggestion corpus.
    pub fn index_word(&mut self, word: &Word, doc: DocIndex, field: u32, augmented: bool) -> WordIndex {
        let track = !augmented && self.options.enable_suggestions;
        let (wi, created) = self.upsert_exact(word, doc, field, track);
        // the processed form is a function of the preprocessed one
        if created {
            self.populate_processed(&word.processed, wi);
        }
        if !augmented && !self.words[wi as usize].partials_indexed {
            self.words[wi as usize].partials_indexed = true;
            self.populate_partials(word, wi);
        }
        wi
    }

    /// Register every substring of the preprocessed form with a length in
    /// `min_wildcard_word_len..max_wildcard_word_len`, except the word's own
    /// preprocessed and processed forms.
    fn populate_partials(&mut self, word: &Word, wi: WordIndex) {
        let chars: Vec<char> = word.preprocessed.chars().collect();
        let len = chars.len();
        let mut size = self.options.min_wildcard_word_len;
        let mut sub = String::with_capacity(word.preprocessed.len());
        while size <= len && size < self.options.max_wildcard_word_len {
            for start in 0..=(len - size) {
                sub.clear();
                sub.extend(&chars[start..start + size]);
                if sub != word.preprocessed && sub != word.processed {
                    insert_into_bucket(&mut self.partial, &sub, wi);
                }
            }
            size += 1;
        }
    }

    /// Tiered postings for `word`, restricted to documents passing `filter`.
    ///
    /// Within a tier, postings for the same `(doc, field)` are merged with
    /// their counts summed. In exact mode only the exact tier is filled. The
    /// wildcard tier is keyed by the preprocessed form and falls back to the
    /// processed form when that key is unknown.
    pub fn query(&self, word: &Word, exact: bool, filter: Option<&dyn Fn(&Metadata) -> bool>) -> Hits {
        let exact_hits = self.collect_tier(self.exact.get(&word.preprocessed).into_iter().copied(), filter);
        if exact {
            return Hits { exact: exact_hits, ..Hits::default() };
        }
        let processed = self.processed.get(&word.processed).map(Vec::as_slice).unwrap_or(&[]);
        let partial = self
            .partial
            .get(&word.preprocessed)
            .or_else(|| self.partial.get(&word.processed))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Hits {
            exact: exact_hits,
            processed: self.collect_tier(processed.iter().copied(), filter),
            partial: self.collect_tier(partial.iter().copied(), filter),
        }
    }

    fn collect_tier<I>(&self, indexes: I, filter: Option<&dyn Fn(&Metadata) -> bool>) -> Vec<Posting>
    where
        I: Iterator<Item = WordIndex>,
    {
        let mut out: Vec<Posting> = Vec::new();
        let mut seen: HashMap<(DocIndex, u32), usize> = HashMap::new();
        let mut verdicts: HashMap<DocIndex, bool> = HashMap::new();
        for wi in indexes {
            for p in &self.words[wi as usize].postings {
                if let Some(filter) = filter {
                    let keep = *verdicts
                        .entry(p.doc)
                        .or_insert_with(|| filter(&self.documents[p.doc as usize].metadata));
                    if !keep {
                        continue;
                    }
                }
                match seen.entry((p.doc, p.field)) {
                    Entry::Occupied(e) => out[*e.get()].count += p.count,
                    Entry::Vacant(e) => {
                        e.insert(out.len());
                        out.push(*p);
                    }
                }
            }
        }
        out
    }

    /// Nearest corpus word by edit distance, if closer than
    /// [`SUGGESTION_DISTANCE_LIMIT`].
    pub fn find_closest_suggestion(&self, word: &str) -> Option<String> {
        let candidates = self.suggestions.words.iter().map(|(w, _)| w.as_str());
        match distance::closest(word, candidates) {
            Some((w, d)) if d < SUGGESTION_DISTANCE_LIMIT => Some(w.to_string()),
            _ => None,
        }
    }

    /// Drop suggestion words seen fewer than `suggestion_min_word_count`
    /// times. Does nothing while suggestions are disabled. Returns the number
    /// of words dropped.
    pub fn compress(&mut self) -> usize {
        if !self.options.enable_suggestions {
            return 0;
        }
        let pruned = self.suggestions.prune(self.options.suggestion_min_word_count);
        tracing::debug!(pruned, remaining = self.suggestions.words.len(), "compressed suggestion corpus");
        pruned
    }

    /// Check that every stored reference points inside the index, so a
    /// decoded snapshot can be queried without going out of bounds.
    pub(crate) fn check_integrity(&self) -> std::result::Result<(), String> {
        let num_docs = self.documents.len() as u64;
        let num_words = self.words.len() as u64;
        for (wi, entry) in self.words.iter().enumerate() {
            if let Some(p) = entry.postings.iter().find(|p| u64::from(p.doc) >= num_docs) {
                return Err(format!("word {wi} references missing document {}", p.doc));
            }
        }
        let buckets = self.processed.values().chain(self.partial.values()).flatten();
        if let Some(wi) = self.exact.values().chain(buckets).find(|&&wi| u64::from(wi) >= num_words) {
            return Err(format!("lookup references missing word {wi}"));
        }
        let corpus = &self.suggestions;
        if corpus.positions.len() != corpus.words.len()
            || corpus.positions.iter().any(|(w, &pos)| corpus.words.get(pos).map_or(true, |(cw, _)| cw != w))
        {
            return Err("suggestion corpus is inconsistent".into());
        }
        Ok(())
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, doc: DocIndex) -> Option<&Document> {
        self.documents.get(doc as usize)
    }

    pub fn num_docs(&self) -> usize {
        self.documents.len()
    }

    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    pub fn word_index(&self, preprocessed: &str) -> Option<WordIndex> {
        self.exact.get(preprocessed).copied()
    }

    pub fn postings(&self, wi: WordIndex) -> &[Posting] {
        self.words.get(wi as usize).map(|w| w.postings.as_slice()).unwrap_or(&[])
    }

    pub fn suggestion_count(&self, original: &str) -> Option<u32> {
        self.suggestions.positions.get(original).map(|&pos| self.suggestions.words[pos].1)
    }

    pub fn num_suggestions(&self) -> usize {
        self.suggestions.words.len()
    }
}

/// Insert `wi` under `key` keeping the bucket sorted and free of repeats.
fn insert_into_bucket(map: &mut HashMap<String, Vec<WordIndex>>, key: &str, wi: WordIndex) {
    match map.get_mut(key) {
        Some(bucket) => {
            if let Err(pos) = bucket.binary_search(&wi) {
                bucket.insert(pos, wi);
            }
        }
        None => {
            map.insert(key.to_string(), vec![wi]);
        }
    }
}
