//! Word pipeline: turns a raw token into its original, preprocessed and
//! processed forms. Any stage may veto the word.

use crate::config::IndexOptions;
use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Word transform that may veto the word by returning `None`.
pub type WordProcessor = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Whole-field transform applied before tokenizing.
pub type FieldProcessor = Box<dyn Fn(&str) -> String + Send + Sync>;

/// The three forms of a word that survived the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    /// After length and case normalization.
    pub original: String,
    /// After the pre-processors. Keys the exact tier.
    pub preprocessed: String,
    /// After the processors (stemmers, soundex, stopwords). Keys the processed tier.
    pub processed: String,
}

pub struct WordPipeline {
    options: Arc<IndexOptions>,
    tokens: Regex,
    field_processors: Vec<FieldProcessor>,
    pre_processors: Vec<WordProcessor>,
    processors: Vec<WordProcessor>,
}

impl WordPipeline {
    pub fn new(
        options: Arc<IndexOptions>,
        field_processors: Vec<FieldProcessor>,
        pre_processors: Vec<WordProcessor>,
        processors: Vec<WordProcessor>,
    ) -> Result<Self> {
        let tokens = options.token_pattern()?;
        Ok(Self { options, tokens, field_processors, pre_processors, processors })
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Run a raw token through length gate, truncation, case folding,
    /// pre-processors and processors, in that order.
    pub fn process_word(&self, raw: &str) -> Option<Word> {
        let opts = &*self.options;
        let len = raw.chars().count();
        if len == 0 || len < opts.min_word_len {
            return None;
        }
        let mut word = if len > opts.max_word_len {
            raw.chars().take(opts.max_word_len).collect::<String>()
        } else {
            raw.to_string()
        };
        if !opts.case_sensitive {
            word = word.to_lowercase();
        }

        let preprocessed = apply_chain(&self.pre_processors, word.clone())?;
        let processed = apply_chain(&self.processors, preprocessed.clone())?;
        Some(Word { original: word, preprocessed, processed })
    }

    /// Apply every field processor to a raw field.
    pub fn prepare_field(&self, field: &str) -> String {
        let mut out = field.to_string();
        for fp in &self.field_processors {
            if out.is_empty() {
                break;
            }
            out = fp(&out);
        }
        out
    }

    /// Split a prepared field into raw tokens with the configured pattern.
    pub fn tokens<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tokens.find_iter(field).map(|m| m.as_str()).filter(|t| !t.is_empty())
    }
}

fn apply_chain(chain: &[WordProcessor], word: String) -> Option<String> {
    let mut current = word;
    for p in chain {
        current = p(&current).filter(|w| !w.is_empty())?;
    }
    if current.is_empty() {
        None
    } else {
        Some(current)
    }
}

impl fmt::Debug for WordPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordPipeline")
            .field("characters", &self.tokens.as_str())
            .field("field_processors", &self.field_processors.len())
            .field("pre_processors", &self.pre_processors.len())
            .field("processors", &self.processors.len())
            .finish()
    }
}
