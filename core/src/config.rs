//! Index options and their defaults.
//!
//! Options are fixed once an [`Engine`](crate::Engine) is built: the builder
//! validates them and freezes them behind an `Arc` that the word pipeline and
//! the index share. Nothing hands out a mutable reference afterwards.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Token pattern used to split fields into raw words.
///
/// Runs of letters and digits in any script.
pub const DEFAULT_CHARACTERS: &str = r"[\p{L}\p{N}]+";

/// Words shorter than this (in characters) are dropped.
pub const DEFAULT_MIN_WORD_LEN: usize = 2;

/// Words longer than this are truncated.
pub const DEFAULT_MAX_WORD_LEN: usize = 32;

/// Shortest substring registered in the wildcard tier.
pub const DEFAULT_MIN_WILDCARD_WORD_LEN: usize = 3;

/// Substrings must be strictly shorter than this to enter the wildcard tier.
pub const DEFAULT_MAX_WILDCARD_WORD_LEN: usize = 32;

/// Words seen fewer times than this are pruned from the suggestion corpus.
pub const DEFAULT_SUGGESTION_MIN_WORD_COUNT: u32 = 6;

/// Queries with fewer expressions than this get an implicit `+` on every
/// unmodified expression. The default of 1 never applies it.
pub const DEFAULT_OPTIONAL_PLUS_FROM_EXPRESSIONS: usize = 1;

/// Sliding window of raw tokens joined into augmented words. 1 disables it.
pub const DEFAULT_CONCATENATE_WORDS: usize = 1;

/// Options recognised by the engine. Unknown keys are rejected when loading
/// from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexOptions {
    pub characters: String,
    pub case_sensitive: bool,
    pub min_word_len: usize,
    pub max_word_len: usize,
    pub min_wildcard_word_len: usize,
    pub max_wildcard_word_len: usize,
    pub suggestion_min_word_count: u32,
    pub enable_suggestions: bool,
    pub optional_plus_from_expressions: usize,
    pub concatenate_words: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            characters: DEFAULT_CHARACTERS.to_string(),
            case_sensitive: false,
            min_word_len: DEFAULT_MIN_WORD_LEN,
            max_word_len: DEFAULT_MAX_WORD_LEN,
            min_wildcard_word_len: DEFAULT_MIN_WILDCARD_WORD_LEN,
            max_wildcard_word_len: DEFAULT_MAX_WILDCARD_WORD_LEN,
            suggestion_min_word_count: DEFAULT_SUGGESTION_MIN_WORD_COUNT,
            enable_suggestions: false,
            optional_plus_from_expressions: DEFAULT_OPTIONAL_PLUS_FROM_EXPRESSIONS,
            concatenate_words: DEFAULT_CONCATENATE_WORDS,
        }
    }
}

impl IndexOptions {
    /// Every key accepted in a JSON options object.
    pub const KEYS: &'static [&'static str] = &[
        "characters",
        "case_sensitive",
        "min_word_len",
        "max_word_len",
        "min_wildcard_word_len",
        "max_wildcard_word_len",
        "suggestion_min_word_count",
        "enable_suggestions",
        "optional_plus_from_expressions",
        "concatenate_words",
    ];

    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON object. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        Self::from_json_value(value)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        match &value {
            serde_json::Value::Object(map) => {
                if let Some(key) = map.keys().find(|k| !Self::KEYS.contains(&k.as_str())) {
                    return Err(Error::UnknownOption(key.clone()));
                }
            }
            _ => return Err(Error::Config("options must be a JSON object".into())),
        }
        let opts: IndexOptions =
            serde_json::from_value(value).map_err(|e| Error::Config(e.to_string()))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Check option values against each other and compile the token pattern.
    pub fn validate(&self) -> Result<()> {
        if self.min_word_len == 0 {
            return Err(invalid("min_word_len", "must be at least 1"));
        }
        if self.max_word_len < self.min_word_len {
            return Err(invalid("max_word_len", "must not be below min_word_len"));
        }
        if self.min_wildcard_word_len == 0 {
            return Err(invalid("min_wildcard_word_len", "must be at least 1"));
        }
        if self.max_wildcard_word_len < self.min_wildcard_word_len {
            return Err(invalid("max_wildcard_word_len", "must not be below min_wildcard_word_len"));
        }
        if self.concatenate_words == 0 {
            return Err(invalid("concatenate_words", "must be at least 1"));
        }
        self.token_pattern()?;
        Ok(())
    }

    pub(crate) fn token_pattern(&self) -> Result<Regex> {
        Ok(Regex::new(&self.characters)?)
    }
}

fn invalid(name: &'static str, reason: &str) -> Error {
    Error::InvalidOption { name, reason: reason.to_string() }
}
