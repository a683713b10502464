//! Query expression parsing and resolution against the index.

use crate::index::{Hits, InvertedIndex, Metadata};
use crate::word::{Word, WordPipeline};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref LOOSE_DASH: Regex = Regex::new(r"-\s+").expect("valid regex");
    static ref JOINING_DASH: Regex = Regex::new(r"(\S)-").expect("valid regex");
    static ref SPACES: Regex = Regex::new(r"\s+").expect("valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Modifier {
    /// `+word`: documents must match.
    Include,
    /// `-word`: documents must not match.
    Exclude,
}

/// One surviving query word with its tiered hits.
#[derive(Debug, Clone, Serialize)]
pub struct Expression {
    /// The token with modifier and quotes removed.
    pub original: String,
    pub interpretation: Word,
    pub modifier: Option<Modifier>,
    pub exact_mode: bool,
    #[serde(skip)]
    pub hits: Hits,
    pub suggestion: Option<String>,
}

/// A raw query token before it goes through the word pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub modifier: Option<Modifier>,
    pub exact_mode: bool,
}

/// Collapse dash artifacts and whitespace, then split into tokens.
pub fn normalize(expression: &str) -> Vec<String> {
    let s = LOOSE_DASH.replace_all(expression, " ");
    let s = JOINING_DASH.replace_all(&s, "$1");
    let s = SPACES.replace_all(&s, " ");
    s.trim().split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect()
}

/// Split an expression into tokens carrying their modifier and exact flag.
///
/// Tokens without an explicit modifier get [`Modifier::Include`] when the
/// expression has fewer than `optional_plus_from` tokens.
pub fn parse(expression: &str, optional_plus_from: usize) -> Vec<Token> {
    let words = normalize(expression);
    let implicit_plus = words.len() < optional_plus_from;
    words
        .into_iter()
        .map(|word| {
            let (modifier, rest) = match word.chars().next() {
                Some('+') => (Some(Modifier::Include), &word[1..]),
                Some('-') => (Some(Modifier::Exclude), &word[1..]),
                _ => (implicit_plus.then_some(Modifier::Include), word.as_str()),
            };
            let exact_mode = rest.starts_with('"') || rest.ends_with('"');
            Token { text: rest.replace('"', ""), modifier, exact_mode }
        })
        .collect()
}

/// Turn an expression into resolved [`Expression`]s. Tokens vetoed by the
/// pipeline are dropped silently.
pub fn resolve(
    expression: &str,
    pipeline: &WordPipeline,
    index: &InvertedIndex,
    filter: Option<&dyn Fn(&Metadata) -> bool>,
) -> Vec<Expression> {
    let opts = pipeline.options();
    parse(expression, opts.optional_plus_from_expressions)
        .into_iter()
        .filter_map(|token| {
            let word = pipeline.process_word(&token.text)?;
            let hits = index.query(&word, token.exact_mode, filter);
            let suggestion = if opts.enable_suggestions && !hits.is_direct() {
                index.find_closest_suggestion(&word.original)
            } else {
                None
            };
            Some(Expression {
                original: token.text,
                interpretation: word,
                modifier: token.modifier,
                exact_mode: token.exact_mode,
                hits,
                suggestion,
            })
        })
        .collect()
}
