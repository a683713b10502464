//! Scoring of resolved expressions against documents.

use crate::index::{DocIndex, Document, Posting};
use crate::query::{Expression, Modifier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which tier an expression matched a document on. Higher tiers take
/// precedence: once a document is matched for an expression, lower tiers of
/// the same expression are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Partial = 1,
    Processed = 2,
    Exact = 3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedDocument {
    pub doc: DocIndex,
    pub weight: f64,
    /// One slot per expression, `None` where the expression did not match.
    pub expressions: Vec<Option<Tier>>,
}

pub trait Ranker: Send + Sync {
    /// Score and filter the documents matched by `expressions`. The output
    /// order is unspecified; the caller sorts.
    fn rank(&self, expressions: &[Expression], documents: &[Document]) -> Vec<RankedDocument>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOptions {
    pub weight: f64,
    /// Scale the weight up with the share of the field the match covers.
    pub boost_percentage: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self { weight: 1.0, boost_percentage: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerOptions {
    pub exact_weight: f64,
    pub processed_weight: f64,
    pub partial_weight: f64,
    /// Keyed by field index. Fields not listed use [`FieldOptions::default`].
    pub fields: HashMap<u32, FieldOptions>,
    pub minimum_weight: f64,
    pub boost_factor: f64,
}

impl Default for RankerOptions {
    fn default() -> Self {
        Self {
            exact_weight: 1.5,
            processed_weight: 1.0,
            partial_weight: 0.5,
            fields: HashMap::new(),
            minimum_weight: 0.0,
            boost_factor: 2.8,
        }
    }
}

impl RankerOptions {
    pub fn field(mut self, index: u32, weight: f64, boost_percentage: bool) -> Self {
        self.fields.insert(index, FieldOptions { weight, boost_percentage });
        self
    }

    fn tier_weight(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Exact => self.exact_weight,
            Tier::Processed => self.processed_weight,
            Tier::Partial => self.partial_weight,
        }
    }
}

/// Relevance ranking: tier weight times field weight, summed over
/// expressions.
#[derive(Debug, Clone, Default)]
pub struct StandardRanker {
    options: RankerOptions,
}

impl StandardRanker {
    pub fn new(options: RankerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RankerOptions {
        &self.options
    }
}

impl Ranker for StandardRanker {
    fn rank(&self, expressions: &[Expression], documents: &[Document]) -> Vec<RankedDocument> {
        let default_field = FieldOptions::default();
        let opts = &self.options;
        let ranked = accumulate(expressions, |p, tier| {
            let field = opts.fields.get(&p.field).unwrap_or(&default_field);
            let mut weight = opts.tier_weight(tier) * field.weight;
            if field.boost_percentage {
                let total = documents.get(p.doc as usize).map_or(0, |d| d.field_word_count(p.field));
                if total > 0 {
                    weight *= 1.0 + opts.boost_factor * (f64::from(p.count) / f64::from(total));
                }
            }
            weight
        });
        retain_matching(ranked, expressions, Some(opts.minimum_weight))
    }
}

/// Ranks by a numeric metadata property instead of relevance. Each matched
/// expression adds the property value once; documents without it score 0.
#[derive(Debug, Clone)]
pub struct PropertyRanker {
    key: String,
}

impl PropertyRanker {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Ranker for PropertyRanker {
    fn rank(&self, expressions: &[Expression], documents: &[Document]) -> Vec<RankedDocument> {
        let ranked = accumulate(expressions, |p, _| {
            documents
                .get(p.doc as usize)
                .and_then(|d| d.metadata.get(&self.key))
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0)
        });
        retain_matching(ranked, expressions, None)
    }
}

/// Walk every expression's tiers from exact down, crediting each document
/// once per expression: the first posting to reach it sets the tier and the
/// weight. Documents keep first-encounter order.
fn accumulate<F>(expressions: &[Expression], mut weigh: F) -> Vec<RankedDocument>
where
    F: FnMut(&Posting, Tier) -> f64,
{
    let mut ranked: Vec<RankedDocument> = Vec::new();
    let mut lookup: HashMap<DocIndex, usize> = HashMap::new();
    for (slot, expr) in expressions.iter().enumerate() {
        let tiers = [
            (Tier::Exact, &expr.hits.exact),
            (Tier::Processed, &expr.hits.processed),
            (Tier::Partial, &expr.hits.partial),
        ];
        for (tier, postings) in tiers {
            for p in postings {
                let pos = *lookup.entry(p.doc).or_insert_with(|| {
                    ranked.push(RankedDocument {
                        doc: p.doc,
                        weight: 0.0,
                        expressions: vec![None; expressions.len()],
                    });
                    ranked.len() - 1
                });
                let entry = &mut ranked[pos];
                if entry.expressions[slot].is_none() {
                    entry.weight += weigh(p, tier);
                    entry.expressions[slot] = Some(tier);
                }
            }
        }
    }
    ranked
}

fn retain_matching(
    mut ranked: Vec<RankedDocument>,
    expressions: &[Expression],
    minimum_weight: Option<f64>,
) -> Vec<RankedDocument> {
    ranked.retain(|doc| {
        if minimum_weight.map_or(false, |min| doc.weight < min) {
            return false;
        }
        expressions.iter().zip(&doc.expressions).all(|(expr, tier)| match expr.modifier {
            Some(Modifier::Exclude) => tier.is_none(),
            Some(Modifier::Include) => tier.is_some(),
            None => true,
        })
    });
    ranked
}
