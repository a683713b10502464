use tiersearch::processors::{self, Algorithm};
use tiersearch::{Engine, EngineBuilder, FeedDocument, IndexOptions, Tier};

fn english() -> Engine {
    EngineBuilder::new(IndexOptions::default())
        .add_field_processor(processors::normalize_unicode())
        .add_word_processor(processors::english_stopwords())
        .add_word_processor(processors::stemmer(Algorithm::English, Vec::<String>::new()))
        .build()
        .unwrap()
}

#[test]
fn it_normalizes_and_stems() {
    let engine = english();
    let word = engine.pipeline().process_word("Running").unwrap();
    assert_eq!(word.original, "running");
    assert_eq!(word.preprocessed, "running");
    assert_eq!(word.processed, "run");
    assert_eq!(engine.pipeline().prepare_field("ﬁne print"), "fine print");
}

#[test]
fn it_filters_stopwords() {
    let engine = english();
    assert!(engine.pipeline().process_word("The").is_none());
    assert!(engine.pipeline().process_word("and").is_none());
    assert!(engine.find("the and").expressions.is_empty());
}

#[test]
fn stems_match_across_documents() {
    let mut engine = english();
    engine.feed(vec![
        FeedDocument::new("a", ["The runners were running"]),
        FeedDocument::new("b", ["A runner ran"]),
    ]);
    let result = engine.find("runs");
    assert_eq!(result.expressions[0].interpretation.processed, "run");
    assert_eq!(result.documents.len(), 1);
    assert_eq!(result.documents[0].id, "a");
    assert_eq!(result.documents[0].expressions, vec![Some(Tier::Processed)]);
}
