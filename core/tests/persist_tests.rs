use tempfile::tempdir;
use tiersearch::{Engine, Error, FeedDocument, IndexOptions, Tier};

fn options() -> IndexOptions {
    IndexOptions { enable_suggestions: true, suggestion_min_word_count: 1, concatenate_words: 2, ..Default::default() }
}

fn docs() -> Vec<FeedDocument> {
    vec![
        FeedDocument::new("first", ["Artikel nummer noll", "Anders är ett namn, likaså Stavros"]).with_metadata("rank", 2),
        FeedDocument::new("second", ["Bemötande testtitel", "Brödtext nummer ett olle lars sven"]).with_metadata("rank", 1),
        FeedDocument::new("third", ["Titeln med extra", "artikeln artikeln Andersson nyheter"]).with_metadata("rank", 3),
    ]
}

type Summary = Vec<(String, f64, Vec<Option<Tier>>)>;

fn battery(engine: &Engine) -> Vec<(Summary, Vec<Option<String>>)> {
    ["artikel", "anders namn", "olle +lars -sven", "emöt", "\"artikeln\"", "liaså", "nummerett", "texttitel"]
        .iter()
        .map(|q| {
            let r = engine.find(*q);
            let docs = r.documents.iter().map(|d| (d.id.clone(), d.weight, d.expressions.clone())).collect();
            let suggestions = r.expressions.iter().map(|e| e.suggestion.clone()).collect();
            (docs, suggestions)
        })
        .collect()
}

#[test]
fn snapshot_round_trip_preserves_results() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshots").join("index.bin");

    let mut original = Engine::new(options()).unwrap();
    original.feed(docs());
    original.to_disk(&path).unwrap();
    assert!(path.exists());
    assert!(!dir.path().join("snapshots").join("index.bin.tmp").exists());

    let mut restored = Engine::new(options()).unwrap();
    restored.from_disk(&path).unwrap();

    assert_eq!(restored.document_count(), 3);
    assert_eq!(battery(&original), battery(&restored));
    assert_eq!(restored.index().documents()[2].metadata, original.index().documents()[2].metadata);
}

#[test]
fn failed_restore_leaves_index_untouched() {
    let mut source = Engine::new(options()).unwrap();
    source.feed(docs());
    let bytes = source.to_bytes().unwrap();

    let mut target = Engine::new(options()).unwrap();
    target.feed(vec![FeedDocument::new("only", ["olle lars"])]);
    let before = battery(&target);

    assert!(matches!(target.from_bytes(&bytes[..bytes.len() - 7]), Err(Error::Decode(_))));
    assert!(matches!(target.from_bytes(b"not a snapshot"), Err(_)));
    assert_eq!(target.document_count(), 1);
    assert_eq!(battery(&target), before);

    target.from_bytes(&bytes).unwrap();
    assert_eq!(target.document_count(), 3);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let mut engine = Engine::new(options()).unwrap();
    assert!(matches!(engine.from_disk(dir.path().join("absent.bin")), Err(Error::Io(_))));
}

#[test]
fn restored_index_keeps_growing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.bin");
    let mut original = Engine::new(options()).unwrap();
    original.feed(docs());
    original.to_disk(&path).unwrap();

    let mut restored = Engine::new(options()).unwrap();
    restored.from_disk(&path).unwrap();
    restored.feed(vec![FeedDocument::new("fourth", ["olle igen"])]);
    let r = restored.find("olle");
    assert_eq!(r.documents.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["second", "fourth"]);
}
