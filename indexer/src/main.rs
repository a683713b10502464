use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tiersearch::processors::{self, Algorithm};
use tiersearch::{
    Direction, Engine, EngineBuilder, FeedDocument, FindParams, IndexOptions, MetaValue, Metadata, RankerOptions,
    SortBy, StandardRanker,
};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    /// Explicit field list; takes the place of title and body when present.
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    meta: Option<serde_json::Value>,
}

impl From<InputDoc> for FeedDocument {
    fn from(doc: InputDoc) -> Self {
        let fields = if doc.fields.is_empty() {
            vec![doc.title.unwrap_or_default(), doc.body.unwrap_or_default()]
        } else {
            doc.fields
        };
        let mut metadata = Metadata::new();
        match doc.meta {
            Some(serde_json::Value::Object(map)) => {
                metadata.extend(map.into_iter().map(|(k, v)| (k, MetaValue::from(v))));
            }
            Some(other) => {
                metadata.insert("meta".into(), other.into());
            }
            None => {}
        }
        if let Some(url) = doc.url {
            metadata.insert("url".into(), url.into());
        }
        FeedDocument { id: doc.id, metadata, fields }
    }
}

/// Everything a search needs to rebuild the engine the index was built
/// with. Processors are not part of the snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct Settings {
    options: IndexOptions,
    #[serde(default)]
    stemmer: Option<String>,
    #[serde(default)]
    stopwords: bool,
    #[serde(default)]
    strip_html: bool,
    #[serde(default)]
    ranker: RankerOptions,
}

struct IndexPaths {
    root: PathBuf,
}

impl IndexPaths {
    fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn snapshot(&self) -> PathBuf {
        self.root.join("index.bin")
    }
    fn settings(&self) -> PathBuf {
        self.root.join("settings.json")
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a tiered full-text index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// JSON file with index options
        #[arg(long)]
        config: Option<String>,
        /// JSON file with ranker options
        #[arg(long)]
        ranker: Option<String>,
        /// Snowball stemmer language, e.g. english or swedish
        #[arg(long)]
        stemmer: Option<String>,
        /// Drop common English stopwords
        #[arg(long, default_value_t = false)]
        stopwords: bool,
        /// Strip HTML markup from fields before tokenizing
        #[arg(long, default_value_t = false)]
        strip_html: bool,
    },
    /// Run a query against a built index
    Search {
        /// Index directory written by `build`
        #[arg(long)]
        index: String,
        /// Query expression, e.g. "olle +lars -sven"
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Rank by this numeric metadata key instead of relevance
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long, default_value_t = false)]
        ascending: bool,
        /// Print the whole result set as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config, ranker, stemmer, stopwords, strip_html } => {
            let options = match config {
                Some(path) => IndexOptions::from_json_file(&path).with_context(|| format!("loading {path}"))?,
                None => IndexOptions::default(),
            };
            let ranker = match ranker {
                Some(path) => serde_json::from_str(&fs::read_to_string(&path)?).with_context(|| format!("parsing {path}"))?,
                None => RankerOptions::default(),
            };
            let settings = Settings { options, stemmer, stopwords, strip_html, ranker };
            build_index(&input, &output, settings)
        }
        Commands::Search { index, query, limit, sort_by, ascending, json } => {
            search_index(&index, &query, limit, sort_by, ascending, json)
        }
    }
}

fn stemmer_algorithm(name: &str) -> Result<Algorithm> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "danish" => Algorithm::Danish,
        "dutch" => Algorithm::Dutch,
        "english" => Algorithm::English,
        "finnish" => Algorithm::Finnish,
        "french" => Algorithm::French,
        "german" => Algorithm::German,
        "italian" => Algorithm::Italian,
        "norwegian" => Algorithm::Norwegian,
        "portuguese" => Algorithm::Portuguese,
        "russian" => Algorithm::Russian,
        "spanish" => Algorithm::Spanish,
        "swedish" => Algorithm::Swedish,
        other => bail!("unknown stemmer '{other}'"),
    })
}

fn engine_for(settings: &Settings) -> Result<Engine> {
    let mut builder = EngineBuilder::new(settings.options.clone()).ranker(StandardRanker::new(settings.ranker.clone()));
    if settings.strip_html {
        builder = builder.add_field_processor(processors::strip_html());
    }
    if settings.stopwords {
        builder = builder.add_word_processor(processors::english_stopwords());
    }
    if let Some(name) = &settings.stemmer {
        builder = builder.add_word_processor(processors::stemmer(stemmer_algorithm(name)?, Vec::<String>::new()));
    }
    Ok(builder.build()?)
}

fn collect_inputs(input_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    files
}

fn build_index(input: &str, output: &str, settings: Settings) -> Result<()> {
    let out_paths = IndexPaths::new(output);
    fs::create_dir_all(&out_paths.root)?;
    let mut engine = engine_for(&settings)?;

    for file in collect_inputs(Path::new(input)) {
        let docs = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file)?
        } else {
            read_json(&file)?
        };
        tracing::debug!(file = %file.display(), docs = docs.len(), "read input file");
        engine.append(docs.into_iter().map(FeedDocument::from));
    }
    let pruned = engine.compress();
    tracing::info!(
        num_docs = engine.document_count(),
        num_words = engine.index().num_words(),
        pruned_suggestions = pruned,
        "ingested documents"
    );

    engine.to_disk(out_paths.snapshot())?;
    fs::write(out_paths.settings(), serde_json::to_string_pretty(&settings)?)?;
    tracing::info!(output, "index build complete");
    Ok(())
}

fn read_jsonl(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: InputDoc =
            serde_json::from_str(&line).with_context(|| format!("{}:{}", file.display(), n + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => {
            arr.into_iter().map(serde_json::from_value).collect::<std::result::Result<Vec<InputDoc>, _>>()?
        }
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    Ok(docs)
}

fn search_index(index: &str, query: &str, limit: usize, sort_by: Option<String>, ascending: bool, json: bool) -> Result<()> {
    let paths = IndexPaths::new(index);
    let settings: Settings = serde_json::from_str(&fs::read_to_string(paths.settings())?)
        .with_context(|| format!("reading {}", paths.settings().display()))?;
    let mut engine = engine_for(&settings)?;
    engine.from_disk(paths.snapshot())?;

    let params = FindParams::new(query)
        .sort_by(sort_by.map_or(SortBy::Weight, SortBy::Property))
        .direction(if ascending { Direction::Ascending } else { Direction::Descending })
        .limit(limit);
    let result = engine.find(params);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    for expr in &result.expressions {
        if let Some(s) = &expr.suggestion {
            println!("no direct match for '{}', did you mean '{s}'?", expr.original);
        }
    }
    for (rank, doc) in result.documents.iter().enumerate() {
        println!("{:>3}. {}  weight={:.4}", rank + 1, doc.id, doc.weight);
    }
    println!("{} of {} hits in {:?}", result.returned_hits, result.total_hits, result.performance.total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_doc_becomes_feed_document() {
        let doc: InputDoc = serde_json::from_str(
            r#"{ "id": "a", "title": "Titel", "body": "Text", "url": "http://x", "meta": { "rank": 2, "tags": ["t"] } }"#,
        )
        .unwrap();
        let feed = FeedDocument::from(doc);
        assert_eq!(feed.fields, vec!["Titel", "Text"]);
        assert_eq!(feed.metadata["rank"], MetaValue::Number(2.0));
        assert_eq!(feed.metadata["url"], MetaValue::Text("http://x".into()));
        assert_eq!(feed.metadata["tags"], MetaValue::List(vec![MetaValue::Text("t".into())]));
    }

    #[test]
    fn explicit_fields_win() {
        let doc: InputDoc = serde_json::from_str(r#"{ "id": "a", "title": "x", "fields": ["one", "", "three"] }"#).unwrap();
        assert_eq!(FeedDocument::from(doc).fields, vec!["one", "", "three"]);
    }

    #[test]
    fn unknown_stemmer_is_rejected() {
        assert!(stemmer_algorithm("Swedish").is_ok());
        assert!(stemmer_algorithm("klingon").is_err());
    }

    #[test]
    fn build_then_search_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("docs.jsonl");
        fs::write(
            &input,
            "{\"id\":\"0\",\"title\":\"Artikel nummer noll\",\"body\":\"olle lars\"}\n\n{\"id\":\"1\",\"title\":\"Titeln\",\"body\":\"artikeln sven\"}\n",
        )
        .unwrap();
        let out = dir.path().join("idx");
        let settings = Settings {
            options: IndexOptions::default(),
            stemmer: Some("swedish".into()),
            stopwords: false,
            strip_html: false,
            ranker: RankerOptions::default(),
        };
        build_index(input.to_str().unwrap(), out.to_str().unwrap(), settings).unwrap();
        assert!(out.join("index.bin").exists());

        let loaded: Settings = serde_json::from_str(&fs::read_to_string(out.join("settings.json")).unwrap()).unwrap();
        let mut engine = engine_for(&loaded).unwrap();
        engine.from_disk(out.join("index.bin")).unwrap();
        assert_eq!(engine.document_count(), 2);
        let result = engine.find("olle -sven");
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].id, "0");
    }
}
