use crate::error::{Error, Result};
use crate::index::InvertedIndex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub version: u32,
    pub created_at: String,
    pub num_docs: u64,
}

impl SnapshotHeader {
    fn for_index(index: &InvertedIndex) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "".into()),
            num_docs: index.num_docs() as u64,
        }
    }
}

/// Header followed by the index, both bincode encoded.
pub fn encode(index: &InvertedIndex) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    bincode::serialize_into(&mut buf, &SnapshotHeader::for_index(index)).map_err(|e| Error::Encode(e.to_string()))?;
    bincode::serialize_into(&mut buf, index).map_err(|e| Error::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decode a snapshot produced by [`encode`]. The returned index carries
/// default options; the caller attaches its own.
pub fn decode(bytes: &[u8]) -> Result<(SnapshotHeader, InvertedIndex)> {
    let mut reader = bytes;
    let header: SnapshotHeader = bincode::deserialize_from(&mut reader).map_err(|e| Error::Decode(e.to_string()))?;
    if header.version != SNAPSHOT_VERSION {
        return Err(Error::UnsupportedVersion { found: header.version, expected: SNAPSHOT_VERSION });
    }
    let index: InvertedIndex = bincode::deserialize_from(&mut reader).map_err(|e| Error::Decode(e.to_string()))?;
    if index.num_docs() as u64 != header.num_docs {
        return Err(Error::Decode(format!(
            "header lists {} documents, index holds {}",
            header.num_docs,
            index.num_docs()
        )));
    }
    index.check_integrity().map_err(Error::Decode)?;
    Ok((header, index))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `bytes` next to `path` and rename over it.
pub fn write_snapshot(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = tmp_path(path);
    let mut f = File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    drop(f);
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexOptions;
    use crate::index::Metadata;
    use crate::word::Word;
    use std::sync::Arc;

    fn small_index() -> InvertedIndex {
        let mut ix = InvertedIndex::new(Arc::new(IndexOptions::default()));
        let d = ix.populate_document("doc-1", Metadata::new());
        let w = Word { original: "olle".into(), preprocessed: "olle".into(), processed: "olle".into() };
        ix.index_word(&w, d, 0, false);
        ix
    }

    #[test]
    fn header_round_trips() {
        let bytes = encode(&small_index()).unwrap();
        let (header, index) = decode(&bytes).unwrap();
        assert_eq!(header.version, SNAPSHOT_VERSION);
        assert_eq!(header.num_docs, 1);
        assert!(!header.created_at.is_empty());
        assert_eq!(index.documents()[0].external_id, "doc-1");
    }

    #[test]
    fn rejects_other_versions() {
        let mut buf = Vec::new();
        let header = SnapshotHeader { version: 99, created_at: String::new(), num_docs: 0 };
        bincode::serialize_into(&mut buf, &header).unwrap();
        assert!(matches!(decode(&buf), Err(Error::UnsupportedVersion { found: 99, expected: SNAPSHOT_VERSION })));
    }

    #[test]
    fn truncated_bytes_fail_to_decode() {
        let bytes = encode(&small_index()).unwrap();
        assert!(matches!(decode(&bytes[..bytes.len() / 2]), Err(Error::Decode(_))));
        assert!(matches!(decode(&[]), Err(Error::Decode(_))));
    }

    #[test]
    fn tmp_file_sits_next_to_target() {
        assert_eq!(tmp_path(Path::new("out/index.bin")), PathBuf::from("out/index.bin.tmp"));
    }
}
