//
// checkpoint.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use serde::Serialize;

use crate::index::GlobalIndex;

/// On-disk form: gzip-compressed UTF-8 JSON `{"index": {...}}`.
#[derive(Deserialize)]
struct CheckpointFile {
    #[serde(default)]
    index: GlobalIndex,
}

#[derive(Serialize)]
struct CheckpointFileRef<'a> {
    index: &'a GlobalIndex,
}

/// Loads the global index from a checkpoint. Any failure (missing file,
/// invalid gzip, invalid JSON) yields an empty index with a warning;
/// checkpoints are best-effort and never block startup.
pub fn load(path: &Path) -> GlobalIndex {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::info!(
                "Index file {} not found; starting with an empty index",
                path.display()
            );
            return GlobalIndex::new();
        },
        Err(err) => {
            log::warn!(
                "Could not open index file {}; starting with an empty index: {err}",
                path.display()
            );
            return GlobalIndex::new();
        },
    };

    // Gzip corruption surfaces as an IO error inside the JSON reader
    match serde_json::from_reader::<_, CheckpointFile>(GzDecoder::new(file)) {
        Ok(checkpoint) => {
            log::info!(
                "Loaded global index from {} ({} terms)",
                path.display(),
                checkpoint.index.len()
            );
            checkpoint.index
        },
        Err(err) => {
            log::warn!(
                "Could not decode index file {}; starting with an empty index: {err}",
                path.display()
            );
            GlobalIndex::new()
        },
    }
}

/// Writes the global index to a checkpoint, creating the containing
/// directory if needed.
pub fn save(path: &Path, index: &GlobalIndex) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create directory {}", parent.display()))?;
        }
    }

    let file = File::create(path)
        .with_context(|| format!("Could not create index file {}", path.display()))?;

    let mut encoder = GzEncoder::new(file, Compression::default());
    serde_json::to_writer(&mut encoder, &CheckpointFileRef { index })
        .with_context(|| format!("Could not serialize index to {}", path.display()))?;
    encoder
        .finish()
        .with_context(|| format!("Could not finish writing {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::index::TermFrequencies;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("index.json.gz");

        let mut index = GlobalIndex::new();
        index.insert(
            String::from("fox"),
            TermFrequencies::from([(String::from("d1.txt"), 3)]),
        );

        // `data/` does not exist yet; save must create it
        save(&path, &index).unwrap();
        assert_eq!(load(&path), index);
    }

    #[test]
    fn test_missing_file_yields_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = load(&dir.path().join("nothing-here.json.gz"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_corrupt_file_yields_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json.gz");

        let mut file = File::create(&path).unwrap();
        file.write_all(b"this is not gzip data").unwrap();
        drop(file);

        assert!(load(&path).is_empty());
    }
}
