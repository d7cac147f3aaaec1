//
// config.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::path::PathBuf;

use mill::Language;

const DEFAULT_UPLOADS_PATH: &str = "./uploads";
const DEFAULT_CHECKPOINT_PATH: &str = "./data/index.json.gz";
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Coordinator-side configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Directory scanned for local `.txt` documents to index.
    pub uploads_path: PathBuf,

    /// Where the global index checkpoint is persisted.
    pub checkpoint_path: PathBuf,

    /// Language used to stem query terms and as the default for documents
    /// that don't carry a language tag.
    pub language: Language,

    /// Address the HTTP API binds to.
    pub bind_address: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            uploads_path: PathBuf::from(DEFAULT_UPLOADS_PATH),
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            language: Language::English,
            bind_address: String::from(DEFAULT_BIND_ADDRESS),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_env() -> Self {
        let uploads_path = std::env::var("LOCAL_UPLOADS_PATH")
            .map(PathBuf::from)
            .unwrap_or(PathBuf::from(DEFAULT_UPLOADS_PATH));

        let checkpoint_path = std::env::var("INDEX_FILE_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or(PathBuf::from(DEFAULT_CHECKPOINT_PATH));

        let language = match std::env::var("COORDINATOR_PROCESSING_LANGUAGE") {
            Ok(tag) => Language::from_tag(&tag),
            Err(_) => Language::English,
        };

        let bind_address =
            std::env::var("QUARRY_BIND_ADDRESS").unwrap_or(String::from(DEFAULT_BIND_ADDRESS));

        Self {
            uploads_path,
            checkpoint_path,
            language,
            bind_address,
        }
    }
}
