//
// config.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use mill::Language;

/// Worker-side configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Default language for tasks that don't carry a language tag.
    pub language: Language,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            language: Language::English,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let language = match std::env::var("PROCESSING_LANGUAGE") {
            Ok(tag) => Language::from_tag(&tag),
            Err(_) => Language::English,
        };

        Self { language }
    }
}
