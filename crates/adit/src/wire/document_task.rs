/*
 * document_task.rs
 *
 * Copyright (C) 2025 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

/// Represents a request to index one document. Produced by the coordinator,
/// consumed by exactly one worker; immutable once queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTask {
    /// Unique identifier for the document, e.g. a filename. Re-submitting an
    /// id means "re-index this document".
    pub doc_id: String,

    /// The raw text content of the document.
    pub content: String,

    /// Optional language tag; the worker falls back to its configured default
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}
