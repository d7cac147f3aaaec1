/*
 * partial_index.rs
 *
 * Copyright (C) 2025 Posit Software, PBC. All rights reserved.
 *
 */

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// The partial index a worker publishes for one document.
///
/// `partial_index` maps each term to `{doc_id: frequency}` where the inner
/// key must equal the outer `doc_id`. The inner values are kept as raw JSON
/// so that a structurally damaged term can be rejected on its own during
/// fusion while the remaining terms still merge; records that do not match
/// this outer shape at all fail to decode and are dropped whole by the
/// results listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialIndexResult {
    /// Identifier of the worker that processed the document.
    pub worker_id: String,

    /// Identifier of the document processed.
    pub doc_id: String,

    /// Format: `{"term": {"<doc_id>": frequency}}`.
    pub partial_index: HashMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl PartialIndexResult {
    /// Builds a result record from plain per-term counts, nesting each count
    /// under this document's id as the wire format requires.
    pub fn from_term_counts(
        worker_id: String,
        doc_id: String,
        counts: HashMap<String, u64>,
        language: Option<String>,
    ) -> Self {
        let partial_index = counts
            .into_iter()
            .map(|(term, count)| {
                let mut inner = serde_json::Map::new();
                inner.insert(doc_id.clone(), Value::from(count));
                (term, Value::Object(inner))
            })
            .collect();

        Self {
            worker_id,
            doc_id,
            partial_index,
            language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_term_counts_nests_under_doc_id() {
        let counts = HashMap::from([(String::from("fox"), 3)]);
        let record = PartialIndexResult::from_term_counts(
            String::from("worker-a"),
            String::from("d1.txt"),
            counts,
            Some(String::from("english")),
        );

        let inner = record.partial_index.get("fox").unwrap();
        assert_eq!(inner.get("d1.txt").and_then(Value::as_u64), Some(3));
    }

    #[test]
    fn test_record_without_worker_id_is_rejected() {
        // A record missing required fields must fail to decode; the listener
        // drops it whole without touching the index or the pending set.
        let raw = r#"{"doc_id": "d9.txt", "partial_index": {"foo": {"dX.txt": 3}}}"#;
        assert!(serde_json::from_str::<PartialIndexResult>(raw).is_err());
    }
}
