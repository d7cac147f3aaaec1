//
// fuse.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::index::IndexState;

/// Merges one document's partial index into the global inverted index.
///
/// `partial` maps each term to `{doc_id: frequency}`, where the inner key
/// must equal `doc_id`. Terms that violate this are skipped individually;
/// the rest of the record still fuses:
///
/// - inner value is not an object: structural damage, skip;
/// - inner map not keyed by `doc_id`: cross-document contamination, skip;
/// - frequency not a non-negative integer: skip.
///
/// Valid frequencies overwrite whatever was stored for `(term, doc_id)`:
/// re-indexing a document converges to the new counts rather than
/// accumulating. Terms that disappeared from a newer version of the document
/// are not removed; stale entries remain until a reload replaces the index.
///
/// The mutex is held for the duration of the merge, making fusion
/// last-writer-wins per `(term, doc_id)` where "last" is last to acquire
/// the lock.
pub fn fuse(state: &Mutex<IndexState>, partial: &HashMap<String, Value>, doc_id: &str) {
    let mut state = state.lock().unwrap();

    log::debug!(
        "Merging partial index for doc '{doc_id}' ({} terms)",
        partial.len()
    );

    for (term, entry) in partial {
        let Some(frequencies) = entry.as_object() else {
            log::warn!(
                "Term '{term}' in partial index for doc '{doc_id}' has invalid type; expected an object, skipping term"
            );
            continue;
        };

        let Some(frequency) = frequencies.get(doc_id) else {
            log::error!(
                "Term '{term}' for doc '{doc_id}': its own doc id is not a key in its frequency map {frequencies:?}; skipping term"
            );
            continue;
        };

        let Some(frequency) = frequency.as_u64() else {
            log::warn!(
                "Term '{term}', doc '{doc_id}': frequency '{frequency}' is not a non-negative integer; skipping term"
            );
            continue;
        };

        state
            .index
            .entry(term.clone())
            .or_default()
            .insert(String::from(doc_id), frequency);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::index::GlobalIndex;
    use crate::index::IndexState;

    fn partial_for(doc_id: &str, counts: &[(&str, u64)]) -> HashMap<String, Value> {
        counts
            .iter()
            .map(|(term, count)| (String::from(*term), json!({ doc_id: count })))
            .collect()
    }

    fn state() -> Mutex<IndexState> {
        Mutex::new(IndexState::default())
    }

    #[test]
    fn test_fuse_single_document() {
        let state = state();
        let partial = partial_for("d1.txt", &[("quick", 1), ("brown", 1), ("fox", 1)]);
        fuse(&state, &partial, "d1.txt");

        let state = state.lock().unwrap();
        assert_eq!(state.index["quick"]["d1.txt"], 1);
        assert_eq!(state.index["brown"]["d1.txt"], 1);
        assert_eq!(state.index["fox"]["d1.txt"], 1);
        assert!(!state.index.contains_key("the"));
    }

    #[test]
    fn test_reindexing_overwrites_and_keeps_stale_terms() {
        let state = state();
        fuse(
            &state,
            &partial_for("d1.txt", &[("quick", 1), ("fox", 1)]),
            "d1.txt",
        );
        // Re-index the same document with different content
        fuse(&state, &partial_for("d1.txt", &[("fox", 3)]), "d1.txt");

        let state = state.lock().unwrap();
        assert_eq!(state.index["fox"]["d1.txt"], 3);
        // "quick" disappeared from the new version but its old entry remains
        assert_eq!(state.index["quick"]["d1.txt"], 1);
    }

    #[test]
    fn test_contaminated_term_is_skipped() {
        let state = state();
        // Inner map keyed by a different document than the record claims
        let partial = HashMap::from([(String::from("foo"), json!({ "dX.txt": 3 }))]);
        fuse(&state, &partial, "d9.txt");

        let state = state.lock().unwrap();
        assert!(state.index.is_empty());
    }

    #[test]
    fn test_contamination_does_not_block_other_terms() {
        let state = state();
        let partial = HashMap::from([
            (String::from("good"), json!({ "d1.txt": 2 })),
            (String::from("bad"), json!({ "other.txt": 5 })),
        ]);
        fuse(&state, &partial, "d1.txt");

        let state = state.lock().unwrap();
        assert_eq!(state.index["good"]["d1.txt"], 2);
        assert!(!state.index.contains_key("bad"));
    }

    #[test]
    fn test_invalid_frequencies_are_skipped() {
        let state = state();
        let partial = HashMap::from([
            (String::from("negative"), json!({ "d1.txt": -2 })),
            (String::from("fractional"), json!({ "d1.txt": 1.5 })),
            (String::from("textual"), json!({ "d1.txt": "3" })),
            (String::from("scalar"), json!(7)),
        ]);
        fuse(&state, &partial, "d1.txt");

        let state = state.lock().unwrap();
        assert!(state.index.is_empty());
    }

    #[test]
    fn test_zero_frequency_is_stored() {
        // Zero is a valid non-negative integer; the normalizer never produces
        // it but the fuser accepts it
        let state = state();
        fuse(&state, &partial_for("d1.txt", &[("rare", 0)]), "d1.txt");

        let state = state.lock().unwrap();
        assert_eq!(state.index["rare"]["d1.txt"], 0);
    }

    #[test]
    fn test_empty_partial_is_a_no_op() {
        let state = state();
        fuse(&state, &HashMap::new(), "d1.txt");
        assert!(state.lock().unwrap().index.is_empty());
    }

    // Strategy: several documents with distinct ids, each carrying its own
    // term counts
    fn documents() -> impl Strategy<Value = HashMap<String, HashMap<String, u64>>> {
        proptest::collection::hash_map(
            "[a-z]{1,6}\\.txt",
            proptest::collection::hash_map("[a-z]{1,5}", 0u64..50, 1..5),
            1..6,
        )
    }

    fn fuse_all<'a>(
        documents: impl Iterator<Item = (&'a String, &'a HashMap<String, u64>)>,
    ) -> GlobalIndex {
        let state = state();
        for (doc_id, counts) in documents {
            let counts: Vec<(&str, u64)> = counts
                .iter()
                .map(|(term, count)| (term.as_str(), *count))
                .collect();
            fuse(&state, &partial_for(doc_id, &counts), doc_id);
        }
        state.into_inner().unwrap().index
    }

    proptest! {
        // Fusion commutes across distinct documents: any application order
        // produces the same global index
        #[test]
        fn test_fusion_commutes_across_documents(documents in documents()) {
            let entries: Vec<_> = documents.iter().collect();

            let forward = fuse_all(entries.iter().copied());
            let reverse = fuse_all(entries.iter().rev().copied());

            prop_assert_eq!(forward, reverse);
        }

        // Re-submission: the second record wins on shared terms, while terms
        // only present in the first record keep their original frequencies
        #[test]
        fn test_last_writer_wins_per_term(
            first in proptest::collection::hash_map("[a-z]{1,5}", 0u64..50, 1..8),
            second in proptest::collection::hash_map("[a-z]{1,5}", 0u64..50, 1..8),
        ) {
            let state = state();

            let first_slice: Vec<(&str, u64)> =
                first.iter().map(|(t, c)| (t.as_str(), *c)).collect();
            let second_slice: Vec<(&str, u64)> =
                second.iter().map(|(t, c)| (t.as_str(), *c)).collect();

            fuse(&state, &partial_for("doc.txt", &first_slice), "doc.txt");
            fuse(&state, &partial_for("doc.txt", &second_slice), "doc.txt");

            let index = state.into_inner().unwrap().index;

            let second_terms: HashSet<&String> = second.keys().collect();
            for (term, count) in &first {
                if !second_terms.contains(term) {
                    prop_assert_eq!(index[term]["doc.txt"], *count);
                }
            }
            for (term, count) in &second {
                prop_assert_eq!(index[term]["doc.txt"], *count);
            }
        }
    }
}
