//
// index.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;

use adit::broker::Broker;

use crate::checkpoint;
use crate::config::CoordinatorConfig;

/// Per-term postings: document id to term frequency.
pub type TermFrequencies = HashMap<String, u64>;

/// The global inverted index: term to postings. An entry `(t, d, f)` means
/// "term `t` occurs `f` times in document `d`, as of the latest fusion for
/// that pair". No ordering is guaranteed over either level.
pub type GlobalIndex = HashMap<String, TermFrequencies>;

/// The coordinator's mutable state. The global index and the pending set are
/// guarded together by one mutex: fusion dominates the critical-section mix,
/// so a single coarse lock is used rather than a read-write lock.
#[derive(Debug, Default)]
pub struct IndexState {
    pub index: GlobalIndex,

    /// Documents whose task has been dispatched but whose result has not yet
    /// been fused.
    pub pending: HashSet<String>,
}

/// Owner of all coordinator state: the index state behind its mutex, the
/// broker client, and the configuration. Created once in `main` and shared
/// via `Arc`; there is no module-level mutable state.
pub struct Coordinator {
    state: Mutex<IndexState>,
    broker: Broker,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(broker: Broker, config: CoordinatorConfig, index: GlobalIndex) -> Self {
        let state = IndexState {
            index,
            pending: HashSet::new(),
        };

        Self {
            state: Mutex::new(state),
            broker,
            config,
        }
    }

    pub fn state(&self) -> &Mutex<IndexState> {
        &self.state
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Resolves a single-term query: the term is normalized the same way
    /// document text is, and the first stem is looked up. Returns matches
    /// sorted by frequency, descending; order within equal frequencies is
    /// unspecified.
    pub fn search(&self, term: &str) -> Vec<(String, u64)> {
        let stems = mill::normalize(term, self.config.language);

        let Some(stem) = stems.first() else {
            return Vec::new();
        };

        let state = self.state.lock().unwrap();
        match state.index.get(stem) {
            Some(postings) => ranked_docs(postings),
            None => {
                log::info!("Stem '{stem}' not found in the global index");
                Vec::new()
            },
        }
    }

    /// Number of terms in the index and of documents awaiting results.
    pub fn status(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.index.len(), state.pending.len())
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Replaces the index wholesale (checkpoint reload) and clears the
    /// pending set: results for documents dispatched before the reload will
    /// be reported as non-pending when they arrive.
    pub fn replace_index(&self, index: GlobalIndex) -> usize {
        let mut state = self.state.lock().unwrap();
        state.index = index;
        state.pending.clear();
        state.index.len()
    }

    /// Writes the current index to the configured checkpoint path.
    pub fn save_checkpoint(&self) -> anyhow::Result<()> {
        let state = self.state.lock().unwrap();
        checkpoint::save(&self.config.checkpoint_path, &state.index)?;
        log::info!(
            "Saved global index to {} ({} terms)",
            self.config.checkpoint_path.display(),
            state.index.len()
        );
        Ok(())
    }
}

/// Materializes postings as `(doc_id, frequency)` pairs, most frequent first.
pub fn ranked_docs(postings: &TermFrequencies) -> Vec<(String, u64)> {
    let mut docs: Vec<(String, u64)> = postings
        .iter()
        .map(|(doc_id, frequency)| (doc_id.clone(), *frequency))
        .collect();
    docs.sort_by(|a, b| b.1.cmp(&a.1));
    docs
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testing::test_coordinator;

    #[test]
    fn test_search_sorts_by_frequency() {
        let coordinator = test_coordinator();
        {
            let mut state = coordinator.state().lock().unwrap();
            state.index.insert(
                String::from("cat"),
                TermFrequencies::from([(String::from("d2.txt"), 2)]),
            );
            state.index.insert(
                String::from("dog"),
                TermFrequencies::from([
                    (String::from("d2.txt"), 1),
                    (String::from("d3.txt"), 1),
                ]),
            );
        }

        assert_eq!(coordinator.search("cat"), vec![(String::from("d2.txt"), 2)]);

        // Equal frequencies: order between the two docs is unspecified
        let docs = coordinator.search("dog");
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|(_, freq)| *freq == 1));
    }

    #[test]
    fn test_search_normalizes_the_term() {
        let coordinator = test_coordinator();
        {
            let mut state = coordinator.state().lock().unwrap();
            state.index.insert(
                String::from("report"),
                TermFrequencies::from([(String::from("d1.txt"), 4)]),
            );
        }

        // "Reporting" stems to "report"
        assert_eq!(coordinator.search("Reporting"), vec![(
            String::from("d1.txt"),
            4
        )]);
    }

    #[test]
    fn test_search_misses_return_empty() {
        let coordinator = test_coordinator();
        assert!(coordinator.search("absent").is_empty());

        // A term that normalizes to nothing (stopword) can't match anything
        assert!(coordinator.search("the").is_empty());
    }

    #[test]
    fn test_replace_index_clears_pending() {
        let coordinator = test_coordinator();
        {
            let mut state = coordinator.state().lock().unwrap();
            state.pending.insert(String::from("d1.txt"));
        }

        let terms = coordinator.replace_index(GlobalIndex::new());
        assert_eq!(terms, 0);
        assert_eq!(coordinator.pending_count(), 0);
    }

    proptest! {
        // Query responses are monotonically non-increasing in frequency
        #[test]
        fn test_ranked_docs_are_monotonic(
            postings in proptest::collection::hash_map("[a-z]{1,8}", 0u64..1000, 0..20)
        ) {
            let docs = ranked_docs(&postings);
            for pair in docs.windows(2) {
                prop_assert!(pair[0].1 >= pair[1].1);
            }
            prop_assert_eq!(docs.len(), postings.len());
        }
    }
}
