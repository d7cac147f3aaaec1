//
// processor.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::collections::HashMap;

use adit::broker::Broker;
use adit::wire::document_task::DocumentTask;
use adit::wire::partial_index::PartialIndexResult;
use mill::Language;

/// Counts term occurrences over a normalized token stream.
pub fn term_counts(tokens: &[String]) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token.clone()).or_insert(0) += 1;
    }
    counts
}

/// Processes one document task: normalizes the content, computes term
/// frequencies, and publishes the partial index on the results channel.
///
/// A document that normalizes to zero tokens still publishes an (empty)
/// partial record so the coordinator can clear it from its pending set.
/// Publish failures are logged and dropped; tasks are at-most-once.
pub fn process_task(
    broker: &Broker,
    task: DocumentTask,
    default_language: Language,
    worker_id: &str,
) {
    let language = task
        .language
        .as_deref()
        .map(Language::from_tag)
        .unwrap_or(default_language);

    log::info!(
        "Received task for doc {}; language: {}, content length: {}",
        task.doc_id,
        language.as_tag(),
        task.content.len()
    );

    let tokens = mill::normalize(&task.content, language);
    if tokens.is_empty() {
        log::info!("Doc {}: no tokens after normalization", task.doc_id);
    }

    let counts = term_counts(&tokens);
    log::debug!(
        "Doc {}: partial index generated with {} terms",
        task.doc_id,
        counts.len()
    );

    let record = PartialIndexResult::from_term_counts(
        String::from(worker_id),
        task.doc_id.clone(),
        counts,
        Some(String::from(language.as_tag())),
    );

    match broker.publish_result(&record) {
        Ok(subscribers) if subscribers > 0 => {
            log::info!(
                "Doc {}: published partial index to {subscribers} subscriber(s)",
                task.doc_id
            );
        },
        Ok(_) => {
            log::warn!(
                "Doc {}: published partial index but no subscribers are listening",
                task.doc_id
            );
        },
        Err(err) => {
            log::error!("Doc {}: could not publish partial index: {err}", task.doc_id);
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|word| String::from(*word)).collect()
    }

    #[test]
    fn test_term_counts_multiplicity() {
        let counts = term_counts(&tokens(&["cat", "cat", "dog"]));
        assert_eq!(counts["cat"], 2);
        assert_eq!(counts["dog"], 1);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_term_counts_empty() {
        assert!(term_counts(&[]).is_empty());
    }
}
