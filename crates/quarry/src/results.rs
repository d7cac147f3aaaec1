//
// results.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use adit::wire::partial_index::PartialIndexResult;
use crossbeam::channel::bounded;
use crossbeam::channel::Receiver;
use stdext::spawn;

use crate::fuse;
use crate::index::Coordinator;

/// How long shutdown waits for the listener thread to confirm before
/// abandoning it.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to the background results listener.
pub struct ResultsListener {
    stop: Arc<AtomicBool>,
    done_rx: Receiver<()>,
}

/// Starts the results listener thread: a single long-lived subscriber on the
/// results channel that fuses each incoming record into the global index.
pub fn start(coordinator: Arc<Coordinator>) -> ResultsListener {
    let stop = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = bounded(1);

    let thread_stop = stop.clone();
    spawn!("quarry-results", move || {
        coordinator
            .broker()
            .subscribe_results(|record| handle_result(&coordinator, record), &thread_stop);

        log::info!("Results listener thread terminated");
        let _ = done_tx.send(());
    });

    ResultsListener { stop, done_rx }
}

impl ResultsListener {
    /// Signals the listener to stop and waits for it, bounded. The thread
    /// observes the signal between broker reads; if it is wedged in a
    /// reconnect we abandon it rather than hold up shutdown.
    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        match self.done_rx.recv_timeout(SHUTDOWN_TIMEOUT) {
            Ok(()) => log::info!("Results listener stopped"),
            Err(_) => log::warn!("Results listener did not stop within 10 seconds; abandoning it"),
        }
    }
}

/// Processes one decoded result record: fuses the partial index, then clears
/// the document from the pending set.
pub(crate) fn handle_result(coordinator: &Coordinator, record: PartialIndexResult) {
    if record.doc_id.is_empty() {
        log::warn!(
            "Dropping result with empty doc id from worker {}",
            record.worker_id
        );
        return;
    }

    log::info!(
        "Received partial index from worker {} for doc {}",
        record.worker_id,
        record.doc_id
    );

    fuse::fuse(coordinator.state(), &record.partial_index, &record.doc_id);

    let mut state = coordinator.state().lock().unwrap();
    if state.pending.remove(&record.doc_id) {
        log::info!(
            "Doc {} processing complete; {} docs still pending",
            record.doc_id,
            state.pending.len()
        );
    } else {
        // Legitimate after a coordinator restart cleared the pending set, or
        // on a duplicate publish; the fusion above still counts.
        log::warn!(
            "Received results for doc {} which was not in the pending set",
            record.doc_id
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::testing::test_coordinator;

    fn record(doc_id: &str, term: &str, count: u64) -> PartialIndexResult {
        PartialIndexResult::from_term_counts(
            String::from("worker-test"),
            String::from(doc_id),
            HashMap::from([(String::from(term), count)]),
            None,
        )
    }

    #[test]
    fn test_result_clears_pending() {
        let coordinator = test_coordinator();
        {
            let mut state = coordinator.state().lock().unwrap();
            state.pending.insert(String::from("d1.txt"));
        }

        handle_result(&coordinator, record("d1.txt", "fox", 2));

        let state = coordinator.state().lock().unwrap();
        assert_eq!(state.index["fox"]["d1.txt"], 2);
        assert!(!state.pending.contains("d1.txt"));
    }

    #[test]
    fn test_result_for_non_pending_doc_still_fuses() {
        // After a restart the pending set is empty but late results must
        // still land in the index
        let coordinator = test_coordinator();
        handle_result(&coordinator, record("d2.txt", "cat", 1));

        let state = coordinator.state().lock().unwrap();
        assert_eq!(state.index["cat"]["d2.txt"], 1);
    }

    #[test]
    fn test_empty_partial_record_clears_pending() {
        // A document that normalized to zero tokens produces an empty
        // partial; the pending entry must still clear
        let coordinator = test_coordinator();
        {
            let mut state = coordinator.state().lock().unwrap();
            state.pending.insert(String::from("empty.txt"));
        }

        let record = PartialIndexResult::from_term_counts(
            String::from("worker-test"),
            String::from("empty.txt"),
            HashMap::new(),
            None,
        );
        handle_result(&coordinator, record);

        let state = coordinator.state().lock().unwrap();
        assert!(state.index.is_empty());
        assert!(!state.pending.contains("empty.txt"));
    }
}
