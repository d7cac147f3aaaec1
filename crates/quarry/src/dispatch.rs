//
// dispatch.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use adit::broker::Broker;
use adit::broker::WorkerLoad;
use adit::wire::document_task::DocumentTask;
use adit::Error;

use crate::index::Coordinator;

/// One worker's dispatch candidacy, after imputation of unreadable fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub worker_id: String,
    pub queue_length: i64,

    /// Reported CPU% + RAM%.
    pub load: f64,
}

/// Converts a raw load readout into a candidate, or `None` when the worker
/// must be skipped.
///
/// TTL rules: `-2` means the status key expired between enumeration and the
/// read; `-1` means no expiry, an operator override that keeps the worker
/// eligible; any other negative value means dead. Missing or unparsable
/// `cpu`/`ram` fields impute `100.0` each, and a failed queue-length read
/// imputes an effectively infinite backlog.
fn candidate_from_load(load: WorkerLoad) -> Option<Candidate> {
    if load.ttl_seconds < 0 && load.ttl_seconds != -1 {
        log::debug!(
            "Worker {} status key has expired or vanished (TTL {}); skipping",
            load.worker_id,
            load.ttl_seconds
        );
        return None;
    }

    let cpu = load.cpu.unwrap_or(100.0);
    let ram = load.ram.unwrap_or(100.0);
    let queue_length = load.queue_length.unwrap_or(i64::MAX);

    Some(Candidate {
        worker_id: load.worker_id,
        queue_length,
        load: cpu + ram,
    })
}

/// Orders candidates by queue length, then by CPU+RAM, then by worker id.
///
/// Queue length is the most direct signal of backlog; CPU+RAM reacts to a
/// worker whose current task is heavy while its queue happens to be empty.
/// The final id comparison makes selection deterministic among equals.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        a.queue_length
            .cmp(&b.queue_length)
            .then(
                a.load
                    .partial_cmp(&b.load)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then_with(|| a.worker_id.cmp(&b.worker_id))
    });
    candidates
}

/// Picks the least-loaded live worker.
pub fn select_worker(broker: &Broker) -> adit::Result<String> {
    let workers = broker.list_workers()?;
    if workers.is_empty() {
        log::warn!("No worker status keys found in the broker");
        return Err(Error::NoWorkersAvailable);
    }

    let total = workers.len();
    let mut candidates = Vec::with_capacity(total);

    for worker_id in workers {
        let load = match broker.worker_load(&worker_id) {
            Ok(load) => load,
            Err(err) => {
                log::warn!("Could not read load for worker {worker_id}: {err}");
                continue;
            },
        };

        if let Some(candidate) = candidate_from_load(load) {
            log::debug!(
                "Candidate {} - queue: {}, load: {:.2}",
                candidate.worker_id,
                candidate.queue_length,
                candidate.load
            );
            candidates.push(candidate);
        }
    }

    let ranked = rank(candidates);
    match ranked.first() {
        Some(best) => {
            log::info!(
                "Selected worker {} (queue: {}, load: {:.2}) from {} candidates",
                best.worker_id,
                best.queue_length,
                best.load,
                ranked.len()
            );
            Ok(best.worker_id.clone())
        },
        None => {
            log::warn!("No live candidate workers after checking status ({total} enumerated)");
            Err(Error::NoWorkersAvailable)
        },
    }
}

/// Dispatches one document: the doc id goes into the pending set first, then
/// the task is pushed to the selected worker's queue. If selection or the
/// push fails the pending entry is removed again, so a failed dispatch never
/// leaves a document stranded as pending.
///
/// Returns the length of the worker's queue after the push.
pub fn dispatch_document(coordinator: &Coordinator, task: DocumentTask) -> adit::Result<i64> {
    let doc_id = task.doc_id.clone();

    {
        let mut state = coordinator.state().lock().unwrap();
        state.pending.insert(doc_id.clone());
    }

    let outcome = select_worker(coordinator.broker())
        .and_then(|worker_id| coordinator.broker().push_task(&worker_id, &task));

    if outcome.is_err() {
        let mut state = coordinator.state().lock().unwrap();
        state.pending.remove(&doc_id);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(worker_id: &str, cpu: f64, ram: f64, ttl: i64, queue: i64) -> WorkerLoad {
        WorkerLoad {
            worker_id: String::from(worker_id),
            cpu: Some(cpu),
            ram: Some(ram),
            ttl_seconds: ttl,
            queue_length: Some(queue),
        }
    }

    #[test]
    fn test_lighter_worker_wins() {
        let a = candidate_from_load(load("worker-a", 90.0, 90.0, 6, 0)).unwrap();
        let b = candidate_from_load(load("worker-b", 10.0, 10.0, 6, 0)).unwrap();

        let ranked = rank(vec![a, b]);
        assert_eq!(ranked[0].worker_id, "worker-b");
    }

    #[test]
    fn test_expired_worker_is_skipped() {
        // TTL -2: the key vanished between enumeration and the read
        assert!(candidate_from_load(load("worker-c", 5.0, 5.0, -2, 0)).is_none());

        // TTL -1 is an operator override ("no expiry") and stays eligible
        assert!(candidate_from_load(load("worker-d", 5.0, 5.0, -1, 0)).is_some());
    }

    #[test]
    fn test_queue_length_dominates_load() {
        let busy = candidate_from_load(load("worker-a", 1.0, 1.0, 6, 4)).unwrap();
        let idle = candidate_from_load(load("worker-b", 99.0, 99.0, 6, 0)).unwrap();

        let ranked = rank(vec![busy, idle]);
        assert_eq!(ranked[0].worker_id, "worker-b");
    }

    #[test]
    fn test_missing_fields_impute_conservatively() {
        let unknown = WorkerLoad {
            worker_id: String::from("worker-a"),
            cpu: None,
            ram: None,
            ttl_seconds: 6,
            queue_length: Some(0),
        };
        let candidate = candidate_from_load(unknown).unwrap();
        assert_eq!(candidate.load, 200.0);

        // A failed queue read sorts the worker last
        let unreadable = WorkerLoad {
            worker_id: String::from("worker-b"),
            cpu: Some(1.0),
            ram: Some(1.0),
            ttl_seconds: 6,
            queue_length: None,
        };
        let candidate = candidate_from_load(unreadable).unwrap();
        assert_eq!(candidate.queue_length, i64::MAX);
    }

    #[test]
    fn test_full_ties_break_on_worker_id() {
        let ids = ["worker-c", "worker-a", "worker-b"];
        let candidates: Vec<Candidate> = ids
            .iter()
            .map(|id| candidate_from_load(load(id, 50.0, 50.0, 6, 2)).unwrap())
            .collect();

        let ranked = rank(candidates);
        assert_eq!(ranked[0].worker_id, "worker-a");
        assert_eq!(ranked[1].worker_id, "worker-b");
        assert_eq!(ranked[2].worker_id, "worker-c");
    }
}
