/*
 * broker.rs
 *
 * Copyright (C) 2025 Posit Software, PBC. All rights reserved.
 *
 */

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;

use redis::Commands;

use crate::config::BrokerConfig;
use crate::config::WORKER_STATUS_PREFIX;
use crate::error::Error;
use crate::wire::document_task::DocumentTask;
use crate::wire::partial_index::PartialIndexResult;

/// How long to wait before retrying after losing the broker connection.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How often the subscriber wakes up to check its stop signal.
const SUBSCRIBE_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// A load readout for one worker, assembled from its status hash, the TTL of
/// that hash, and the length of its task queue.
///
/// Fields are `None` when the broker-side data was missing or unreadable;
/// policy (imputing conservative values, skipping dead workers) belongs to
/// the caller.
#[derive(Debug, Clone)]
pub struct WorkerLoad {
    pub worker_id: String,

    /// CPU usage as a raw percentage of one logical core.
    pub cpu: Option<f64>,

    /// RAM usage as a percentage of host memory.
    pub ram: Option<f64>,

    /// Remaining TTL of the status key in seconds. `-1` means no expiry,
    /// `-2` means the key disappeared between enumeration and this read.
    pub ttl_seconds: i64,

    /// Length of the worker's task queue; `None` if that read failed.
    pub queue_length: Option<i64>,
}

/// Client for the message broker. Holds one lazily-created command connection
/// that is reused across calls and dropped after any broker error so the next
/// call reconnects; the results subscriber always runs on a connection of its
/// own, since subscribe semantics preclude sharing.
pub struct Broker {
    config: BrokerConfig,
    client: redis::Client,
    connection: Mutex<Option<redis::Connection>>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> crate::Result<Self> {
        let client = redis::Client::open(config.url()).map_err(Error::Connect)?;

        Ok(Self {
            config,
            client,
            connection: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Runs one operation against the cached command connection, creating it
    /// first if needed. Any broker error drops the cached connection.
    fn with_connection<T, F>(&self, op: &str, f: F) -> crate::Result<T>
    where
        F: FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
    {
        let mut guard = self.connection.lock().unwrap();

        if guard.is_none() {
            let connection = self.client.get_connection().map_err(|err| {
                log::warn!("Could not connect to broker at {}: {err}", self.config.url());
                Error::Connect(err)
            })?;
            log::info!("Connected to broker at {}", self.config.url());
            *guard = Some(connection);
        }

        let connection = guard.as_mut().unwrap();
        match f(connection) {
            Ok(value) => Ok(value),
            Err(err) => {
                *guard = None;
                Err(Error::Command(String::from(op), err))
            },
        }
    }

    /// Checks broker connectivity.
    pub fn ping(&self) -> crate::Result<()> {
        self.with_connection("ping", |con| redis::cmd("PING").query::<String>(con))?;
        Ok(())
    }

    /// Appends a task to the given worker's queue and returns the new queue
    /// length.
    pub fn push_task(&self, worker_id: &str, task: &DocumentTask) -> crate::Result<i64> {
        let payload = serde_json::to_string(task).map_err(Error::EncodePayload)?;
        let queue = self.config.task_queue(worker_id);
        self.with_connection("push task", |con| con.rpush(&queue, &payload))
    }

    /// Blocking pop from this worker's queue. Returns `None` when the timeout
    /// elapses without a task.
    pub fn pop_task(
        &self,
        worker_id: &str,
        timeout: Duration,
    ) -> crate::Result<Option<DocumentTask>> {
        let queue = self.config.task_queue(worker_id);
        let reply: Option<(String, String)> = self.with_connection("pop task", |con| {
            con.blpop(&queue, timeout.as_secs_f64())
        })?;

        match reply {
            None => Ok(None),
            Some((_queue, payload)) => {
                let task = serde_json::from_str::<DocumentTask>(&payload)
                    .map_err(|err| Error::DecodePayload(preview(&payload), err))?;
                Ok(Some(task))
            },
        }
    }

    /// Publishes a partial index record on the results channel and returns
    /// the number of subscribers that received it.
    pub fn publish_result(&self, record: &PartialIndexResult) -> crate::Result<i64> {
        let payload = serde_json::to_string(record).map_err(Error::EncodePayload)?;
        let channel = self.config.results_channel.clone();
        self.with_connection("publish result", |con| con.publish(&channel, &payload))
    }

    /// Enumerates the ids of workers that currently have a status record.
    pub fn list_workers(&self) -> crate::Result<Vec<String>> {
        let pattern = format!("{}:*", WORKER_STATUS_PREFIX);
        let keys: Vec<String> = self.with_connection("list workers", |con| con.keys(&pattern))?;

        let ids = keys
            .iter()
            .filter_map(|key| key.split_once(':').map(|(_, id)| String::from(id)))
            .collect();
        Ok(ids)
    }

    /// Reads one worker's status hash, the TTL on it, and its queue length.
    pub fn worker_load(&self, worker_id: &str) -> crate::Result<WorkerLoad> {
        let key = BrokerConfig::status_key(worker_id);

        let (fields, ttl_seconds) = self.with_connection("worker load", |con| {
            let fields: HashMap<String, String> = con.hgetall(&key)?;
            let ttl: i64 = con.ttl(&key)?;
            Ok((fields, ttl))
        })?;

        let queue = self.config.task_queue(worker_id);
        let queue_length =
            match self.with_connection("queue length", |con| con.llen::<_, i64>(&queue)) {
                Ok(length) => Some(length),
                Err(err) => {
                    log::warn!("Could not read queue length for {worker_id}: {err}");
                    None
                },
            };

        Ok(WorkerLoad {
            worker_id: String::from(worker_id),
            cpu: fields.get("cpu").and_then(|value| value.parse().ok()),
            ram: fields.get("ram").and_then(|value| value.parse().ok()),
            ttl_seconds,
            queue_length,
        })
    }

    /// Writes or refreshes a worker's status record. The hash fields are only
    /// rewritten when `write_fields` is set; the TTL is always refreshed so
    /// the record stays alive as long as the worker does.
    pub fn set_status(
        &self,
        worker_id: &str,
        cpu: f64,
        ram: f64,
        ttl: Duration,
        write_fields: bool,
    ) -> crate::Result<()> {
        let key = BrokerConfig::status_key(worker_id);

        self.with_connection("set status", |con| {
            if write_fields {
                con.hset_multiple::<_, _, _, ()>(&key, &[
                    ("cpu", cpu.to_string()),
                    ("ram", ram.to_string()),
                ])?;
            }
            con.expire::<_, i64>(&key, ttl.as_secs() as i64)?;
            Ok(())
        })
    }

    /// Consumes the results channel until `stop` is set, invoking `handler`
    /// once per decodable record. Runs on the calling thread.
    ///
    /// Messages that fail to decode are logged and skipped. Connection loss
    /// triggers a bounded backoff, a reconnect, and a fresh subscription;
    /// messages published while disconnected are not redelivered.
    pub fn subscribe_results<F>(&self, mut handler: F, stop: &AtomicBool)
    where
        F: FnMut(PartialIndexResult),
    {
        let channel = self.config.results_channel.as_str();

        while !stop.load(Ordering::SeqCst) {
            // Subscriptions need a dedicated connection.
            let mut connection = match self.client.get_connection() {
                Ok(connection) => connection,
                Err(err) => {
                    log::warn!("Results listener could not connect, retrying in 5s: {err}");
                    std::thread::sleep(RECONNECT_DELAY);
                    continue;
                },
            };

            let mut pubsub = connection.as_pubsub();
            if let Err(err) = pubsub.subscribe(channel) {
                log::warn!("Could not subscribe to '{channel}', retrying in 5s: {err}");
                std::thread::sleep(RECONNECT_DELAY);
                continue;
            }
            if let Err(err) = pubsub.set_read_timeout(Some(SUBSCRIBE_POLL_TIMEOUT)) {
                log::warn!("Could not configure the results subscription: {err}");
                std::thread::sleep(RECONNECT_DELAY);
                continue;
            }

            log::info!("Subscribed to '{channel}', waiting for results");

            loop {
                if stop.load(Ordering::SeqCst) {
                    return;
                }

                let message = match pubsub.get_message() {
                    Ok(message) => message,
                    // Read timeout: just a tick to re-check the stop signal
                    Err(err) if err.is_timeout() => continue,
                    Err(err) => {
                        log::warn!("Results subscription lost, reconnecting in 5s: {err}");
                        break;
                    },
                };

                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        log::warn!("Could not read result payload: {err}");
                        continue;
                    },
                };

                match serde_json::from_str::<PartialIndexResult>(&payload) {
                    Ok(record) => handler(record),
                    Err(err) => {
                        log::error!(
                            "Dropping undecodable result record: {err} (raw: {})",
                            preview(&payload)
                        );
                    },
                }
            }

            std::thread::sleep(RECONNECT_DELAY);
        }
    }
}

/// Truncates a payload for log output.
fn preview(payload: &str) -> String {
    const LIMIT: usize = 200;
    if payload.chars().count() <= LIMIT {
        String::from(payload)
    } else {
        let truncated: String = payload.chars().take(LIMIT).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_payloads() {
        let long = "x".repeat(500);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), 203);
        assert!(shown.ends_with("..."));

        assert_eq!(preview("short"), "short");
    }
}
