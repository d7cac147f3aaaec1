/*
 * config.rs
 *
 * Copyright (C) 2025 Posit Software, PBC. All rights reserved.
 *
 */

/// Key prefix for worker status hashes; the suffix is the worker id.
pub const WORKER_STATUS_PREFIX: &str = "worker_status";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 6379;
const DEFAULT_TASK_QUEUE_PREFIX: &str = "doc_processing_tasks";
const DEFAULT_RESULTS_CHANNEL: &str = "idx_partial_results";

/// Connection and naming configuration for the message broker. Read once at
/// startup from the environment; shared by the coordinator and the workers so
/// both sides agree on queue and channel names.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,

    /// Per-worker task queues are named `<task_queue_prefix>:<worker_id>`.
    pub task_queue_prefix: String,

    /// The pub/sub channel workers publish partial index results on.
    pub results_channel: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: String::from(DEFAULT_HOST),
            port: DEFAULT_PORT,
            task_queue_prefix: String::from(DEFAULT_TASK_QUEUE_PREFIX),
            results_channel: String::from(DEFAULT_RESULTS_CHANNEL),
        }
    }
}

impl BrokerConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("REDIS_HOST").unwrap_or(String::from(DEFAULT_HOST));

        let port = match std::env::var("REDIS_PORT") {
            Ok(value) => match value.parse::<u16>() {
                Ok(port) => port,
                Err(err) => {
                    log::warn!("Invalid REDIS_PORT '{value}', using {DEFAULT_PORT}: {err}");
                    DEFAULT_PORT
                },
            },
            Err(_) => DEFAULT_PORT,
        };

        let task_queue_prefix = std::env::var("REDIS_TASK_QUEUE_PREFIX")
            .unwrap_or(String::from(DEFAULT_TASK_QUEUE_PREFIX));

        let results_channel = std::env::var("REDIS_RESULTS_CHANNEL")
            .unwrap_or(String::from(DEFAULT_RESULTS_CHANNEL));

        Self {
            host,
            port,
            task_queue_prefix,
            results_channel,
        }
    }

    /// The broker URL in the form the client library expects.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }

    /// The task queue belonging to one worker.
    pub fn task_queue(&self, worker_id: &str) -> String {
        format!("{}:{}", self.task_queue_prefix, worker_id)
    }

    /// The status key belonging to one worker.
    pub fn status_key(worker_id: &str) -> String {
        format!("{}:{}", WORKER_STATUS_PREFIX, worker_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_naming() {
        let config = BrokerConfig::default();
        assert_eq!(
            config.task_queue("worker-host-1"),
            "doc_processing_tasks:worker-host-1"
        );
        assert_eq!(
            BrokerConfig::status_key("worker-host-1"),
            "worker_status:worker-host-1"
        );
    }
}
