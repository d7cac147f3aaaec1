//
// main.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::time::Duration;

use adit::broker::Broker;
use adit::config::BrokerConfig;
use hewer::config::WorkerConfig;
use hewer::heartbeat;
use hewer::identity;
use hewer::processor;

/// How long each blocking pop waits before giving the loop a turn.
const POP_TIMEOUT: Duration = Duration::from_secs(5);

/// Backoff after a broker failure in the main loop.
const RETRY_DELAY: Duration = Duration::from_secs(5);

fn main() {
    stdext::logger::initialize(None);

    let broker_config = BrokerConfig::from_env();
    let config = WorkerConfig::from_env();
    let worker_id = identity::worker_id();

    log::info!(
        "Worker {worker_id} starting; default processing language: {}",
        config.language.as_tag()
    );
    log::info!(
        "Waiting for tasks on queue '{}'",
        broker_config.task_queue(&worker_id)
    );

    let broker = match Broker::new(broker_config.clone()) {
        Ok(broker) => broker,
        Err(err) => {
            log::error!("Invalid broker configuration: {err}");
            std::process::exit(1);
        },
    };

    // Wait until the broker is reachable before advertising ourselves
    while let Err(err) = broker.ping() {
        log::warn!("Broker not reachable yet, retrying in 5s: {err}");
        std::thread::sleep(RETRY_DELAY);
    }

    heartbeat::start(broker_config, worker_id.clone());
    log::info!("Status reporting started for {worker_id}");

    loop {
        match broker.pop_task(&worker_id, POP_TIMEOUT) {
            Ok(Some(task)) => {
                processor::process_task(&broker, task, config.language, &worker_id);
            },
            Ok(None) => {
                log::trace!("No task received in the last 5s, still waiting");
            },
            Err(err @ adit::Error::DecodePayload(..)) => {
                // One bad task; drop it and keep consuming the queue
                log::error!("Dropping malformed task: {err}");
            },
            Err(err) => {
                log::error!("Broker error in main loop, retrying in 5s: {err}");
                std::thread::sleep(RETRY_DELAY);
            },
        }
    }
}
