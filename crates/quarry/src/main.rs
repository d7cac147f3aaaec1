//
// main.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::sync::Arc;

use adit::broker::Broker;
use adit::config::BrokerConfig;
use quarry::checkpoint;
use quarry::config::CoordinatorConfig;
use quarry::index::Coordinator;
use quarry::results;
use quarry::server;

fn main() {
    stdext::logger::initialize(None);

    let config = CoordinatorConfig::from_env();
    log::info!("Coordinator starting up");
    log::info!(
        "Expecting local documents in {}",
        config.uploads_path.display()
    );
    log::info!(
        "Index persistence path: {}",
        config.checkpoint_path.display()
    );

    let broker_config = BrokerConfig::from_env();
    let broker = match Broker::new(broker_config) {
        Ok(broker) => broker,
        Err(err) => {
            log::error!("Could not create the broker client: {err}");
            std::process::exit(1);
        },
    };

    let index = checkpoint::load(&config.checkpoint_path);
    let coordinator = Arc::new(Coordinator::new(broker, config, index));

    // Consume worker results in the background for the life of the server
    let listener = results::start(coordinator.clone());

    if let Err(err) = server::serve(coordinator.clone()) {
        log::error!("HTTP server exited unexpectedly: {err}");
    }

    log::info!("Coordinator shutting down");
    listener.stop();

    if let Err(err) = coordinator.save_checkpoint() {
        log::error!("Could not save the index checkpoint: {err}");
    }

    log::info!("Coordinator shutdown complete");
}
