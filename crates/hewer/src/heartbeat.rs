//
// heartbeat.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::time::Duration;

use adit::broker::Broker;
use adit::config::BrokerConfig;
use stdext::spawn;
use sysinfo::ProcessesToUpdate;
use sysinfo::System;

/// How often status is sampled and the TTL refreshed.
const INTERVAL: Duration = Duration::from_secs(2);

/// Minimum CPU%/RAM% movement that counts as a change worth rewriting.
const CHANGE_THRESHOLD: f64 = 0.01;

/// Starts the heartbeat emitter on its own thread. The thread owns its own
/// broker connection so a blocking pop on the task loop can never delay a
/// heartbeat; it dies with the process.
pub fn start(config: BrokerConfig, worker_id: String) {
    spawn!("hewer-heartbeat", move || {
        let broker = match Broker::new(config) {
            Ok(broker) => broker,
            Err(err) => {
                log::error!("Heartbeat disabled, could not create broker client: {err}");
                return;
            },
        };

        run(broker, worker_id);
    });
}

/// Decides whether the status hash fields should be rewritten: on the first
/// tick always, afterwards only when CPU or RAM moved meaningfully. The TTL
/// is refreshed either way.
fn should_write(previous: Option<(f64, f64)>, cpu: f64, ram: f64) -> bool {
    match previous {
        None => true,
        Some((previous_cpu, previous_ram)) => {
            (cpu - previous_cpu).abs() >= CHANGE_THRESHOLD ||
                (ram - previous_ram).abs() >= CHANGE_THRESHOLD
        },
    }
}

/// Samples this process's CPU% (relative to one core) and RAM% every tick
/// and writes them to the worker's status record with a TTL of three
/// intervals, so a missed write or two doesn't declare the worker dead.
/// Does not return.
fn run(broker: Broker, worker_id: String) {
    let ttl = INTERVAL * 3;

    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(err) => {
            log::error!("Heartbeat disabled, could not determine our pid: {err}");
            return;
        },
    };

    let mut system = System::new();

    // Prime the CPU sampler; the first measurement needs two refreshes a
    // short interval apart.
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);

    let mut previous: Option<(f64, f64)> = None;

    loop {
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system.refresh_memory();

        let Some(process) = system.process(pid) else {
            log::warn!("Heartbeat could not find our own process entry");
            std::thread::sleep(INTERVAL);
            continue;
        };

        let cpu = process.cpu_usage() as f64;
        let total_memory = system.total_memory();
        let ram = if total_memory == 0 {
            0.0
        } else {
            process.memory() as f64 / total_memory as f64 * 100.0
        };

        let write_fields = should_write(previous, cpu, ram);

        match broker.set_status(&worker_id, cpu, ram, ttl, write_fields) {
            Ok(()) => {
                if write_fields {
                    log::debug!("Reported status for {worker_id}: CPU {cpu:.2}%, RAM {ram:.2}%");
                    previous = Some((cpu, ram));
                } else {
                    log::trace!("Status for {worker_id} largely unchanged; TTL refreshed");
                }
            },
            Err(err) => {
                log::warn!("Could not report status for {worker_id}: {err}");
            },
        }

        std::thread::sleep(INTERVAL);
    }
}
