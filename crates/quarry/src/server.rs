//
// server.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::get;
use actix_web::http::StatusCode;
use actix_web::post;
use actix_web::web;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use adit::wire::document_task::DocumentTask;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

use crate::dispatch;
use crate::index::Coordinator;

#[derive(Deserialize)]
struct TriggerParams {
    /// Optional directory to scan instead of the configured uploads path.
    path: Option<String>,
}

#[derive(Deserialize)]
struct SearchQuery {
    term: String,
}

#[derive(Serialize)]
struct SearchResponse {
    docs: Vec<(String, u64)>,
}

#[derive(Serialize)]
struct StatusResponse {
    message: String,
    details: Value,
}

#[derive(Serialize)]
struct WorkerStatusEntry {
    worker_id: String,
    cpu_percent: Option<f64>,
    ram_percent: Option<f64>,
    status_ttl_seconds: Option<i64>,
    queue_length: Option<i64>,
}

#[derive(Serialize)]
struct AllWorkersStatus {
    workers: Vec<WorkerStatusEntry>,
}

/// The error shape all endpoints share.
fn detail(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "detail": message.into() }))
}

/// Runs the HTTP API on the calling thread until the server shuts down
/// (e.g. on SIGINT).
#[tokio::main]
pub async fn serve(coordinator: Arc<Coordinator>) -> anyhow::Result<()> {
    let bind_address = coordinator.config().bind_address.clone();
    let data = web::Data::from(coordinator);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .service(trigger_local_indexing)
            .service(search)
            .service(index_status)
            .service(save_index)
            .service(load_index)
            .service(healthz)
            .service(workers_status)
    })
    .bind(bind_address.as_str())?;

    log::info!("Coordinator API listening on {bind_address}");

    Ok(server.run().await?)
}

/// Scans a directory of `.txt` documents and dispatches an indexing task for
/// each. Responds 202 with the per-file outcome; files that cannot be read,
/// are empty, or fail to dispatch are reported individually.
#[post("/trigger-local-indexing/")]
async fn trigger_local_indexing(
    params: web::Query<TriggerParams>,
    coordinator: web::Data<Coordinator>,
) -> HttpResponse {
    let scan_path = match &params.path {
        Some(path) => PathBuf::from(path),
        None => coordinator.config().uploads_path.clone(),
    };

    log::info!("Triggering local indexing from {}", scan_path.display());

    let entries = match std::fs::read_dir(&scan_path) {
        Ok(entries) => entries,
        Err(err) => {
            log::error!(
                "Local uploads path not found or unreadable: {}: {err}",
                scan_path.display()
            );
            return detail(
                StatusCode::NOT_FOUND,
                format!("Local uploads directory not found: {}", scan_path.display()),
            );
        },
    };

    let mut files_found = 0;
    let mut successful: Vec<String> = Vec::new();
    let mut failed: Vec<(String, String)> = Vec::new();

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(doc_id) = file_name.to_str() else {
            continue;
        };
        if !doc_id.ends_with(".txt") {
            continue;
        }

        files_found += 1;
        let doc_id = String::from(doc_id);

        let content = match std::fs::read_to_string(entry.path()) {
            Ok(content) => content,
            Err(err) => {
                log::error!("Error reading local file {doc_id}: {err}");
                failed.push((doc_id, format!("Could not read file: {err}")));
                continue;
            },
        };

        if content.trim().is_empty() {
            log::warn!("Document {doc_id} is empty or contains only whitespace; skipping");
            failed.push((doc_id, String::from("Skipped: file is empty or whitespace only")));
            continue;
        }

        let task = DocumentTask {
            doc_id: doc_id.clone(),
            content,
            language: None,
        };

        match dispatch::dispatch_document(&coordinator, task) {
            Ok(queue_length) => {
                log::info!("Dispatched task for {doc_id}; queue length now {queue_length}");
                successful.push(doc_id);
            },
            Err(err) => {
                log::warn!("Failed to dispatch task for {doc_id}: {err}");
                failed.push((doc_id, format!("Dispatch failed: {err}")));
            },
        }
    }

    let pending = coordinator.pending_count();

    let message = if files_found == 0 {
        format!(
            "No .txt files found in {}. Nothing to index.",
            scan_path.display()
        )
    } else {
        format!(
            "Found {files_found} .txt files. Dispatched {} for indexing. {} file(s) failed.",
            successful.len(),
            failed.len()
        )
    };

    HttpResponse::Accepted().json(StatusResponse {
        message,
        details: json!({
            "successful_dispatches": successful,
            "failed_files": failed,
            "docs_currently_pending": pending,
        }),
    })
}

/// Single-term search over the global index.
#[post("/search/")]
async fn search(
    query: web::Json<SearchQuery>,
    coordinator: web::Data<Coordinator>,
) -> HttpResponse {
    if query.term.trim().is_empty() {
        return detail(StatusCode::BAD_REQUEST, "Search term cannot be empty.");
    }

    let docs = coordinator.search(&query.term);
    HttpResponse::Ok().json(SearchResponse { docs })
}

#[get("/index-status/")]
async fn index_status(coordinator: web::Data<Coordinator>) -> HttpResponse {
    let (total_terms, pending) = coordinator.status();

    HttpResponse::Ok().json(StatusResponse {
        message: String::from("Current index status."),
        details: json!({
            "total_terms_in_index": total_terms,
            "documents_pending_results": pending,
        }),
    })
}

#[post("/index/save/")]
async fn save_index(coordinator: web::Data<Coordinator>) -> HttpResponse {
    match coordinator.save_checkpoint() {
        Ok(()) => HttpResponse::Ok().json(StatusResponse {
            message: format!(
                "Global index saved to {}",
                coordinator.config().checkpoint_path.display()
            ),
            details: json!({}),
        }),
        Err(err) => {
            log::error!("Failed to save index: {err}");
            detail(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to save index: {err}"),
            )
        },
    }
}

/// Reloads the index from the checkpoint, replacing in-memory state and
/// clearing the pending set.
#[post("/index/load/")]
async fn load_index(coordinator: web::Data<Coordinator>) -> HttpResponse {
    let path = coordinator.config().checkpoint_path.clone();
    let index = crate::checkpoint::load(&path);
    let terms = coordinator.replace_index(index);

    HttpResponse::Ok().json(StatusResponse {
        message: format!(
            "Global index reloaded from {}. {terms} terms loaded.",
            path.display()
        ),
        details: json!({}),
    })
}

/// Liveness probe.
#[get("/healthz")]
async fn healthz() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "message": "Coordinator is running",
    }))
}

/// Current status of all registered workers, sorted by worker id.
#[get("/workers/status/")]
async fn workers_status(coordinator: web::Data<Coordinator>) -> HttpResponse {
    let workers = match coordinator.broker().list_workers() {
        Ok(workers) => workers,
        Err(err @ adit::Error::Connect(_)) => {
            log::error!("Cannot get worker statuses: {err}");
            return detail(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable, cannot connect to the broker.",
            );
        },
        Err(err) => {
            log::error!("Broker error while fetching worker statuses: {err}");
            return detail(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error communicating with the broker: {err}"),
            );
        },
    };

    let mut entries = Vec::with_capacity(workers.len());
    for worker_id in workers {
        let load = match coordinator.broker().worker_load(&worker_id) {
            Ok(load) => load,
            Err(err) => {
                log::error!("Broker error while fetching worker statuses: {err}");
                return detail(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Error communicating with the broker: {err}"),
                );
            },
        };

        entries.push(WorkerStatusEntry {
            worker_id: load.worker_id,
            cpu_percent: load.cpu,
            ram_percent: load.ram,
            // -1 (no expiry) and -2 (gone) are reported as null
            status_ttl_seconds: (load.ttl_seconds >= 0).then_some(load.ttl_seconds),
            queue_length: load.queue_length,
        });
    }

    entries.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));

    HttpResponse::Ok().json(AllWorkersStatus { workers: entries })
}
