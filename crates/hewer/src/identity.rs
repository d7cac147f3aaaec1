//
// identity.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

/// A stable identity for this worker process, derived from host and pid.
/// Task queue and status key names are both keyed by this id.
pub fn worker_id() -> String {
    let hostname = sysinfo::System::host_name().unwrap_or(String::from("localhost"));
    format!("worker-{hostname}-{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_id_shape() {
        let id = worker_id();
        assert!(id.starts_with("worker-"));
        assert!(id.ends_with(&std::process::id().to_string()));
    }
}
