//
// spawn.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

/// Spawns a named thread. Use this instead of `std::thread::spawn` so that
/// threads show up with a useful name in logs and debuggers.
#[macro_export]
macro_rules! spawn {
    ($name:expr, $body:expr) => {{
        std::thread::Builder::new()
            .name($name.into())
            .spawn($body)
            .unwrap()
    }};
}
