//
// lib.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

pub mod config;
pub mod heartbeat;
pub mod identity;
pub mod processor;
