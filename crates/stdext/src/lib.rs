//
// lib.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

pub mod logger;
pub mod result;
pub mod spawn;

pub use crate::result::OrLog;
