/*
 * mod.rs
 *
 * Copyright (C) 2025 Posit Software, PBC. All rights reserved.
 *
 */

pub mod document_task;
pub mod partial_index;
