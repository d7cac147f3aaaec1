/*
 * error.rs
 *
 * Copyright (C) 2025 Posit Software, PBC. All rights reserved.
 *
 */

use std::fmt;

#[derive(Debug)]
pub enum Error {
    Connect(redis::RedisError),
    Command(String, redis::RedisError),
    EncodePayload(serde_json::Error),
    DecodePayload(String, serde_json::Error),
    NoWorkersAvailable,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Connect(err) => {
                write!(f, "Could not connect to the broker: {}", err)
            },
            Error::Command(op, err) => {
                write!(f, "Broker command '{}' failed: {}", op, err)
            },
            Error::EncodePayload(err) => {
                write!(f, "Cannot serialize payload: {}", err)
            },
            Error::DecodePayload(raw, err) => {
                write!(f, "Invalid payload: {} (raw: {})", err, raw)
            },
            Error::NoWorkersAvailable => {
                write!(f, "No live workers are registered with the broker")
            },
        }
    }
}

impl std::error::Error for Error {}
