// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Correctness
#![deny(clippy::string_slice)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

pub mod config;
pub mod discovery;
pub mod errors;
pub mod export;
pub mod icontrol;
pub mod model;
pub mod ports;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{Configuration, Destination, Fidelity, Protocol, TopicMode};
pub use errors::{PipelineError, SourceError};
pub use model::{StatsTree, sanitize};
pub use scheduler::{Scheduler, TICK_ACK};
