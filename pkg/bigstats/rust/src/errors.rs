// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;

use thiserror::Error;

use crate::ports::RegistrationError;

/// Failures talking to the management API.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request to {path} failed: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned status {status}")]
    Status { path: String, status: u16 },
    #[error("could not decode {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("stats document for {locator} has no entry {key}")]
    MissingEntry { locator: String, key: String },
}

/// Which step of the tree build a fetch belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    ResourceStats,
    MemberList,
    MemberStats,
    DeviceStats,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPhase::ResourceStats => write!(f, "resource stats"),
            FetchPhase::MemberList => write!(f, "member list"),
            FetchPhase::MemberStats => write!(f, "member stats"),
            FetchPhase::DeviceStats => write!(f, "device stats"),
        }
    }
}

/// Errors that end the current tick. None of them outlive it.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("resource discovery failed: {0}")]
    Discovery(#[source] SourceError),
    #[error("fetching {phase} for {resource} failed: {source}")]
    Fetch {
        resource: String,
        phase: FetchPhase,
        #[source]
        source: SourceError,
    },
    #[error("fidelity '{0}' is not implemented")]
    UnimplementedFidelity(String),
    #[error("unrecognized export protocol '{0}'")]
    UnrecognizedProtocol(String),
    #[error("configuration store unavailable: {0}")]
    ConfigStore(String),
    #[error("task registration failed: {0}")]
    Registration(#[source] RegistrationError),
}

/// A single failed delivery to an export destination.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("http push to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} rejected the push with status {status}: {body}")]
    Rejected {
        url: String,
        status: u16,
        body: String,
    },
    #[error("statsd sink {target} unusable: {reason}")]
    Statsd { target: String, reason: String },
    #[error("publish to topic {topic} failed: {reason}")]
    Topic { topic: String, reason: String },
    #[error("could not serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
