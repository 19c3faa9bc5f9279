// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Ships a finished stats tree to the configured destination.
//!
//! Each protocol reshapes the same tree its own way: HTTP(S) posts the whole
//! `stats` object, StatsD flattens it into dotted gauges, and Kafka splits it
//! into one or more topic messages. Delivery failures are logged per
//! destination and never retried; they do not fail the tick.

pub mod http;
pub mod kafka;
pub mod statsd;

use std::sync::Arc;

use log::info;

use crate::config::Protocol;
use crate::errors::PipelineError;
use crate::model::ExportEnvelope;
use crate::ports::TopicPublisher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub protocol: Protocol,
    /// Requests, datagrams or messages handed to the transport.
    pub attempted: usize,
    /// Deliveries known to have failed by the time dispatch returned.
    pub failed: usize,
}

pub struct ExportDispatcher {
    http: reqwest::Client,
    publisher: Arc<dyn TopicPublisher>,
}

impl ExportDispatcher {
    pub fn new(tls_verify: bool, publisher: Arc<dyn TopicPublisher>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!tls_verify)
            .build()?;
        Ok(Self { http, publisher })
    }

    pub async fn dispatch(&self, envelope: &ExportEnvelope) -> Result<DispatchSummary, PipelineError> {
        let destination = &envelope.config.destination;
        let protocol = destination
            .protocol()
            .ok_or_else(|| PipelineError::UnrecognizedProtocol(destination.protocol.clone()))?;

        let summary = match protocol {
            Protocol::Http | Protocol::Https => http::push(&self.http, protocol, envelope).await,
            Protocol::Statsd => statsd::send(envelope),
            Protocol::Kafka => kafka::publish(Arc::clone(&self.publisher), envelope),
        };
        info!(
            "{} export to {}:{}: {} attempted, {} failed",
            summary.protocol,
            destination.address,
            destination.port,
            summary.attempted,
            summary.failed
        );
        Ok(summary)
    }
}
