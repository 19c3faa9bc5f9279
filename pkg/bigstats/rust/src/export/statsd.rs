// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Flattens the tree into `<hostname>.device.*` and `<hostname>.services.*`
//! gauges and sends one datagram per gauge.

use std::net::UdpSocket;

use cadence::prelude::*;
use cadence::{StatsdClient, UdpMetricSink};
use log::{debug, error, warn};

use super::DispatchSummary;
use crate::config::{Destination, Protocol};
use crate::errors::DeliveryError;
use crate::model::{ExportEnvelope, StatsSnapshot, StatsTree, sanitize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gauge {
    /// Dotted name below the hostname prefix.
    pub namespace: String,
    pub value: u64,
}

fn push_snapshot(gauges: &mut Vec<Gauge>, prefix: &str, snapshot: &StatsSnapshot) {
    for (counter, value) in snapshot.iter() {
        gauges.push(Gauge {
            namespace: format!("{prefix}.{}", sanitize(counter)),
            value,
        });
    }
}

/// `services.<partition>[.<subPath>]` for a service path.
fn service_prefix(service_path: &str) -> String {
    match service_path.split_once('/') {
        Some((partition, sub_path)) => {
            format!("services.{}.{}", sanitize(partition), sanitize(sub_path))
        }
        None => format!("services.{}", sanitize(service_path)),
    }
}

pub fn flatten(tree: &StatsTree) -> Vec<Gauge> {
    let mut gauges = Vec::new();

    push_snapshot(&mut gauges, "device.memory", &tree.device.memory);
    for (cpu, snapshot) in &tree.device.cpus {
        push_snapshot(&mut gauges, &format!("device.{}", sanitize(cpu)), snapshot);
    }

    for (service_path, resources) in &tree.services {
        let prefix = service_prefix(service_path);
        for (destination, entry) in resources {
            let resource_prefix = format!("{prefix}.{}", sanitize(destination));
            push_snapshot(&mut gauges, &resource_prefix, entry.stats());
            for (member, snapshot) in entry.members() {
                push_snapshot(
                    &mut gauges,
                    &format!("{resource_prefix}.{}", sanitize(member)),
                    snapshot,
                );
            }
        }
    }
    gauges
}

fn client_for(destination: &Destination, hostname: &str) -> Result<StatsdClient, DeliveryError> {
    let target = format!("{}:{}", destination.address, destination.port);
    let unusable = |reason: String| DeliveryError::Statsd {
        target: target.clone(),
        reason,
    };

    let port = u16::try_from(destination.port).map_err(|e| unusable(e.to_string()))?;
    let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| unusable(e.to_string()))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| unusable(e.to_string()))?;
    let sink = UdpMetricSink::from((destination.address.as_str(), port), socket)
        .map_err(|e| unusable(e.to_string()))?;
    Ok(StatsdClient::from_sink(hostname, sink))
}

pub fn send(envelope: &ExportEnvelope) -> DispatchSummary {
    let gauges = flatten(&envelope.tree);
    let mut summary = DispatchSummary {
        protocol: Protocol::Statsd,
        attempted: gauges.len(),
        failed: 0,
    };

    let client = match client_for(&envelope.config.destination, &envelope.hostname) {
        Ok(client) => client,
        Err(e) => {
            error!("{e}");
            summary.failed = gauges.len();
            return summary;
        }
    };

    for gauge in &gauges {
        if let Err(e) = client.gauge(&gauge.namespace, gauge.value) {
            warn!("gauge {} not sent: {e}", gauge.namespace);
            summary.failed += 1;
        }
    }
    debug!("sent {} gauges for {}", gauges.len(), envelope.hostname);
    summary
}
