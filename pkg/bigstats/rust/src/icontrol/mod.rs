// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Wire types for the management REST API and the conversions from its
//! loosely typed stats documents into [`StatsSnapshot`]s.

mod client;

use std::collections::BTreeMap;

use log::warn;
use serde::Deserialize;
use serde::de::IgnoredAny;

use crate::errors::SourceError;
use crate::model::{DeviceStats, ResourceLocator, StatsSnapshot};

pub use client::IcontrolClient;

/// Host prefix the API uses in stats document keys, whatever address it was
/// reached on.
pub const STATS_KEY_HOST: &str = "https://localhost";

pub const VIRTUAL_COUNTERS: &[&str] = &[
    "clientside.curConns",
    "clientside.maxConns",
    "clientside.totConns",
    "clientside.bitsIn",
    "clientside.bitsOut",
    "clientside.pktsIn",
    "clientside.pktsOut",
];

pub const MEMBER_COUNTERS: &[&str] = &[
    "serverside.curConns",
    "serverside.maxConns",
    "serverside.totConns",
    "serverside.bitsIn",
    "serverside.bitsOut",
    "serverside.pktsIn",
    "serverside.pktsOut",
];

const MONITOR_STATUS: &str = "monitorStatus";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Value {
        value: serde_json::Number,
    },
    Description {
        description: String,
    },
    Nested {
        #[serde(rename = "nestedStats")]
        nested_stats: NestedStats,
    },
    Other(IgnoredAny),
}

impl StatValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            StatValue::Value { value } => value.as_u64().or_else(|| {
                value
                    .as_f64()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .map(|v| v as u64)
            }),
            _ => None,
        }
    }

    pub fn as_description(&self) -> Option<&str> {
        match self {
            StatValue::Description { description } => Some(description),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&NestedStats> {
        match self {
            StatValue::Nested { nested_stats } => Some(nested_stats),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NestedStats {
    #[serde(default)]
    pub entries: BTreeMap<String, StatValue>,
}

/// Body of any `.../stats` or `host-info` response.
pub type StatsDocument = NestedStats;

#[derive(Debug, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub partition: String,
    #[serde(default)]
    pub sub_path: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub pool: Option<String>,
    #[serde(default)]
    pub self_link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub self_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalSettings {
    #[serde(default)]
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub hostname: String,
    pub version: String,
}

/// Software version of the managed host, as far as the stats key layout is
/// concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostVersion {
    major: Option<u32>,
}

impl HostVersion {
    pub fn parse(raw: Option<&str>) -> Self {
        let major = raw.and_then(|v| v.trim().split('.').next()?.parse::<u32>().ok());
        if major.is_none() {
            warn!(
                "could not parse host version {:?}, assuming pre-v14 stats layout",
                raw.unwrap_or_default()
            );
        }
        Self { major }
    }

    /// From v14 on, stats entries are keyed one level deeper.
    pub fn nested_keys(&self) -> bool {
        self.major.is_some_and(|major| major >= 14)
    }
}

pub fn stats_entry_key(locator: &ResourceLocator, version: HostVersion) -> String {
    if version.nested_keys() {
        format!(
            "{STATS_KEY_HOST}{}/{}/stats",
            locator.path(),
            locator.last_segment()
        )
    } else {
        format!("{STATS_KEY_HOST}{}/stats", locator.path())
    }
}

/// Pick the resource's entry out of a stats document. A document with a
/// single entry under an unexpected key is accepted as-is.
fn resource_entries<'a>(
    doc: &'a StatsDocument,
    locator: &ResourceLocator,
    version: HostVersion,
) -> Result<&'a NestedStats, SourceError> {
    let key = stats_entry_key(locator, version);
    let entry = match doc.entries.get(&key) {
        Some(entry) => Some(entry),
        None if doc.entries.len() == 1 => doc.entries.values().next(),
        None => None,
    };
    entry
        .and_then(StatValue::as_nested)
        .ok_or_else(|| SourceError::MissingEntry {
            locator: locator.path().to_string(),
            key,
        })
}

fn pick(entries: &NestedStats, counters: &[&str]) -> StatsSnapshot {
    let mut snapshot = StatsSnapshot::new();
    for counter in counters {
        if let Some(value) = entries.entries.get(*counter).and_then(StatValue::as_u64) {
            snapshot.insert(counter, value);
        }
    }
    snapshot
}

pub fn virtual_snapshot(
    doc: &StatsDocument,
    locator: &ResourceLocator,
    version: HostVersion,
) -> Result<StatsSnapshot, SourceError> {
    Ok(pick(resource_entries(doc, locator, version)?, VIRTUAL_COUNTERS))
}

pub fn member_snapshot(
    doc: &StatsDocument,
    locator: &ResourceLocator,
    version: HostVersion,
) -> Result<StatsSnapshot, SourceError> {
    let entries = resource_entries(doc, locator, version)?;
    let mut snapshot = pick(entries, MEMBER_COUNTERS);
    if let Some(status) = entries.entries.get(MONITOR_STATUS) {
        let up = status.as_description().is_some_and(|d| d == "up");
        snapshot.insert(MONITOR_STATUS, u64::from(up));
    }
    Ok(snapshot)
}

/// Memory counters plus one snapshot per core from a `host-info` document.
pub fn device_stats(doc: &StatsDocument) -> DeviceStats {
    let mut device = DeviceStats::default();
    for host in doc.entries.values().filter_map(StatValue::as_nested) {
        for (name, value) in &host.entries {
            match name.as_str() {
                "memoryTotal" | "memoryUsed" => {
                    if let Some(v) = value.as_u64() {
                        device.memory.insert(name, v);
                    }
                }
                _ if name.ends_with("cpuInfo") => {
                    if let Some(cpus) = value.as_nested() {
                        collect_cpus(cpus, &mut device);
                    }
                }
                _ => {}
            }
        }
    }
    device
}

fn collect_cpus(cpus: &NestedStats, device: &mut DeviceStats) {
    for cpu in cpus.entries.values().filter_map(StatValue::as_nested) {
        let Some(id) = cpu.entries.get("cpuId").and_then(StatValue::as_u64) else {
            continue;
        };
        let snapshot = cpu
            .entries
            .iter()
            .filter(|(name, _)| name.as_str() != "cpuId")
            .filter_map(|(name, value)| value.as_u64().map(|v| (name.as_str(), v)))
            .collect();
        device.cpus.insert(format!("cpu{id}"), snapshot);
    }
}

/// `Version` description from a `sys/version` document.
pub fn version_from_document(doc: &StatsDocument) -> Option<String> {
    doc.entries
        .values()
        .filter_map(StatValue::as_nested)
        .find_map(|nested| nested.entries.get("Version")?.as_description())
        .map(str::to_string)
}
