// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! In-memory stats tree and the envelope handed to exporters.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::config::Configuration;

/// Management path used to fetch a resource's stats, e.g.
/// `/mgmt/tm/ltm/virtual/~Common~vs1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocator(String);

impl ResourceLocator {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// Last path segment, used by the v14+ stats document keys.
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub partition: String,
    pub sub_path: Option<String>,
    /// `address:port`, unique within a partition.
    pub destination: String,
    pub pool_name: Option<String>,
    pub stats_locator: ResourceLocator,
}

impl ResourceDescriptor {
    pub fn service_path(&self) -> String {
        service_path(&self.partition, self.sub_path.as_deref())
    }

    /// `servicePath/destination`, used to label log lines and errors.
    pub fn label(&self) -> String {
        format!("{}/{}", self.service_path(), self.destination)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMemberDescriptor {
    pub name: String,
    pub stats_locator: ResourceLocator,
}

pub fn service_path(partition: &str, sub_path: Option<&str>) -> String {
    match sub_path {
        Some(sub) if !sub.is_empty() => format!("{partition}/{sub}"),
        _ => partition.to_string(),
    }
}

/// Make a string safe for use as one segment of a dotted namespace or a
/// topic name.
pub fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '.' | '/' => '-',
            ':' => '_',
            other => other,
        })
        .collect()
}

/// Counter name to value for one resource at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsSnapshot(BTreeMap<String, u64>);

impl StatsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dots in counter names become underscores.
    pub fn insert(&mut self, counter: &str, value: u64) {
        self.0.insert(counter.replace('.', "_"), value);
    }

    pub fn get(&self, counter: &str) -> Option<u64> {
        self.0.get(counter).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, u64)> for StatsSnapshot {
    fn from_iter<I: IntoIterator<Item = (&'a str, u64)>>(iter: I) -> Self {
        let mut snapshot = StatsSnapshot::new();
        for (counter, value) in iter {
            snapshot.insert(counter, value);
        }
        snapshot
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEntry {
    Snapshot(StatsSnapshot),
    WithPool {
        stats: StatsSnapshot,
        pool_name: String,
        members: Vec<(String, StatsSnapshot)>,
    },
}

impl ServiceEntry {
    pub fn stats(&self) -> &StatsSnapshot {
        match self {
            ServiceEntry::Snapshot(stats) | ServiceEntry::WithPool { stats, .. } => stats,
        }
    }

    pub fn members(&self) -> &[(String, StatsSnapshot)] {
        match self {
            ServiceEntry::Snapshot(_) => &[],
            ServiceEntry::WithPool { members, .. } => members,
        }
    }
}

struct MemberEntry<'a>(&'a str, &'a StatsSnapshot);

impl Serialize for MemberEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0, self.1)?;
        map.end()
    }
}

// A pooled entry is its own counters plus one extra key, the pool name,
// holding `[{member: counters}, ...]`.
impl Serialize for ServiceEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ServiceEntry::Snapshot(stats) => stats.serialize(serializer),
            ServiceEntry::WithPool {
                stats,
                pool_name,
                members,
            } => {
                let mut map = serializer.serialize_map(Some(stats.len() + 1))?;
                for (counter, value) in stats.iter() {
                    map.serialize_entry(counter, &value)?;
                }
                let members: Vec<MemberEntry<'_>> = members
                    .iter()
                    .map(|(name, stats)| MemberEntry(name, stats))
                    .collect();
                map.serialize_entry(pool_name, &members)?;
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub memory: StatsSnapshot,
    /// Keyed `cpu<N>`.
    #[serde(flatten)]
    pub cpus: BTreeMap<String, StatsSnapshot>,
}

/// servicePath -> destination -> entry
pub type ServiceMap = BTreeMap<String, BTreeMap<String, ServiceEntry>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsTree {
    pub device: DeviceStats,
    pub services: ServiceMap,
}

impl StatsTree {
    /// Insert an entry; an existing entry under the same key is replaced.
    pub fn insert_service(
        &mut self,
        service_path: String,
        destination: String,
        entry: ServiceEntry,
    ) -> Option<ServiceEntry> {
        self.services
            .entry(service_path)
            .or_default()
            .insert(destination, entry)
    }

    pub fn resource_count(&self) -> usize {
        self.services.values().map(BTreeMap::len).sum()
    }
}

/// Everything one export attempt needs.
#[derive(Debug, Clone)]
pub struct ExportEnvelope {
    pub config: Configuration,
    /// Sanitized device identifier.
    pub hostname: String,
    pub tree: StatsTree,
}

impl ExportEnvelope {
    /// The `stats` object: `{hostname: tree}`.
    pub fn stats_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut body = serde_json::Map::new();
        body.insert(self.hostname.clone(), serde_json::to_value(&self.tree)?);
        Ok(serde_json::Value::Object(body))
    }
}
