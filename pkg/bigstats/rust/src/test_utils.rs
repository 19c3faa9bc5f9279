// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! In-memory stand-ins for every collaborator port.
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::config::Configuration;
use crate::discovery::pool_locator;
use crate::errors::{DeliveryError, PipelineError, SourceError};
use crate::icontrol::{
    DeviceInfo, HostVersion, MemberItem, StatsDocument, VirtualItem, stats_entry_key,
};
use crate::model::ResourceLocator;
use crate::ports::{
    ConfigStore, RegistrationError, StatsSource, TaskId, TaskScheduler, TaskSpec, TopicPublisher,
};

pub fn virtual_locator(partition: &str, destination: &str) -> String {
    format!("/mgmt/tm/ltm/virtual/~{partition}~vs-{destination}")
}

pub fn member_locator(pool: &str, member: &str) -> String {
    format!("{}/members/{member}", pool_locator(pool).path())
}

pub fn virtual_item(
    partition: &str,
    sub_path: Option<&str>,
    destination: &str,
    pool: Option<&str>,
) -> VirtualItem {
    VirtualItem {
        name: format!("vs-{destination}"),
        partition: partition.to_string(),
        sub_path: sub_path.map(str::to_string),
        destination: Some(format!("/{partition}/{destination}")),
        pool: pool.map(str::to_string),
        self_link: Some(format!(
            "https://localhost{}?ver=15.1.0",
            virtual_locator(partition, destination)
        )),
    }
}

#[derive(Default, Clone)]
struct CannedStats {
    counters: Vec<(String, u64)>,
    monitor_up: Option<bool>,
}

pub struct FakeStatsSource {
    hostname: String,
    version: String,
    virtuals: Vec<VirtualItem>,
    members: HashMap<String, Vec<MemberItem>>,
    stats: HashMap<String, CannedStats>,
    failing: HashSet<String>,
    listing_fails: bool,
    device_fails: bool,
    pub listings: AtomicUsize,
    pub virtual_fetches: AtomicUsize,
    pub member_fetches: AtomicUsize,
    pub member_list_fetches: AtomicUsize,
    pub device_fetches: AtomicUsize,
}

impl Default for FakeStatsSource {
    fn default() -> Self {
        Self {
            hostname: "bigip1.example.com".to_string(),
            version: "15.1.0".to_string(),
            virtuals: Vec::new(),
            members: HashMap::new(),
            stats: HashMap::new(),
            failing: HashSet::new(),
            listing_fails: false,
            device_fails: false,
            listings: AtomicUsize::new(0),
            virtual_fetches: AtomicUsize::new(0),
            member_fetches: AtomicUsize::new(0),
            member_list_fetches: AtomicUsize::new(0),
            device_fetches: AtomicUsize::new(0),
        }
    }
}

impl FakeStatsSource {
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_virtual(
        mut self,
        partition: &str,
        sub_path: Option<&str>,
        destination: &str,
        pool: Option<&str>,
        counters: &[(&str, u64)],
    ) -> Self {
        self.virtuals
            .push(virtual_item(partition, sub_path, destination, pool));
        self.stats.insert(
            virtual_locator(partition, destination),
            CannedStats {
                counters: counters.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                monitor_up: None,
            },
        );
        self
    }

    pub fn with_members(mut self, pool: &str, names: &[&str]) -> Self {
        for name in names {
            self = self.with_member(pool, name, &[], true);
        }
        self
    }

    pub fn with_member(mut self, pool: &str, name: &str, counters: &[(&str, u64)], up: bool) -> Self {
        let locator = member_locator(pool, name);
        self.members
            .entry(pool_locator(pool).path().to_string())
            .or_default()
            .push(MemberItem {
                name: name.to_string(),
                self_link: Some(format!("https://localhost{locator}?ver=15.1.0")),
            });
        self.stats.insert(
            locator,
            CannedStats {
                counters: counters.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                monitor_up: Some(up),
            },
        );
        self
    }

    pub fn fail_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    pub fn fail_device(mut self) -> Self {
        self.device_fails = true;
        self
    }

    pub fn fail_locator(mut self, locator: &str) -> Self {
        self.failing.insert(locator.to_string());
        self
    }

    pub fn total_fetches(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
            + self.virtual_fetches.load(Ordering::SeqCst)
            + self.member_fetches.load(Ordering::SeqCst)
            + self.member_list_fetches.load(Ordering::SeqCst)
            + self.device_fetches.load(Ordering::SeqCst)
    }

    fn unavailable(path: &str) -> SourceError {
        SourceError::Status {
            path: path.to_string(),
            status: 503,
        }
    }
}

#[async_trait]
impl StatsSource for FakeStatsSource {
    async fn device_info(&self) -> Result<DeviceInfo, SourceError> {
        Ok(DeviceInfo {
            hostname: self.hostname.clone(),
            version: self.version.clone(),
        })
    }

    async fn list_virtual_servers(&self) -> Result<Vec<VirtualItem>, SourceError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.listing_fails {
            return Err(Self::unavailable("/mgmt/tm/ltm/virtual"));
        }
        Ok(self.virtuals.clone())
    }

    async fn list_pool_members(
        &self,
        pool: &ResourceLocator,
    ) -> Result<Vec<MemberItem>, SourceError> {
        self.member_list_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(pool.path()) {
            return Err(Self::unavailable(pool.path()));
        }
        Ok(self.members.get(pool.path()).cloned().unwrap_or_default())
    }

    async fn fetch_stats(&self, locator: &ResourceLocator) -> Result<StatsDocument, SourceError> {
        if locator.path().contains("/members/") {
            self.member_fetches.fetch_add(1, Ordering::SeqCst);
        } else {
            self.virtual_fetches.fetch_add(1, Ordering::SeqCst);
        }
        // Yield so sibling fetches interleave.
        tokio::task::yield_now().await;
        if self.failing.contains(locator.path()) {
            return Err(Self::unavailable(locator.path()));
        }

        let canned = self.stats.get(locator.path()).cloned().unwrap_or_default();
        let mut entries = serde_json::Map::new();
        for (name, value) in canned.counters {
            entries.insert(name, json!({ "value": value }));
        }
        if let Some(up) = canned.monitor_up {
            let status = if up { "up" } else { "down" };
            entries.insert("monitorStatus".into(), json!({ "description": status }));
        }
        let key = stats_entry_key(locator, HostVersion::parse(Some(&self.version)));
        Ok(serde_json::from_value(json!({
            "entries": { key: { "nestedStats": { "entries": entries } } }
        }))
        .unwrap())
    }

    async fn fetch_device_stats(&self) -> Result<StatsDocument, SourceError> {
        self.device_fetches.fetch_add(1, Ordering::SeqCst);
        if self.device_fails {
            return Err(Self::unavailable("/mgmt/tm/sys/host-info"));
        }
        Ok(serde_json::from_value(json!({"entries": {
            "https://localhost/mgmt/tm/sys/host-info/0": {"nestedStats": {"entries": {
                "memoryTotal": {"value": 1000},
                "memoryUsed": {"value": 400},
                "https://localhost/mgmt/tm/sys/host-info/0/cpuInfo": {"nestedStats": {"entries": {
                    "https://localhost/mgmt/tm/sys/hostInfo/0/cpuInfo/0": {"nestedStats": {"entries": {
                        "cpuId": {"value": 0},
                        "oneMinAvgUser": {"value": 5}
                    }}}
                }}}
            }}}
        }}))
        .unwrap())
    }
}

#[derive(Default)]
pub struct MemoryConfigStore {
    config: Mutex<Configuration>,
    fail: AtomicBool,
    pub loads: AtomicUsize,
}

impl MemoryConfigStore {
    pub fn new(config: Configuration) -> Self {
        Self {
            config: Mutex::new(config),
            ..Default::default()
        }
    }

    pub fn set(&self, config: Configuration) {
        *self.config.lock().unwrap() = config;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<Configuration, PipelineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::ConfigStore("store offline".into()));
        }
        Ok(self.config.lock().unwrap().clone())
    }

    async fn save(&self, config: Configuration) -> Result<Configuration, PipelineError> {
        self.set(config.clone());
        Ok(config)
    }
}

#[derive(Default)]
pub struct RecordingTaskScheduler {
    tasks: Mutex<HashMap<String, TaskId>>,
    pub registrations: Mutex<Vec<TaskSpec>>,
    pub patches: Mutex<Vec<(TaskId, Duration)>>,
    pub fail_patch: AtomicBool,
}

impl RecordingTaskScheduler {
    pub fn patch_count(&self) -> usize {
        self.patches.lock().unwrap().len()
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }
}

#[async_trait]
impl TaskScheduler for RecordingTaskScheduler {
    async fn register(&self, spec: TaskSpec) -> Result<TaskId, RegistrationError> {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.contains_key(&spec.name) {
            return Err(RegistrationError::AlreadyExists(spec.name));
        }
        let id = TaskId::new(format!("task-{}", tasks.len() + 1));
        tasks.insert(spec.name.clone(), id.clone());
        self.registrations.lock().unwrap().push(spec);
        Ok(id)
    }

    async fn find(&self, name: &str) -> Result<TaskId, RegistrationError> {
        self.tasks
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistrationError::NotFound(name.to_string()))
    }

    async fn patch_interval(
        &self,
        id: &TaskId,
        interval: Duration,
    ) -> Result<(), RegistrationError> {
        if self.fail_patch.load(Ordering::SeqCst) {
            return Err(RegistrationError::Closed);
        }
        self.patches.lock().unwrap().push((id.clone(), interval));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub broker: String,
    pub topic: String,
    pub payload: serde_json::Value,
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<Published>>,
    failing_topics: Mutex<HashSet<String>>,
}

impl RecordingPublisher {
    pub fn fail_topic(&self, topic: &str) {
        self.failing_topics.lock().unwrap().insert(topic.to_string());
    }

    pub fn messages(&self) -> Vec<Published> {
        let mut messages = self.published.lock().unwrap().clone();
        messages.sort_by(|a, b| a.topic.cmp(&b.topic));
        messages
    }
}

#[async_trait]
impl TopicPublisher for RecordingPublisher {
    async fn publish(
        &self,
        broker: &str,
        topic: &str,
        payload: String,
    ) -> Result<(), DeliveryError> {
        if self.failing_topics.lock().unwrap().contains(topic) {
            return Err(DeliveryError::Topic {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }
        self.published.lock().unwrap().push(Published {
            broker: broker.to_string(),
            topic: topic.to_string(),
            payload: serde_json::from_str(&payload).unwrap(),
        });
        Ok(())
    }
}

/// Read one HTTP/1.1 request, returning its request line and body.
async fn read_request(stream: &mut TcpStream) -> (String, String) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return (String::new(), String::new());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let request_line = head.lines().next().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    (request_line, body)
}

async fn respond(stream: &mut TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.ok();
}

/// Serve the same response to every request. Returns the base URL.
pub async fn serve_canned(status: u16, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request(&mut stream).await;
                respond(&mut stream, status, body).await;
            });
        }
    });
    format!("http://{addr}")
}

/// Accept requests and forward `(request line, body)` of each one.
pub async fn serve_capture() -> (std::net::SocketAddr, mpsc::UnboundedReceiver<(String, String)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let request = read_request(&mut stream).await;
                respond(&mut stream, 200, r#"{"ok":true}"#).await;
                let _ = tx.send(request);
            });
        }
    });
    (addr, rx)
}
