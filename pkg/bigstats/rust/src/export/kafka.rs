// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use rskafka::client::partition::{Compression, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder};
use rskafka::record::Record;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::DispatchSummary;
use crate::config::{Protocol, TopicMode};
use crate::errors::DeliveryError;
use crate::model::{ExportEnvelope, sanitize};
use crate::ports::TopicPublisher;

const DEVICE_TOPIC_SUFFIX: &str = "device_stats";
const CREATE_TOPIC_TIMEOUT_MS: i32 = 5_000;
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct TopicMessage {
    pub topic: String,
    pub payload: Value,
}

fn keyed(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// `All`: one message on `<hostname>` with the whole `stats` object.
/// `Partition`: `<hostname>-device_stats` plus one `<hostname>-<servicePath>`
/// per service path, each carrying only its slice of the tree.
pub fn plan_messages(
    envelope: &ExportEnvelope,
    mode: TopicMode,
) -> Result<Vec<TopicMessage>, DeliveryError> {
    let hostname = &envelope.hostname;
    match mode {
        TopicMode::All => Ok(vec![TopicMessage {
            topic: hostname.clone(),
            payload: envelope.stats_body()?,
        }]),
        TopicMode::Partition => {
            let mut messages = Vec::with_capacity(envelope.tree.services.len() + 1);
            messages.push(TopicMessage {
                topic: format!("{hostname}-{DEVICE_TOPIC_SUFFIX}"),
                payload: keyed(
                    hostname,
                    keyed("device", serde_json::to_value(&envelope.tree.device)?),
                ),
            });
            for (service_path, resources) in &envelope.tree.services {
                let slice = keyed(service_path, serde_json::to_value(resources)?);
                messages.push(TopicMessage {
                    topic: format!("{hostname}-{}", sanitize(service_path)),
                    payload: keyed(hostname, keyed("services", slice)),
                });
            }
            Ok(messages)
        }
    }
}

/// Spawn one detached publish per planned message. Outcomes are logged by the
/// tasks themselves.
pub fn publish_all(
    publisher: Arc<dyn TopicPublisher>,
    broker: String,
    messages: Vec<TopicMessage>,
) -> Vec<JoinHandle<()>> {
    messages
        .into_iter()
        .map(|message| {
            let publisher = Arc::clone(&publisher);
            let broker = broker.clone();
            tokio::spawn(async move {
                let payload = message.payload.to_string();
                match publisher.publish(&broker, &message.topic, payload).await {
                    Ok(()) => info!("published to topic {}", message.topic),
                    Err(e) => error!("{e}"),
                }
            })
        })
        .collect()
}

pub fn publish(publisher: Arc<dyn TopicPublisher>, envelope: &ExportEnvelope) -> DispatchSummary {
    let destination = &envelope.config.destination;
    let mode = destination.topic_mode.unwrap_or_else(|| {
        warn!("kafka destination has no topic mode, publishing everything to one topic");
        TopicMode::All
    });
    let mut summary = DispatchSummary {
        protocol: Protocol::Kafka,
        attempted: 0,
        failed: 0,
    };

    let messages = match plan_messages(envelope, mode) {
        Ok(messages) => messages,
        Err(e) => {
            error!("{e}");
            summary.failed = 1;
            return summary;
        }
    };
    summary.attempted = messages.len();

    let broker = format!("{}:{}", destination.address, destination.port);
    // Detached: the tick does not wait for the broker.
    drop(publish_all(publisher, broker, messages));
    summary
}

/// `TopicPublisher` backed by `rskafka`. One client per broker, created on
/// first use and reused for every later tick.
///
/// rskafka retries connects and unknown topics without a deadline, so every
/// publish is bounded by `timeout` and reports expiry as a delivery error.
pub struct KafkaPublisher {
    clients: Mutex<HashMap<String, Arc<Client>>>,
    topics: Mutex<HashSet<(String, String)>>,
    timeout: Duration,
}

impl Default for KafkaPublisher {
    fn default() -> Self {
        Self::with_timeout(PUBLISH_TIMEOUT)
    }
}

impl KafkaPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            topics: Mutex::new(HashSet::new()),
            timeout,
        }
    }

    /// The cache lock is not held while connecting, so one unreachable
    /// broker never blocks publishes to another.
    async fn client(&self, broker: &str) -> Result<Arc<Client>, DeliveryError> {
        if let Some(client) = self.clients.lock().await.get(broker) {
            return Ok(Arc::clone(client));
        }
        let client = ClientBuilder::new(vec![broker.to_string()])
            .build()
            .await
            .map_err(|e| DeliveryError::Topic {
                topic: format!("<broker {broker}>"),
                reason: e.to_string(),
            })?;
        let mut clients = self.clients.lock().await;
        let client = clients
            .entry(broker.to_string())
            .or_insert_with(|| Arc::new(client));
        Ok(Arc::clone(client))
    }

    /// Creation failures are expected when the topic already exists; the
    /// produce call reports anything real.
    async fn ensure_topic(&self, client: &Client, broker: &str, topic: &str) {
        let key = (broker.to_string(), topic.to_string());
        if self.topics.lock().await.contains(&key) {
            return;
        }
        let created = match client.controller_client() {
            Ok(controller) => controller
                .create_topic(topic, 1, 1, CREATE_TOPIC_TIMEOUT_MS)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = created {
            debug!("create topic {topic} on {broker}: {e}");
        }
        self.topics.lock().await.insert(key);
    }

    async fn deliver(&self, broker: &str, topic: &str, payload: String) -> Result<(), DeliveryError> {
        let failed = |reason: String| DeliveryError::Topic {
            topic: topic.to_string(),
            reason,
        };

        let client = self.client(broker).await?;
        self.ensure_topic(&client, broker, topic).await;

        let partition = client
            .partition_client(topic.to_string(), 0, UnknownTopicHandling::Retry)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let record = Record {
            key: None,
            value: Some(payload.into_bytes()),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };
        partition
            .produce(vec![record], Compression::NoCompression)
            .await
            .map_err(|e| failed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl TopicPublisher for KafkaPublisher {
    async fn publish(
        &self,
        broker: &str,
        topic: &str,
        payload: String,
    ) -> Result<(), DeliveryError> {
        match tokio::time::timeout(self.timeout, self.deliver(broker, topic, payload)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Topic {
                topic: topic.to_string(),
                reason: format!(
                    "no answer from broker {broker} within {}s",
                    self.timeout.as_secs_f64()
                ),
            }),
        }
    }
}
