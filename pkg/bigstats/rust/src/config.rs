// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_INTERVAL_SECS: u64 = 10;

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    MIN_INTERVAL_SECS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fidelity {
    /// Virtual services only.
    #[default]
    Small,
    /// Virtual services plus their pool members.
    Medium,
    /// Accepted in configuration, never collected.
    Large,
}

impl fmt::Display for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fidelity::Small => write!(f, "small"),
            Fidelity::Medium => write!(f, "medium"),
            Fidelity::Large => write!(f, "large"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicMode {
    All,
    Partition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
    Statsd,
    Kafka,
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "statsd" => Ok(Protocol::Statsd),
            "kafka" => Ok(Protocol::Kafka),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
            Protocol::Statsd => write!(f, "statsd"),
            Protocol::Kafka => write!(f, "kafka"),
        }
    }
}

/// Where the finished stats tree goes.
///
/// `protocol` stays a plain string so a stored value the dispatcher does not
/// know about survives loading and is reported at export time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, alias = "topic", skip_serializing_if = "Option::is_none")]
    pub topic_mode: Option<TopicMode>,
}

impl Destination {
    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol.parse().ok()
    }

    pub fn uri(&self) -> &str {
        self.uri.as_deref().unwrap_or("/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub destination: Destination,
    /// Polling interval in seconds.
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, alias = "size")]
    pub fidelity: Fidelity,
    #[serde(default)]
    pub debug: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_version: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            destination: Destination::default(),
            interval: default_interval(),
            enabled: true,
            fidelity: Fidelity::default(),
            debug: false,
            hostname: None,
            host_version: None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("protocol must be one of http, https, statsd, kafka (got '{0}')")]
    UnknownProtocol(String),
    #[error("address '{0}' is not an IPv4 address")]
    InvalidAddress(String),
    #[error("port {0} is outside 1-65535")]
    PortOutOfRange(u32),
    #[error("interval {0}s is below the {MIN_INTERVAL_SECS}s minimum")]
    IntervalTooShort(u64),
    #[error("kafka destinations need a topic mode ('all' or 'partition')")]
    MissingTopicMode,
}

impl Configuration {
    /// Polling interval, never below the minimum.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(MIN_INTERVAL_SECS))
    }

    /// Check a user-supplied configuration and return its normalized form.
    pub fn validate(mut self) -> Result<Configuration, ConfigValidationError> {
        let protocol = self
            .destination
            .protocol()
            .ok_or_else(|| ConfigValidationError::UnknownProtocol(self.destination.protocol.clone()))?;

        if self.destination.address.parse::<Ipv4Addr>().is_err() {
            return Err(ConfigValidationError::InvalidAddress(
                self.destination.address.clone(),
            ));
        }
        if !(1..=u32::from(u16::MAX)).contains(&self.destination.port) {
            return Err(ConfigValidationError::PortOutOfRange(self.destination.port));
        }
        if self.interval < MIN_INTERVAL_SECS {
            return Err(ConfigValidationError::IntervalTooShort(self.interval));
        }
        if protocol == Protocol::Kafka && self.destination.topic_mode.is_none() {
            return Err(ConfigValidationError::MissingTopicMode);
        }

        let uri = self.destination.uri.take().unwrap_or_default();
        self.destination.uri = Some(if uri.starts_with('/') {
            uri
        } else {
            format!("/{uri}")
        });
        Ok(self)
    }
}
