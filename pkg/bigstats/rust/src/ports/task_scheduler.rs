// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! TaskScheduler port
//! Recurring-task facility that invokes the scheduler on an interval

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: String,
    pub interval: Duration,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("task '{0}' is already registered")]
    AlreadyExists(String),
    #[error("task '{0}' not found")]
    NotFound(String),
    #[error("task scheduler is shut down")]
    Closed,
    #[error("interval must be non-zero")]
    ZeroInterval,
}

#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Register a recurring task; a task with the same name yields `AlreadyExists`
    async fn register(&self, spec: TaskSpec) -> Result<TaskId, RegistrationError>;

    /// Look up a registered task by name
    async fn find(&self, name: &str) -> Result<TaskId, RegistrationError>;

    /// Change a task's interval without re-registering it
    async fn patch_interval(
        &self,
        id: &TaskId,
        interval: Duration,
    ) -> Result<(), RegistrationError>;
}
