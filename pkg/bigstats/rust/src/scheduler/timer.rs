// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! In-process recurring-task facility on tokio timers.
//!
//! Each registered task gets a timer loop that sends a [`TickRequest`] on a
//! shared channel every interval. The interval sits in a `watch` channel;
//! patching it restarts the pending wait with the new value.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ports::{RegistrationError, TaskId, TaskScheduler, TaskSpec};

const TICK_QUEUE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickRequest {
    pub task: TaskId,
    pub name: String,
}

struct TimerTask {
    id: TaskId,
    interval: watch::Sender<Duration>,
    handle: JoinHandle<()>,
}

pub struct IntervalTaskScheduler {
    ticks: mpsc::Sender<TickRequest>,
    tasks: Mutex<Option<HashMap<String, TimerTask>>>,
}

impl IntervalTaskScheduler {
    /// The receiver yields one request per elapsed interval of any task.
    pub fn new() -> (Self, mpsc::Receiver<TickRequest>) {
        let (ticks, rx) = mpsc::channel(TICK_QUEUE);
        (
            Self {
                ticks,
                tasks: Mutex::new(Some(HashMap::new())),
            },
            rx,
        )
    }

    /// Stop every timer. Later calls fail with `Closed`.
    pub fn shutdown(&self) {
        let Ok(mut tasks) = self.tasks.lock() else {
            return;
        };
        if let Some(tasks) = tasks.take() {
            for (name, task) in tasks {
                debug!("stopping timer for {name}");
                task.handle.abort();
            }
        }
    }
}

impl Drop for IntervalTaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_timer(
    request: TickRequest,
    mut interval: watch::Receiver<Duration>,
    ticks: mpsc::Sender<TickRequest>,
) {
    loop {
        let period = *interval.borrow_and_update();
        tokio::select! {
            _ = tokio::time::sleep(period) => {
                if ticks.send(request.clone()).await.is_err() {
                    debug!("tick receiver gone, stopping timer for {}", request.name);
                    return;
                }
            }
            changed = interval.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl TaskScheduler for IntervalTaskScheduler {
    async fn register(&self, spec: TaskSpec) -> Result<TaskId, RegistrationError> {
        if spec.interval.is_zero() {
            return Err(RegistrationError::ZeroInterval);
        }
        let mut guard = self.tasks.lock().map_err(|_| RegistrationError::Closed)?;
        let tasks = guard.as_mut().ok_or(RegistrationError::Closed)?;
        if tasks.contains_key(&spec.name) {
            return Err(RegistrationError::AlreadyExists(spec.name));
        }

        let id = TaskId::new(Uuid::new_v4().to_string());
        let (interval_tx, interval_rx) = watch::channel(spec.interval);
        let request = TickRequest {
            task: id.clone(),
            name: spec.name.clone(),
        };
        let handle = tokio::spawn(run_timer(request, interval_rx, self.ticks.clone()));

        info!(
            "timer {} ({id}) every {}s",
            spec.name,
            spec.interval.as_secs()
        );
        tasks.insert(
            spec.name,
            TimerTask {
                id: id.clone(),
                interval: interval_tx,
                handle,
            },
        );
        Ok(id)
    }

    async fn find(&self, name: &str) -> Result<TaskId, RegistrationError> {
        let guard = self.tasks.lock().map_err(|_| RegistrationError::Closed)?;
        let tasks = guard.as_ref().ok_or(RegistrationError::Closed)?;
        tasks
            .get(name)
            .map(|task| task.id.clone())
            .ok_or_else(|| RegistrationError::NotFound(name.to_string()))
    }

    async fn patch_interval(
        &self,
        id: &TaskId,
        interval: Duration,
    ) -> Result<(), RegistrationError> {
        if interval.is_zero() {
            return Err(RegistrationError::ZeroInterval);
        }
        let guard = self.tasks.lock().map_err(|_| RegistrationError::Closed)?;
        let tasks = guard.as_ref().ok_or(RegistrationError::Closed)?;
        let task = tasks
            .values()
            .find(|task| &task.id == id)
            .ok_or_else(|| RegistrationError::NotFound(id.to_string()))?;
        task.interval
            .send(interval)
            .map_err(|_| RegistrationError::Closed)
    }
}
