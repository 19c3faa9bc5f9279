// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Narrow interfaces to everything outside the collection pipeline.
//! Concrete implementations live next to the code that owns their concern.

pub mod config_store;
pub mod stats_source;
pub mod task_scheduler;
pub mod topic_publisher;

pub use config_store::ConfigStore;
pub use stats_source::StatsSource;
pub use task_scheduler::{RegistrationError, TaskId, TaskScheduler, TaskSpec};
pub use topic_publisher::TopicPublisher;
