// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! ConfigStore port

use async_trait::async_trait;

use crate::config::Configuration;
use crate::errors::PipelineError;

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Current configuration; a store with nothing saved yields the default
    async fn load(&self) -> Result<Configuration, PipelineError>;

    /// Replace the stored configuration and return what was stored
    async fn save(&self, config: Configuration) -> Result<Configuration, PipelineError>;
}
