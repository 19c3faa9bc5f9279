// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! TopicPublisher port

use async_trait::async_trait;

use crate::errors::DeliveryError;

#[async_trait]
pub trait TopicPublisher: Send + Sync {
    /// Publish one JSON payload to `topic` on the broker at `broker`
    async fn publish(
        &self,
        broker: &str,
        topic: &str,
        payload: String,
    ) -> Result<(), DeliveryError>;
}
