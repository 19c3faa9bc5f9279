// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! StatsSource port
//! Read side of the management API

use async_trait::async_trait;

use crate::errors::SourceError;
use crate::icontrol::{DeviceInfo, MemberItem, StatsDocument, VirtualItem};
use crate::model::ResourceLocator;

#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Hostname and software version of the managed device
    async fn device_info(&self) -> Result<DeviceInfo, SourceError>;

    /// Bulk listing of every virtual service
    async fn list_virtual_servers(&self) -> Result<Vec<VirtualItem>, SourceError>;

    /// Members of the pool at `pool`
    async fn list_pool_members(
        &self,
        pool: &ResourceLocator,
    ) -> Result<Vec<MemberItem>, SourceError>;

    /// Stats document for one resource
    async fn fetch_stats(&self, locator: &ResourceLocator) -> Result<StatsDocument, SourceError>;

    /// Host memory and CPU document
    async fn fetch_device_stats(&self) -> Result<StatsDocument, SourceError>;
}
