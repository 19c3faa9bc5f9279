// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Builds one consistent stats tree per tick.
//!
//! Every per-resource fetch for a tree is issued concurrently and joined
//! before the tree is assembled, so a tree is either complete or not
//! produced at all. The first failing fetch rejects the whole build and its
//! resource label and phase are carried in the error.

use futures::future::try_join_all;
use log::debug;

use crate::config::Fidelity;
use crate::discovery::{discover_members, discover_virtuals};
use crate::errors::{FetchPhase, PipelineError, SourceError};
use crate::icontrol::{self, HostVersion};
use crate::model::{
    DeviceStats, PoolMemberDescriptor, ResourceDescriptor, ServiceEntry, ServiceMap,
    StatsSnapshot,
};
use crate::ports::StatsSource;

fn fetch_error(resource: String, phase: FetchPhase, source: SourceError) -> PipelineError {
    PipelineError::Fetch {
        resource,
        phase,
        source,
    }
}

pub struct StatsTreeBuilder<'a> {
    source: &'a dyn StatsSource,
    version: HostVersion,
}

impl<'a> StatsTreeBuilder<'a> {
    pub fn new(source: &'a dyn StatsSource, version: HostVersion) -> Self {
        Self { source, version }
    }

    pub async fn services(&self, fidelity: Fidelity) -> Result<ServiceMap, PipelineError> {
        match fidelity {
            Fidelity::Small => self.small().await,
            Fidelity::Medium => self.medium().await,
            Fidelity::Large => Err(PipelineError::UnimplementedFidelity(fidelity.to_string())),
        }
    }

    /// Virtual services only.
    pub async fn small(&self) -> Result<ServiceMap, PipelineError> {
        let resources = discover_virtuals(self.source).await?;
        let entries = try_join_all(resources.iter().map(|resource| async move {
            let stats = self.resource_snapshot(resource).await?;
            Ok::<_, PipelineError>((resource, ServiceEntry::Snapshot(stats)))
        }))
        .await?;
        Ok(assemble(entries))
    }

    /// Virtual services plus the members of their pools. Resources without a
    /// pool are collected as in `small`.
    pub async fn medium(&self) -> Result<ServiceMap, PipelineError> {
        let resources = discover_virtuals(self.source).await?;
        let entries = try_join_all(resources.iter().map(|resource| async move {
            let entry = match &resource.pool_name {
                None => ServiceEntry::Snapshot(self.resource_snapshot(resource).await?),
                Some(pool_name) => {
                    let (stats, members) = tokio::try_join!(
                        self.resource_snapshot(resource),
                        self.pool_members(resource, pool_name)
                    )?;
                    let members = try_join_all(
                        members
                            .iter()
                            .map(|member| self.member_snapshot(resource, member)),
                    )
                    .await?;
                    ServiceEntry::WithPool {
                        stats,
                        pool_name: pool_name.clone(),
                        members,
                    }
                }
            };
            Ok::<_, PipelineError>((resource, entry))
        }))
        .await?;
        Ok(assemble(entries))
    }

    pub async fn device(&self) -> Result<DeviceStats, PipelineError> {
        let doc = self
            .source
            .fetch_device_stats()
            .await
            .map_err(|e| fetch_error("device".to_string(), FetchPhase::DeviceStats, e))?;
        Ok(icontrol::device_stats(&doc))
    }

    async fn resource_snapshot(
        &self,
        resource: &ResourceDescriptor,
    ) -> Result<StatsSnapshot, PipelineError> {
        let locator = &resource.stats_locator;
        self.source
            .fetch_stats(locator)
            .await
            .and_then(|doc| icontrol::virtual_snapshot(&doc, locator, self.version))
            .map_err(|e| fetch_error(resource.label(), FetchPhase::ResourceStats, e))
    }

    async fn pool_members(
        &self,
        resource: &ResourceDescriptor,
        pool_name: &str,
    ) -> Result<Vec<PoolMemberDescriptor>, PipelineError> {
        discover_members(self.source, pool_name)
            .await
            .map_err(|e| fetch_error(resource.label(), FetchPhase::MemberList, e))
    }

    async fn member_snapshot(
        &self,
        resource: &ResourceDescriptor,
        member: &PoolMemberDescriptor,
    ) -> Result<(String, StatsSnapshot), PipelineError> {
        let locator = &member.stats_locator;
        let stats = self
            .source
            .fetch_stats(locator)
            .await
            .and_then(|doc| icontrol::member_snapshot(&doc, locator, self.version))
            .map_err(|e| {
                fetch_error(
                    format!("{} member {}", resource.label(), member.name),
                    FetchPhase::MemberStats,
                    e,
                )
            })?;
        Ok((member.name.clone(), stats))
    }
}

fn assemble(entries: Vec<(&ResourceDescriptor, ServiceEntry)>) -> ServiceMap {
    let mut services = ServiceMap::new();
    for (resource, entry) in entries {
        let previous = services
            .entry(resource.service_path())
            .or_default()
            .insert(resource.destination.clone(), entry);
        if previous.is_some() {
            debug!("duplicate resource {}, keeping the last one", resource.label());
        }
    }
    services
}
