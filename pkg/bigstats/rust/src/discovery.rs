// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Turns management API listings into typed resource descriptors.

use log::{debug, warn};

use crate::errors::{PipelineError, SourceError};
use crate::icontrol::{MemberItem, VirtualItem};
use crate::model::{PoolMemberDescriptor, ResourceDescriptor, ResourceLocator};
use crate::ports::StatsSource;

const POOL_PATH: &str = "/mgmt/tm/ltm/pool/";
const MGMT_PREFIX: &str = "/mgmt/";

/// List every virtual service and convert it. Items that cannot be
/// addressed are skipped.
pub async fn discover_virtuals(
    source: &dyn StatsSource,
) -> Result<Vec<ResourceDescriptor>, PipelineError> {
    let items = source
        .list_virtual_servers()
        .await
        .map_err(PipelineError::Discovery)?;
    let total = items.len();
    let descriptors = virtual_descriptors(items);
    debug!("discovered {} of {total} virtual services", descriptors.len());
    Ok(descriptors)
}

pub async fn discover_members(
    source: &dyn StatsSource,
    pool_name: &str,
) -> Result<Vec<PoolMemberDescriptor>, SourceError> {
    let items = source.list_pool_members(&pool_locator(pool_name)).await?;
    Ok(member_descriptors(items))
}

pub fn virtual_descriptors(items: Vec<VirtualItem>) -> Vec<ResourceDescriptor> {
    items
        .into_iter()
        .filter_map(|item| {
            let Some(destination) = item.destination.as_deref() else {
                warn!("skipping virtual '{}': no destination", item.name);
                return None;
            };
            let Some(stats_locator) = item.self_link.as_deref().and_then(locator_from_self_link)
            else {
                warn!("skipping virtual '{}': unusable selfLink", item.name);
                return None;
            };
            Some(ResourceDescriptor {
                destination: strip_partition(destination, &item.partition),
                partition: item.partition,
                sub_path: item.sub_path.filter(|s| !s.is_empty()),
                pool_name: item.pool.filter(|p| !p.is_empty()),
                stats_locator,
            })
        })
        .collect()
}

pub fn member_descriptors(items: Vec<MemberItem>) -> Vec<PoolMemberDescriptor> {
    items
        .into_iter()
        .filter_map(|item| {
            let Some(stats_locator) = item.self_link.as_deref().and_then(locator_from_self_link)
            else {
                warn!("skipping pool member '{}': unusable selfLink", item.name);
                return None;
            };
            Some(PoolMemberDescriptor {
                name: item.name,
                stats_locator,
            })
        })
        .collect()
}

/// `/Common/10.0.0.1:80` in partition `Common` becomes `10.0.0.1:80`.
pub fn strip_partition(destination: &str, partition: &str) -> String {
    let prefix = format!("/{partition}/");
    destination
        .strip_prefix(&prefix)
        .unwrap_or(destination)
        .to_string()
}

/// Management path of a self link: scheme, host and query are dropped.
pub fn locator_from_self_link(link: &str) -> Option<ResourceLocator> {
    let without_query = link.split(['?', '#']).next().unwrap_or_default();
    let path = match without_query.split_once("://") {
        Some((_, rest)) => format!("/{}", rest.split_once('/')?.1),
        None => without_query.to_string(),
    };
    path.starts_with(MGMT_PREFIX)
        .then(|| ResourceLocator::new(path.trim_end_matches('/')))
}

/// `/Common/web` becomes `/mgmt/tm/ltm/pool/~Common~web`.
pub fn pool_locator(pool_name: &str) -> ResourceLocator {
    ResourceLocator::new(format!("{POOL_PATH}{}", pool_name.replace('/', "~")))
}
