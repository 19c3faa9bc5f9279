// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;

use super::{
    Collection, DeviceInfo, GlobalSettings, MemberItem, StatsDocument, VirtualItem,
    version_from_document,
};
use crate::errors::SourceError;
use crate::model::ResourceLocator;
use crate::ports::StatsSource;

const HOSTNAME_PATH: &str = "/mgmt/tm/sys/global-settings?$select=hostname";
const VERSION_PATH: &str = "/mgmt/tm/sys/version";
const VIRTUAL_LIST_PATH: &str =
    "/mgmt/tm/ltm/virtual?$select=name,partition,subPath,destination,pool,selfLink";
const HOST_INFO_PATH: &str = "/mgmt/tm/sys/host-info";

/// `StatsSource` over the management REST API. Requests carry no timeout.
#[derive(Clone)]
pub struct IcontrolClient {
    base_url: String,
    client: reqwest::Client,
}

impl IcontrolClient {
    pub fn new(base_url: &str, tls_verify: bool) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!tls_verify)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| SourceError::Http {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| SourceError::Http {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_slice(&body).map_err(|e| SourceError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl StatsSource for IcontrolClient {
    async fn device_info(&self) -> Result<DeviceInfo, SourceError> {
        let settings: GlobalSettings = self.get_json(HOSTNAME_PATH).await?;
        let version_doc: StatsDocument = self.get_json(VERSION_PATH).await?;
        let version = version_from_document(&version_doc).ok_or_else(|| SourceError::Decode {
            path: VERSION_PATH.to_string(),
            reason: "no Version entry".to_string(),
        })?;

        Ok(DeviceInfo {
            hostname: settings.hostname,
            version,
        })
    }

    async fn list_virtual_servers(&self) -> Result<Vec<VirtualItem>, SourceError> {
        let listing: Collection<VirtualItem> = self.get_json(VIRTUAL_LIST_PATH).await?;
        Ok(listing.items)
    }

    async fn list_pool_members(
        &self,
        pool: &ResourceLocator,
    ) -> Result<Vec<MemberItem>, SourceError> {
        let path = format!("{}/members?$select=name,selfLink", pool.path());
        let listing: Collection<MemberItem> = self.get_json(&path).await?;
        Ok(listing.items)
    }

    async fn fetch_stats(&self, locator: &ResourceLocator) -> Result<StatsDocument, SourceError> {
        self.get_json(&format!("{}/stats", locator.path())).await
    }

    async fn fetch_device_stats(&self) -> Result<StatsDocument, SourceError> {
        self.get_json(HOST_INFO_PATH).await
    }
}
