// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use log::{debug, error};

use super::DispatchSummary;
use crate::config::{Destination, Protocol};
use crate::errors::DeliveryError;
use crate::model::ExportEnvelope;

pub fn target_url(protocol: Protocol, destination: &Destination) -> String {
    format!(
        "{protocol}://{}:{}{}",
        destination.address,
        destination.port,
        destination.uri()
    )
}

/// One POST of the `stats` object. Not retried.
pub async fn push(
    client: &reqwest::Client,
    protocol: Protocol,
    envelope: &ExportEnvelope,
) -> DispatchSummary {
    let url = target_url(protocol, &envelope.config.destination);
    let failed = match post(client, &url, envelope).await {
        Ok(body) => {
            debug!("{url} responded: {body}");
            0
        }
        Err(e) => {
            error!("{e}");
            1
        }
    };
    DispatchSummary {
        protocol,
        attempted: 1,
        failed,
    }
}

async fn post(
    client: &reqwest::Client,
    url: &str,
    envelope: &ExportEnvelope,
) -> Result<String, DeliveryError> {
    let body = envelope.stats_body()?;
    let http_error = |source| DeliveryError::Http {
        url: url.to_string(),
        source,
    };

    let response = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(http_error)?;
    let status = response.status();
    let text = response.text().await.map_err(http_error)?;
    if !status.is_success() {
        return Err(DeliveryError::Rejected {
            url: url.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}
