// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};

use crate::config::Configuration;
use crate::errors::PipelineError;
use crate::ports::ConfigStore;

/// YAML file holding the collector configuration.
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn store_error(&self, action: &str, e: impl std::fmt::Display) -> PipelineError {
        PipelineError::ConfigStore(format!("{action} {}: {e}", self.path.display()))
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<Configuration, PipelineError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist, using defaults", self.path.display());
                return Ok(Configuration::default());
            }
            Err(e) => return Err(self.store_error("reading", e)),
        };
        if contents.trim().is_empty() {
            return Ok(Configuration::default());
        }
        serde_yaml::from_str(&contents).map_err(|e| self.store_error("parsing", e))
    }

    /// Validate, then replace the file through a temporary sibling so readers
    /// never see a partial write.
    async fn save(&self, config: Configuration) -> Result<Configuration, PipelineError> {
        let config = config
            .validate()
            .map_err(|e| self.store_error("validating", e))?;
        let yaml = serde_yaml::to_string(&config).map_err(|e| self.store_error("encoding", e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.store_error("creating directory for", e))?;
        }
        let tmp = self.path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml)
            .await
            .map_err(|e| self.store_error("writing", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.store_error("replacing", e))?;

        info!("saved configuration to {}", self.path.display());
        Ok(config)
    }
}
