// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Agent-style logger for the `log` facade.
//!
//! Every line has the shape
//! `2026-10-18 09:12:01 UTC | BIGSTATS | INFO | (src/tree.rs:88 in bigstats::tree) | message`
//! and goes to stderr, plus an optional append-only file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Level configured at startup; `set_debug(false)` falls back to it.
static BASE_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Info as usize);

#[derive(Error, Debug)]
pub enum InitError {
    #[error("logger already installed: {0}")]
    Logger(#[source] SetLoggerError),
    #[error("cannot open log file: {0}")]
    File(#[source] io::Error),
}

pub struct AgentLogger {
    component: String,
    file: Option<Mutex<File>>,
}

impl AgentLogger {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_ascii_uppercase(),
            file: None,
        }
    }

    /// Also append every line to `path`, creating it if needed.
    pub fn with_file(mut self, path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.file = Some(Mutex::new(file));
        Ok(self)
    }

    pub fn format(&self, record: &Record<'_>, now: OffsetDateTime) -> String {
        let timestamp = now
            .format(TIMESTAMP_FORMAT)
            .unwrap_or_else(|_| "0000-00-00 00:00:00".to_string());
        format!(
            "{timestamp} UTC | {} | {} | ({}:{} in {}) | {}",
            self.component,
            record.level(),
            record.file().unwrap_or("<unknown>"),
            record.line().unwrap_or(0),
            record.module_path().unwrap_or("<unknown>"),
            record.args()
        )
    }
}

impl Log for AgentLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.format(record, OffsetDateTime::now_utc());

        let _ = writeln!(io::stderr().lock(), "{line}");
        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            let _ = writeln!(file, "{line}");
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            let _ = file.flush();
        }
    }
}

/// Install the global logger. Must be called once, before any log macro.
pub fn init(component: &str, level: LevelFilter, file: Option<&Path>) -> Result<(), InitError> {
    let mut logger = AgentLogger::new(component);
    if let Some(path) = file {
        logger = logger.with_file(path).map_err(InitError::File)?;
    }
    log::set_boxed_logger(Box::new(logger)).map_err(InitError::Logger)?;
    BASE_LEVEL.store(level as usize, Ordering::Relaxed);
    log::set_max_level(level);
    Ok(())
}

/// Raise the max level to `Debug` while `enabled`, otherwise restore the
/// level given to `init`.
pub fn set_debug(enabled: bool) {
    let base = level_from_usize(BASE_LEVEL.load(Ordering::Relaxed));
    let wanted = if enabled {
        base.max(LevelFilter::Debug)
    } else {
        base
    };
    if log::max_level() != wanted {
        log::set_max_level(wanted);
    }
}

fn level_from_usize(value: usize) -> LevelFilter {
    match value {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
