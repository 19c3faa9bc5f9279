// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Drives collection: one tick loads the configuration, builds the stats
//! tree and hands it to the export dispatcher.
//!
//! The only state kept between ticks is the registration state and the
//! interval/enabled pair last applied to the recurring task. Everything a
//! tick reads or builds lives in its own [`TickContext`], so overlapping
//! ticks never see each other's data.

mod state;
pub mod timer;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info, warn};
use tokio::sync::Mutex;

use crate::config::{Configuration, MIN_INTERVAL_SECS};
use crate::errors::PipelineError;
use crate::export::{DispatchSummary, ExportDispatcher};
use crate::icontrol::HostVersion;
use crate::model::{ExportEnvelope, ServiceMap, StatsTree, sanitize};
use crate::ports::{ConfigStore, RegistrationError, StatsSource, TaskScheduler, TaskSpec};
use crate::tree::StatsTreeBuilder;

pub use state::TaskState;
pub use timer::{IntervalTaskScheduler, TickRequest};

/// Returned to whoever invokes a tick, before any work is done.
pub const TICK_ACK: &str = "bigstats tick accepted";
pub const TASK_NAME: &str = "bigstats";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Baseline {
    interval: u64,
    enabled: bool,
}

impl Baseline {
    fn of(config: &Configuration) -> Self {
        Self {
            interval: config.interval().as_secs(),
            enabled: config.enabled,
        }
    }
}

struct Registration {
    state: TaskState,
    baseline: Option<Baseline>,
}

impl Registration {
    fn mark_registered(&mut self, baseline: Baseline) {
        if self.state.can_transition_to(TaskState::Registered) {
            self.state = TaskState::Registered;
        }
        self.baseline = Some(baseline);
    }
}

/// Everything one tick owns.
#[derive(Debug, Clone)]
pub struct TickContext {
    /// Configuration as loaded, with the device hostname and version filled in.
    pub config: Configuration,
    /// Sanitized hostname used as top-level key and prefix.
    pub hostname: String,
    pub version: HostVersion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub resources: usize,
    /// `None` when the export was skipped.
    pub dispatch: Option<DispatchSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Disabled,
    Completed(TickReport),
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Scheduler {
    source: Arc<dyn StatsSource>,
    store: Arc<dyn ConfigStore>,
    tasks: Arc<dyn TaskScheduler>,
    dispatcher: ExportDispatcher,
    registration: Mutex<Registration>,
    /// Serializes drift handling so overlapping ticks patch at most once.
    drift: Mutex<()>,
    in_flight: AtomicUsize,
}

impl Scheduler {
    pub fn new(
        source: Arc<dyn StatsSource>,
        store: Arc<dyn ConfigStore>,
        tasks: Arc<dyn TaskScheduler>,
        dispatcher: ExportDispatcher,
    ) -> Self {
        Self {
            source,
            store,
            tasks,
            dispatcher,
            registration: Mutex::new(Registration {
                state: TaskState::Unregistered,
                baseline: None,
            }),
            drift: Mutex::new(()),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub async fn state(&self) -> TaskState {
        let registered = self.registration.lock().await.state.is_registered();
        TaskState::observe(registered, self.in_flight.load(Ordering::SeqCst))
    }

    /// Register the recurring task at the configured interval.
    pub async fn activate(&self) -> Result<(), PipelineError> {
        let config = self.store.load().await?;
        self.register(&config)
            .await
            .map_err(PipelineError::Registration)
    }

    /// Start a tick in the background and acknowledge at once. The tick's
    /// outcome is only logged.
    pub fn on_tick(self: &Arc<Self>) -> &'static str {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            match scheduler.run_tick().await {
                Ok(TickOutcome::Disabled) => debug!("tick skipped, collection disabled"),
                Ok(TickOutcome::Completed(report)) => {
                    debug!("tick exported {} resources", report.resources)
                }
                Err(e) => error!("tick failed: {e}"),
            }
        });
        TICK_ACK
    }

    pub async fn run_tick(&self) -> Result<TickOutcome, PipelineError> {
        let _in_flight = InFlight::enter(&self.in_flight);

        let config = self.store.load().await?;
        bigstats_log::set_debug(config.debug);
        if !config.enabled {
            return Ok(TickOutcome::Disabled);
        }

        self.sync_registration(&config).await;

        let ctx = self.tick_context(config).await?;
        let tree = self.build_tree(&ctx).await?;
        let resources = tree.resource_count();

        let envelope = ExportEnvelope {
            config: ctx.config,
            hostname: ctx.hostname,
            tree,
        };
        let dispatch = match self.dispatcher.dispatch(&envelope).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!("export skipped: {e}");
                None
            }
        };
        Ok(TickOutcome::Completed(TickReport {
            resources,
            dispatch,
        }))
    }

    async fn register(&self, config: &Configuration) -> Result<(), RegistrationError> {
        warn_short_interval(config);
        let spec = TaskSpec {
            name: TASK_NAME.to_string(),
            interval: config.interval(),
        };
        match self.tasks.register(spec).await {
            Ok(id) => info!("registered task {id} every {}s", config.interval().as_secs()),
            Err(RegistrationError::AlreadyExists(name)) => {
                info!("task {name} already registered")
            }
            Err(e) => return Err(e),
        }
        self.registration
            .lock()
            .await
            .mark_registered(Baseline::of(config));
        Ok(())
    }

    /// Register if needed, otherwise patch the task when the configured
    /// interval or enabled flag moved away from the applied baseline. The
    /// registration lock is never held across a call to the task facility.
    async fn sync_registration(&self, config: &Configuration) {
        let _drift = self.drift.lock().await;
        let wanted = Baseline::of(config);
        let (registered, baseline) = {
            let registration = self.registration.lock().await;
            (registration.state.is_registered(), registration.baseline)
        };

        if !registered {
            if let Err(e) = self.register(config).await {
                warn!("could not register task {TASK_NAME}: {e}");
            }
            return;
        }
        if baseline == Some(wanted) {
            return;
        }
        warn_short_interval(config);

        let patched = match self.tasks.find(TASK_NAME).await {
            Ok(id) => self.tasks.patch_interval(&id, config.interval()).await,
            Err(e) => Err(e),
        };
        match patched {
            Ok(()) => {
                info!("task {TASK_NAME} now runs every {}s", wanted.interval);
                self.registration.lock().await.baseline = Some(wanted);
            }
            Err(e) => warn!("could not update task {TASK_NAME}, retrying next tick: {e}"),
        }
    }

    async fn tick_context(&self, mut config: Configuration) -> Result<TickContext, PipelineError> {
        let device = self
            .source
            .device_info()
            .await
            .map_err(PipelineError::Discovery)?;
        let version = HostVersion::parse(Some(&device.version));
        let hostname = sanitize(&device.hostname);
        config.hostname = Some(device.hostname);
        config.host_version = Some(device.version);
        Ok(TickContext {
            config,
            hostname,
            version,
        })
    }

    async fn build_tree(&self, ctx: &TickContext) -> Result<StatsTree, PipelineError> {
        let builder = StatsTreeBuilder::new(self.source.as_ref(), ctx.version);
        let fidelity = ctx.config.fidelity;
        let services = async {
            match builder.services(fidelity).await {
                Err(PipelineError::UnimplementedFidelity(level)) => {
                    error!("fidelity '{level}' is not implemented, exporting without services");
                    Ok(ServiceMap::new())
                }
                other => other,
            }
        };
        let (device, services) = tokio::try_join!(builder.device(), services)?;
        Ok(StatsTree { device, services })
    }
}

fn warn_short_interval(config: &Configuration) {
    if config.interval < MIN_INTERVAL_SECS {
        warn!(
            "configured interval {}s is below the {MIN_INTERVAL_SECS}s minimum, using {MIN_INTERVAL_SECS}s",
            config.interval
        );
    }
}
