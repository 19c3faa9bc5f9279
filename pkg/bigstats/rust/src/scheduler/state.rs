// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// No recurring task registered yet.
    Unregistered,
    /// Task registered, no tick running.
    Registered,
    /// Task registered and at least one tick in flight.
    Collecting,
}

impl TaskState {
    pub fn is_registered(self) -> bool {
        self != TaskState::Unregistered
    }

    pub(crate) fn observe(registered: bool, ticks_in_flight: usize) -> Self {
        match (registered, ticks_in_flight) {
            (false, _) => TaskState::Unregistered,
            (true, 0) => TaskState::Registered,
            (true, _) => TaskState::Collecting,
        }
    }

    pub(crate) fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Unregistered, Registered)
                | (Registered, Collecting)
                | (Collecting, Collecting)
                | (Collecting, Registered)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Unregistered => write!(f, "unregistered"),
            TaskState::Registered => write!(f, "registered"),
            TaskState::Collecting => write!(f, "collecting"),
        }
    }
}
