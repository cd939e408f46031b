// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates (behind the `test-support` feature).

// Builders are test-only conveniences; invalid input may panic.
#![allow(clippy::unwrap_used, clippy::panic)]

use std::collections::HashMap;

use crate::label::Label;
use crate::manifest::{CalendarInterval, Manifest, DEFAULT_THROTTLE_INTERVAL};

/// Start building a manifest with the given label and `/bin/true` as the
/// program.
pub fn manifest(label: &str) -> ManifestBuilder {
    ManifestBuilder {
        label: label.to_string(),
        program: Some("/bin/true".to_string()),
        program_arguments: None,
        enable: true,
        run_at_load: false,
        start_interval: 0,
        keep_alive: false,
        throttle_interval: DEFAULT_THROTTLE_INTERVAL,
        environment_variables: HashMap::new(),
        start_calendar_interval: None,
    }
}

pub struct ManifestBuilder {
    label: String,
    program: Option<String>,
    program_arguments: Option<Vec<String>>,
    enable: bool,
    run_at_load: bool,
    start_interval: u64,
    keep_alive: bool,
    throttle_interval: u64,
    environment_variables: HashMap<String, String>,
    start_calendar_interval: Option<CalendarInterval>,
}

impl ManifestBuilder {
    pub fn program(mut self, program: &str) -> Self {
        self.program = Some(program.to_string());
        self
    }

    pub fn program_arguments(mut self, argv: &[&str]) -> Self {
        self.program_arguments = Some(argv.iter().map(|s| s.to_string()).collect());
        self.program = None;
        self
    }

    pub fn enable(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    pub fn run_at_load(mut self, run_at_load: bool) -> Self {
        self.run_at_load = run_at_load;
        self
    }

    pub fn start_interval(mut self, seconds: u64) -> Self {
        self.start_interval = seconds;
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn throttle_interval(mut self, seconds: u64) -> Self {
        self.throttle_interval = seconds;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.environment_variables.insert(key.to_string(), value.to_string());
        self
    }

    pub fn calendar(mut self, interval: CalendarInterval) -> Self {
        self.start_calendar_interval = Some(interval);
        self
    }

    pub fn build(self) -> Manifest {
        Manifest {
            label: Label::new(self.label).unwrap(),
            program: self.program,
            program_arguments: self.program_arguments,
            enable: self.enable,
            run_at_load: self.run_at_load,
            start_interval: self.start_interval,
            keep_alive: self.keep_alive,
            throttle_interval: self.throttle_interval,
            user_name: None,
            group_name: None,
            working_directory: None,
            root_directory: None,
            standard_in_path: None,
            standard_out_path: None,
            standard_error_path: None,
            environment_variables: self.environment_variables,
            start_calendar_interval: self.start_calendar_interval,
        }
    }
}
