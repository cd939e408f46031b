// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job manifests: the declarative description of one job.
//!
//! A manifest is immutable once parsed. `normalize()` produces the canonical
//! JSON form persisted under the manifest directory; parsing a normalized
//! manifest yields the same normalized form again.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::ScheduleKind;
use crate::label::{Label, LabelError};

/// Default minimum delay before a keep-alive restart, in seconds.
pub const DEFAULT_THROTTLE_INTERVAL: u64 = 10;

/// Errors from parsing or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error("manifest {0}: requires Program or ProgramArguments")]
    MissingProgram(Label),

    #[error("manifest {0}: ProgramArguments must not be empty")]
    EmptyProgramArguments(Label),
}

/// Calendar schedule fields, in the launchd shape.
///
/// Evaluation is delegated to the calendar collaborator, which turns one of
/// these into a concrete next fire time. `None` fields are wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalendarInterval {
    #[serde(rename = "Minute", default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
    #[serde(rename = "Hour", default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(rename = "Day", default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(rename = "Weekday", default, skip_serializing_if = "Option::is_none")]
    pub weekday: Option<u32>,
    #[serde(rename = "Month", default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
}

/// A parsed job manifest.
///
/// Field names on the wire use launchd-style PascalCase keys. Unknown keys
/// are ignored so manifests written for richer supervisors still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "Label")]
    pub label: Label,

    /// Program path; argv[0] when `ProgramArguments` is absent.
    #[serde(rename = "Program", default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    /// Full argument vector. At least one of `Program`/`ProgramArguments`
    /// is required.
    #[serde(rename = "ProgramArguments", default, skip_serializing_if = "Option::is_none")]
    pub program_arguments: Option<Vec<String>>,

    /// Desired state on first define; never consulted again after that.
    #[serde(rename = "Enable", default = "default_true")]
    pub enable: bool,

    #[serde(rename = "RunAtLoad", default)]
    pub run_at_load: bool,

    /// Periodic relaunch period in seconds; 0 means no periodic trigger.
    #[serde(rename = "StartInterval", default)]
    pub start_interval: u64,

    #[serde(rename = "KeepAlive", default)]
    pub keep_alive: bool,

    /// Minimum gap between keep-alive relaunches, in seconds.
    #[serde(rename = "ThrottleInterval", default = "default_throttle")]
    pub throttle_interval: u64,

    #[serde(rename = "UserName", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(rename = "GroupName", default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,

    #[serde(rename = "WorkingDirectory", default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    #[serde(rename = "RootDirectory", default, skip_serializing_if = "Option::is_none")]
    pub root_directory: Option<PathBuf>,

    #[serde(rename = "StandardInPath", default, skip_serializing_if = "Option::is_none")]
    pub standard_in_path: Option<PathBuf>,

    #[serde(rename = "StandardOutPath", default, skip_serializing_if = "Option::is_none")]
    pub standard_out_path: Option<PathBuf>,

    #[serde(rename = "StandardErrorPath", default, skip_serializing_if = "Option::is_none")]
    pub standard_error_path: Option<PathBuf>,

    #[serde(
        rename = "EnvironmentVariables",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub environment_variables: HashMap<String, String>,

    #[serde(
        rename = "StartCalendarInterval",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub start_calendar_interval: Option<CalendarInterval>,
}

fn default_true() -> bool {
    true
}

fn default_throttle() -> u64 {
    DEFAULT_THROTTLE_INTERVAL
}

impl Manifest {
    /// Parse and validate a manifest from JSON text.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the structural requirements that serde cannot express.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.program.is_none() && self.program_arguments.is_none() {
            return Err(ManifestError::MissingProgram(self.label.clone()));
        }
        if matches!(self.program_arguments.as_deref(), Some([])) {
            return Err(ManifestError::EmptyProgramArguments(self.label.clone()));
        }
        Ok(())
    }

    /// Canonical JSON form: defaults materialized, keys sorted.
    ///
    /// This is the form persisted under the manifest directory.
    pub fn normalize(&self) -> serde_json::Value {
        // Serialization of a validated manifest cannot fail.
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Null)
    }

    /// Program path to execute.
    pub fn executable(&self) -> &str {
        match (&self.program, &self.program_arguments) {
            (Some(p), _) => p,
            (None, Some(argv)) => argv.first().map(String::as_str).unwrap_or(""),
            (None, None) => "",
        }
    }

    /// Arguments passed to the executable.
    ///
    /// `ProgramArguments[0]` stands in for the executable only when
    /// `Program` is absent; with `Program` set, the whole vector is
    /// arguments.
    pub fn args(&self) -> &[String] {
        match (&self.program, &self.program_arguments) {
            (_, None) => &[],
            (Some(_), Some(argv)) => argv,
            (None, Some(argv)) => argv.get(1..).unwrap_or(&[]),
        }
    }

    /// Which scheduling policy this manifest declares.
    ///
    /// `StartInterval` is the strongest contract and wins over `KeepAlive`.
    pub fn schedule_kind(&self) -> ScheduleKind {
        if self.start_interval > 0 {
            ScheduleKind::Periodic
        } else if self.start_calendar_interval.is_some() {
            ScheduleKind::Calendar
        } else if self.keep_alive {
            ScheduleKind::KeepAlive
        } else {
            ScheduleKind::None
        }
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
