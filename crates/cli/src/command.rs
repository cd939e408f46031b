// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argument grammar and output formatting.
//!
//! The grammar is verb-second for per-job operations
//! (`jobctl <label> <verb>`) and verb-first for the rest
//! (`jobctl load <path>`, `jobctl unload <label>`, `jobctl list`).

use serde_json::{json, Value};

/// A resolved invocation: RPC method plus positional parameters.
#[derive(Debug, PartialEq)]
pub struct Invocation {
    pub method: &'static str,
    pub params: Vec<Value>,
}

const LABEL_VERBS: [&str; 4] = ["enable", "disable", "clear", "status"];

/// Map the two positional arguments onto an RPC invocation.
pub fn resolve(first: &str, second: Option<&str>) -> Result<Invocation, String> {
    match first {
        "list" => match second {
            None => Ok(Invocation { method: "list", params: vec![] }),
            Some(extra) => Err(format!("list takes no argument (got {extra:?})")),
        },
        "load" => {
            let path = second.ok_or("load requires a manifest path")?;
            // Resolve relative paths before they cross the socket; the
            // daemon's working directory is not ours.
            let path = std::fs::canonicalize(path)
                .map_err(|e| format!("cannot resolve {path:?}: {e}"))?;
            Ok(Invocation { method: "load", params: vec![json!(path.to_string_lossy())] })
        }
        "unload" => {
            let label = second.ok_or("unload requires a label")?;
            Ok(Invocation { method: "unload", params: vec![json!(label)] })
        }
        label => {
            let verb = second.ok_or_else(|| {
                format!("expected a verb after {label:?}: {}", LABEL_VERBS.join(", "))
            })?;
            let method = LABEL_VERBS
                .iter()
                .copied()
                .find(|known| *known == verb)
                .ok_or_else(|| format!("unknown verb {verb:?}"))?;
            Ok(Invocation { method, params: vec![json!(label)] })
        }
    }
}

/// Print one job's status as `key: value` lines.
pub fn print_status(result: &Value) {
    println!("state: {}", text(&result["state"]));
    println!("pid: {}", text(&result["pid"]));
    println!("enabled: {}", text(&result["enabled"]));
    println!("last_exit_status: {}", text(&result["last_exit_status"]));
    println!("term_signal: {}", text(&result["term_signal"]));
    match &result["fault"] {
        Value::Null => println!("fault: none"),
        fault => {
            println!("fault: {} ({})", text(&fault["kind"]), text(&fault["reason"]));
        }
    }
}

/// Print the job table, one row per label.
pub fn print_list(result: &Value) {
    println!("{:<28} {:<10} {:<8} {:<8} {}", "LABEL", "STATE", "PID", "ENABLED", "FAULT");
    let Some(jobs) = result.as_object() else {
        return;
    };
    for (label, entry) in jobs {
        let pid = match &entry["Pid"] {
            Value::Number(n) if n.as_u64() == Some(0) => "-".to_string(),
            pid => text(pid),
        };
        let fault = match &entry["FaultState"] {
            Value::Null => "-".to_string(),
            fault => text(fault),
        };
        println!(
            "{:<28} {:<10} {:<8} {:<8} {}",
            label,
            text(&entry["State"]),
            pid,
            text(&entry["Enabled"]),
            fault
        );
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
