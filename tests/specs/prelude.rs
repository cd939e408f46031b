// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spec-test harness: start a daemon against a temp directory tree and
//! drive it with the real `jobctl` binary.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

pub use serde_json::json;

/// Locate a workspace binary by name, building it if needed.
///
/// `assert_cmd::cargo::cargo_bin` only resolves `CARGO_BIN_EXE_<name>`,
/// which Cargo sets for a package's *own* bin targets. This test crate
/// drives `jobd` and `jobctl`, which live in other workspace members, so
/// we locate (and build, if missing) their compiled binaries directly.
pub(crate) fn bin(name: &str) -> PathBuf {
    if let Ok(path) = std::env::var(format!("CARGO_BIN_EXE_{name}")) {
        return PathBuf::from(path);
    }

    let profile = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("target")
        .join(profile)
        .join(name);

    if !path.exists() {
        let status = Command::new(env!("CARGO"))
            .args(["build", "--workspace", "--bin", name])
            .current_dir(env!("CARGO_MANIFEST_DIR"))
            .status()
            .expect("failed to run cargo build");
        assert!(status.success(), "cargo build --bin {name} failed");
    }

    path
}

/// A running daemon rooted in a directory tree
/// (`manifests/`, `data/`, `run/`).
pub struct Daemon {
    root: PathBuf,
    // Owned when the daemon created its own root; restart tests keep the
    // TempDir in the test and use `start_at`.
    _dir: Option<tempfile::TempDir>,
    child: Child,
}

impl Daemon {
    /// Start with a fresh, empty root.
    pub fn start() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut daemon = Self::start_at(dir.path());
        daemon._dir = Some(dir);
        daemon
    }

    /// Start against an existing root (manifests may already be seeded).
    /// Blocks until the daemon prints READY.
    pub fn start_at(root: &Path) -> Self {
        let mut child = Command::new(bin("jobd"))
            .env("JOBD_MANIFEST_DIR", root.join("manifests"))
            .env("JOBD_DATA_DIR", root.join("data"))
            .env("JOBD_RUNTIME_DIR", root.join("run"))
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("failed to spawn jobd");

        let stdout = child.stdout.take().expect("jobd stdout");
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                match line {
                    Ok(line) if line.trim() == "READY" => {
                        let _ = ready_tx.send(());
                        break;
                    }
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
        });
        ready_rx
            .recv_timeout(Duration::from_secs(15))
            .expect("jobd did not become ready within 15s");

        Self { root: root.to_path_buf(), _dir: None, child }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a manifest file outside the manifest directory (for `load`).
    pub fn write_manifest(&self, file: &str, body: serde_json::Value) -> PathBuf {
        let path = self.root.join(file);
        std::fs::write(&path, body.to_string()).expect("write manifest");
        path
    }

    /// Write a manifest straight into the scanned manifest directory.
    pub fn seed_manifest(root: &Path, file: &str, body: serde_json::Value) {
        let manifests = root.join("manifests");
        std::fs::create_dir_all(&manifests).expect("create manifest dir");
        std::fs::write(manifests.join(file), body.to_string()).expect("write manifest");
    }

    /// Run `jobctl` against this daemon.
    pub fn jobctl(&self, args: &[&str]) -> Output {
        Command::new(bin("jobctl"))
            .env("JOBD_MANIFEST_DIR", self.root.join("manifests"))
            .env("JOBD_DATA_DIR", self.root.join("data"))
            .env("JOBD_RUNTIME_DIR", self.root.join("run"))
            .args(args)
            .output()
            .expect("failed to run jobctl")
    }

    /// Run `jobctl` and require success; returns stdout.
    pub fn jobctl_ok(&self, args: &[&str]) -> String {
        let output = self.jobctl(args);
        assert!(
            output.status.success(),
            "jobctl {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// `status <label>` parsed into a key → value map; `None` when the
    /// daemon reports NOT_FOUND.
    pub fn status(&self, label: &str) -> Option<HashMap<String, String>> {
        let output = self.jobctl(&[label, "status"]);
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let mut map = HashMap::new();
        for line in stdout.lines() {
            if let Some((key, value)) = line.split_once(": ") {
                map.insert(key.to_string(), value.to_string());
            }
        }
        Some(map)
    }

    /// Poll until `check` passes or the timeout expires.
    pub fn wait_until(&self, timeout: Duration, check: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if check(self) {
                return true;
            }
            if Instant::now() > deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Lines in a launch-counter file (missing file counts as zero).
pub fn count_lines(path: &Path) -> usize {
    std::fs::read_to_string(path).map(|s| s.lines().count()).unwrap_or(0)
}
