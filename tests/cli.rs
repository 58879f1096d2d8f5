// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exit statuses of `version-reporter`, run as a real process.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Output};

fn reporter(args: &[&str], path_prefix: Option<&Path>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_version-reporter"));
    cmd.args(args);
    if let Some(dir) = path_prefix {
        let path = std::env::var("PATH").unwrap_or_default();
        cmd.env("PATH", format!("{}:{path}", dir.display()));
    }
    cmd.output().unwrap()
}

fn stub(dir: &Path, name: &str, stdout: &str) {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\nprintf '%s' '{stdout}'\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// A directory holding fake TPM and Greengrass tools.
fn board() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    stub(dir.path(), "tpm2_nvread", "aa:bb:cc:00:01:dd:ee:ff");
    stub(dir.path(), "greengrassd", "Greengrass Daemon Version: 1.10.0");
    dir
}

#[test]
fn websocket_with_cert_is_usage_error() {
    let out = reporter(&["-e", "x", "-r", "y", "-w", "-c", "a", "-k", "b"], None);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("mutually exclusive"));
}

#[test]
fn missing_credentials_is_usage_error() {
    let out = reporter(&["-e", "x", "-r", "y"], None);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Missing credentials"));
}

#[test]
fn refused_connection_exits_255() {
    let dir = board();
    let ca = dir.path().join("root.pem");
    std::fs::write(&ca, "-----BEGIN CERTIFICATE-----\n").unwrap();
    let greengrassd = dir.path().join("greengrassd");

    let out = reporter(
        &[
            "-e",
            "127.0.0.1",
            "-p",
            "1",
            "-w",
            "-r",
            ca.to_str().unwrap(),
            "--greengrassd",
            greengrassd.to_str().unwrap(),
        ],
        Some(dir.path()),
    );
    assert_eq!(out.status.code(), Some(255));
    assert!(String::from_utf8_lossy(&out.stdout).contains("mqtt error"));
}

#[test]
fn unreadable_root_ca_exits_255() {
    let dir = board();
    let greengrassd = dir.path().join("greengrassd");

    let out = reporter(
        &[
            "-e",
            "127.0.0.1",
            "-w",
            "-r",
            "/nonexistent/root.pem",
            "--greengrassd",
            greengrassd.to_str().unwrap(),
        ],
        Some(dir.path()),
    );
    assert_eq!(out.status.code(), Some(255));
    assert!(String::from_utf8_lossy(&out.stdout).contains("mqtt error"));
}
