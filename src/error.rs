// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Failure of one of the external tools we drive (`tpm2_*`, `uname`,
/// `greengrassd`).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unable to invoke {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with status {code:?}: {stderr}")]
    Status {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("bad arguments: {0}")]
    BadArguments(String),
    #[error("connection failure: {0}")]
    Connection(String),
    #[error("provisioning tool failed")]
    Provisioning(#[from] ToolError),
    #[error("can't get MAC address of {interface}: {reason}")]
    Interface { interface: String, reason: String },
    #[error("identity mismatch after write: expected {expected}, read back {found}")]
    Mismatch { expected: String, found: String },
    #[error("file I/O")]
    Io(#[from] std::io::Error),
    #[error("encoding status payload")]
    Json(#[from] serde_json::Error),
    #[error("publish rejected: {0}")]
    Publish(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
