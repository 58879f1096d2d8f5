// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Running external tools as black boxes.

use crate::error::ToolError;
use std::process::Command;

/// Something that can run a program to completion and hand back its stdout.
///
/// A non-zero exit is an error: callers never see output from a failed run.
pub trait ToolRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, ToolError>;
}

/// Runs tools as child processes found through `$PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, ToolError> {
        log::debug!("running {program} {}", args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| ToolError::Spawn {
                tool: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Status {
                tool: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}
