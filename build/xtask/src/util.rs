// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::process::{Child, Command};

use color_eyre::Help;
use wasm_patch::{FailureKind, ToolchainFailure};

/// Kills the wrapped child process if it is still running when dropped.
pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
    }
}

/// Runs `cmd` to completion with inherited stdio.
///
/// # Errors
///
/// Returns a [`ToolchainFailure`] if the program cannot be started or exits
/// unsuccessfully.
pub fn exec(mut cmd: Command) -> crate::Result<()> {
    let tool = cmd.get_program().to_string_lossy().into_owned();
    tracing::debug!("{cmd:?}");

    let child = cmd
        .spawn()
        .map_err(|err| ToolchainFailure {
            tool: tool.clone(),
            kind: FailureKind::Spawn(err),
        })
        .with_suggestion(|| format!("is `{tool}` installed and on your PATH?"))?;
    let mut child = KillOnDrop(child);

    let status = child.0.wait()?;
    if !status.success() {
        return Err(ToolchainFailure {
            tool,
            kind: FailureKind::Exit(status),
        })
        .note("see the output above for details");
    }

    Ok(())
}
