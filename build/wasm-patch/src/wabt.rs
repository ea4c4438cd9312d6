// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Instant;

use eyre::{Context, bail, eyre};

use crate::{PatchReport, patch_text};

/// Converts between a binary module and its text form.
pub trait ModuleTools {
    /// Writes the text form of `module` to `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the disassembler could not be run or failed.
    fn disassemble(&self, module: &Path, text: &Path) -> eyre::Result<()>;

    /// Writes the binary form of `text` to `module`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reassembler could not be run or failed.
    fn reassemble(&self, text: &Path, module: &Path) -> eyre::Result<()>;
}

/// An external tool could not be started or exited unsuccessfully.
#[derive(Debug)]
pub struct ToolchainFailure {
    pub tool: String,
    pub kind: FailureKind,
}

#[derive(Debug)]
pub enum FailureKind {
    Spawn(io::Error),
    Exit(ExitStatus),
}

impl fmt::Display for ToolchainFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Spawn(_) => write!(f, "failed to run `{}`", self.tool),
            FailureKind::Exit(status) => write!(f, "`{}` exited with {status}", self.tool),
        }
    }
}

impl core::error::Error for ToolchainFailure {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match &self.kind {
            FailureKind::Spawn(err) => Some(err),
            FailureKind::Exit(_) => None,
        }
    }
}

/// The WebAssembly Binary Toolkit's `wasm2wat` and `wat2wasm`.
#[derive(Debug, Clone)]
pub struct Wabt {
    wasm2wat: PathBuf,
    wat2wasm: PathBuf,
    wat2wasm_args: Vec<OsString>,
}

impl Wabt {
    pub fn new(wasm2wat: impl Into<PathBuf>, wat2wasm: impl Into<PathBuf>) -> Self {
        Self {
            wasm2wat: wasm2wat.into(),
            wat2wasm: wat2wasm.into(),
            wat2wasm_args: Vec::new(),
        }
    }

    /// Extra arguments passed to `wat2wasm`, e.g. `--enable-bulk-memory` for older releases.
    pub fn reassembler_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.wat2wasm_args.extend(args.into_iter().map(Into::into));
        self
    }

    fn run(mut cmd: Command) -> eyre::Result<()> {
        let tool = cmd.get_program().to_string_lossy().into_owned();
        tracing::debug!("{cmd:?}");

        let status = cmd.status().map_err(|err| ToolchainFailure {
            tool: tool.clone(),
            kind: FailureKind::Spawn(err),
        })?;

        if !status.success() {
            return Err(ToolchainFailure {
                tool,
                kind: FailureKind::Exit(status),
            }
            .into());
        }

        Ok(())
    }
}

impl Default for Wabt {
    fn default() -> Self {
        Self::new("wasm2wat", "wat2wasm")
    }
}

impl ModuleTools for Wabt {
    fn disassemble(&self, module: &Path, text: &Path) -> eyre::Result<()> {
        let mut cmd = Command::new(&self.wasm2wat);
        cmd.arg("-o").arg(text).arg(module);
        Self::run(cmd)
    }

    fn reassemble(&self, text: &Path, module: &Path) -> eyre::Result<()> {
        let mut cmd = Command::new(&self.wat2wasm);
        cmd.args(&self.wat2wasm_args);
        cmd.arg("-o").arg(module).arg(text);
        Self::run(cmd)
    }
}

/// The files produced by [`patch_module`].
#[derive(Debug)]
pub struct PatchedModule {
    /// The reassembled, patched module.
    pub module: PathBuf,
    /// The disassembly of the input module.
    pub text: PathBuf,
    /// The patched disassembly `module` was assembled from.
    pub patched_text: PathBuf,
    pub report: PatchReport,
}

/// Disassembles `input`, patches its memory routines and reassembles the result into `output`.
///
/// The intermediate text files are written next to the modules, `input` with a
/// `.wat` extension and `output` with a `.wat` extension.
///
/// # Errors
///
/// Fails if `input` does not exist, if either tool fails or produces no output,
/// or if the disassembly cannot be parsed. Routines that don't match are not an
/// error, see [`PatchReport::skipped`].
pub fn patch_module(
    tools: &impl ModuleTools,
    input: &Path,
    output: &Path,
) -> eyre::Result<PatchedModule> {
    let start = Instant::now();

    fs::metadata(input).with_context(|| format!("could not read module {}", input.display()))?;

    let text = input.with_extension("wat");
    let patched_text = output.with_extension("wat");
    if text == patched_text {
        bail!(
            "patched module {} would overwrite the disassembly of its input",
            output.display()
        );
    }

    tools.disassemble(input, &text)?;
    ensure_output(&text, "disassembler")?;

    let wat = fs::read_to_string(&text)
        .with_context(|| format!("could not read disassembly {}", text.display()))?;
    let (patched, report) = patch_text(&wat)?;
    fs::write(&patched_text, patched)
        .with_context(|| format!("could not write {}", patched_text.display()))?;

    tools.reassemble(&patched_text, output)?;
    ensure_output(output, "reassembler")?;

    tracing::info!(
        "Patched {} in {:.1} seconds",
        input.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(PatchedModule {
        module: output.to_path_buf(),
        text,
        patched_text,
        report,
    })
}

fn ensure_output(path: &Path, tool: &str) -> eyre::Result<()> {
    let meta = fs::metadata(path)
        .map_err(|_| eyre!("{tool} reported success but did not produce {}", path.display()))?;
    if meta.len() == 0 {
        bail!("{tool} produced an empty file at {}", path.display());
    }
    Ok(())
}
