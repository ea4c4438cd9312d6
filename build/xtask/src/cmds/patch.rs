// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueHint};
use color_eyre::Help;
use color_eyre::eyre::Context;

use crate::Options;
use crate::profile::Profile;

#[derive(Debug, Parser)]
pub struct Cmd {
    /// The module to patch.
    #[clap(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Where to write the patched module. Defaults to `<input>_patched.wasm`.
    #[clap(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

impl Cmd {
    pub fn run(&self, opts: &Options) -> crate::Result<()> {
        let profile = Profile::load(opts.profile.as_deref())?;
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| patched_path(&self.input));

        patch(&profile, &self.input, &output)?;

        Ok(())
    }
}

/// Replaces the memory routines of `input` with bulk memory instructions,
/// writing the result to `output`.
pub fn patch(profile: &Profile, input: &Path, output: &Path) -> crate::Result<PathBuf> {
    let patched = wasm_patch::patch_module(&profile.wabt(), input, output)
        .with_context(|| format!("could not patch {}", input.display()))
        .with_note(|| {
            "the patched routines use bulk memory instructions, \
             `wat2wasm` may need `--enable-bulk-memory` in [wabt] reassembler-args"
        })?;

    let applied: Vec<_> = patched.report.applied().map(|r| r.as_str()).collect();
    if applied.is_empty() {
        tracing::warn!(
            "none of the memory routines in {} could be patched",
            input.display()
        );
    } else {
        tracing::info!("Replaced {}", applied.join(", "));
    }
    for (routine, miss) in patched.report.skipped() {
        tracing::info!("Kept `{routine}`: {miss}");
    }

    Ok(patched.module)
}

/// `build/spall.wasm` becomes `build/spall_patched.wasm`.
pub fn patched_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}_patched.wasm"))
}
