// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod build;
mod cmds;
mod profile;
mod tracing;
mod util;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

use crate::tracing::OutputOptions;

pub type Result<T> = color_eyre::Result<T>;

/// Builds, patches and bundles the web release.
#[derive(Debug, Parser)]
#[clap(version)]
struct Xtask {
    #[clap(subcommand)]
    cmd: Cmd,
    #[clap(flatten)]
    opts: Options,
    #[clap(flatten)]
    output: OutputOptions,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Clears the build directory, compiles everything and assembles the distribution.
    Dist(cmds::dist::Cmd),
    /// Replaces the memory routines of a compiled module with bulk memory instructions.
    Patch(cmds::patch::Cmd),
    /// Assembles the distribution directory around an already compiled module.
    Bundle(cmds::bundle::Cmd),
}

#[derive(Debug, Parser)]
pub struct Options {
    /// The distribution profile, `dist.toml` in the current directory by default.
    #[clap(long, global = true, value_hint = ValueHint::FilePath)]
    pub profile: Option<PathBuf>,
}

fn main() -> Result<()> {
    let xtask = Xtask::parse();
    xtask.output.init()?;

    match &xtask.cmd {
        Cmd::Dist(cmd) => cmd.run(&xtask.opts),
        Cmd::Patch(cmd) => cmd.run(&xtask.opts),
        Cmd::Bundle(cmd) => cmd.run(&xtask.opts),
    }
}
