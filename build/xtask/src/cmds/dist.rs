// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::time::Instant;

use cache_bust::BuildId;
use clap::Parser;

use crate::Options;
use crate::profile::{Mode, Profile};

#[derive(Debug, Parser)]
pub struct Cmd {
    /// `release` optimizes for speed, `extrarelease` additionally patches the
    /// memory routines to use bulk memory instructions. Anything else builds
    /// in debug mode.
    mode: Option<String>,

    /// Tags the bundled assets with this id instead of a random one.
    #[clap(long)]
    build_id: Option<BuildId>,
}

impl Cmd {
    pub fn run(&self, opts: &Options) -> crate::Result<()> {
        let start = Instant::now();
        let profile = Profile::load(opts.profile.as_deref())?;
        let mode = Mode::from_selector(self.mode.as_deref());

        tracing::info!("Building {} ({mode})", profile.name);

        crate::build::prepare_build_dir(&profile)?;
        let module = crate::build::build_module(&profile, mode)?;
        crate::build::build_server(&profile)?;

        let module = if mode.patches_module() {
            super::patch::patch(&profile, &module, &profile.patched_module_path())?
        } else {
            module
        };

        let report = super::bundle::bundle(&profile, &module, self.build_id.clone())?;

        tracing::info!(
            "Finished {} ({mode}, build {}) in {:.1} seconds",
            report.entry.display(),
            report.build_id,
            start.elapsed().as_secs_f64()
        );

        Ok(())
    }
}
