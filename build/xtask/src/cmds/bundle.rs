// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::path::{Path, PathBuf};

use cache_bust::{Artifact, Bundle, BundleReport, BuildId};
use clap::{Parser, ValueHint};

use crate::Options;
use crate::profile::Profile;

#[derive(Debug, Parser)]
pub struct Cmd {
    /// The compiled (and possibly patched) module to ship.
    #[clap(value_hint = ValueHint::FilePath)]
    module: PathBuf,

    /// Tags the bundled assets with this id instead of a random one.
    #[clap(long)]
    build_id: Option<BuildId>,
}

impl Cmd {
    pub fn run(&self, opts: &Options) -> crate::Result<()> {
        let profile = Profile::load(opts.profile.as_deref())?;
        bundle(&profile, &self.module, self.build_id.clone())?;
        Ok(())
    }
}

/// Assembles the distribution directory from the runtime script and `module`.
///
/// The module is always referenced as `<name>.wasm`, whatever its file is called.
pub fn bundle(
    profile: &Profile,
    module: &Path,
    build_id: Option<BuildId>,
) -> crate::Result<BundleReport> {
    let build_id = build_id.unwrap_or_else(BuildId::generate);
    tracing::debug!("build id {build_id}");

    let report = Bundle::new(profile.dist_dir(), build_id)
        .entry_name(&profile.dist.entry_name)
        .artifact(Artifact::from_path(
            profile.resolve_path(&profile.dist.runtime_script),
        ))
        .artifact(Artifact::new(module, profile.module_file_name()))
        .assemble(&profile.resolve_path(&profile.dist.entry_template))?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use indoc::indoc;

    use super::*;

    #[test]
    fn bundles_the_profile_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut profile = Profile::default();
        profile.root = dir.path().to_path_buf();

        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::write(
            dir.path().join("src/index.html"),
            indoc! {r#"
                <script src="runtime.js"></script>
                <script>runWasm("spall.wasm");</script>
            "#},
        )
        .unwrap();
        fs::write(dir.path().join("src/runtime.js"), "// runtime\n").unwrap();
        let module = dir.path().join("build/spall_patched.wasm");
        fs::write(&module, b"\0asm\x01\0\0\0").unwrap();

        let report = bundle(&profile, &module, Some("ABCD1234".parse().unwrap())).unwrap();

        let dist = dir.path().join("build/dist");
        assert_eq!(report.entry, dist.join("index.html"));
        assert!(dist.join("runtime.ABCD1234.js").is_file());
        assert_eq!(
            fs::read(dist.join("spall.ABCD1234.wasm")).unwrap(),
            b"\0asm\x01\0\0\0"
        );
        assert_eq!(
            fs::read_to_string(&report.entry).unwrap(),
            indoc! {r#"
                <script src="runtime.ABCD1234.js"></script>
                <script>runWasm("spall.ABCD1234.wasm");</script>
            "#}
        );
    }
}
