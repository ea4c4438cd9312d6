// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use color_eyre::eyre::Context;

use crate::profile::{Mode, Profile};
use crate::util;

/// File extensions of intermediate build outputs that are removed before a build.
const STALE_EXTENSIONS: [&str; 3] = ["o", "wasm", "wat"];

/// Empties the distribution directory and removes stale objects, modules and
/// disassemblies from the build directory.
///
/// Anything else in the build directory is left alone.
pub fn prepare_build_dir(profile: &Profile) -> crate::Result<()> {
    let build_dir = profile.build_dir();
    let dist_dir = profile.dist_dir();

    match fs::remove_dir_all(&dist_dir) {
        Ok(()) => tracing::debug!("removed {}", dist_dir.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("could not clear {}", dist_dir.display()));
        }
    }

    fs::create_dir_all(&build_dir)
        .with_context(|| format!("could not create {}", build_dir.display()))?;
    remove_stale(&build_dir)?;

    Ok(())
}

fn remove_stale(dir: &Path) -> crate::Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("could not read {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            remove_stale(&path)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| STALE_EXTENSIONS.contains(&ext))
        {
            tracing::trace!("removing {}", path.display());
            fs::remove_file(&path)
                .with_context(|| format!("could not remove {}", path.display()))?;
        }
    }

    Ok(())
}

/// Compiles the WebAssembly module, returning the path of the emitted module.
pub fn build_module(profile: &Profile, mode: Mode) -> crate::Result<PathBuf> {
    let start = Instant::now();
    let output = profile.module_path();

    util::exec(module_command(profile, mode))
        .with_context(|| format!("could not compile {}", profile.module_file_name()))?;

    tracing::info!(
        "Compiled {} ({mode}) in {:.1} seconds",
        output.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(output)
}

fn module_command(profile: &Profile, mode: Mode) -> Command {
    let module = &profile.module;

    let mut cmd = Command::new(&module.compiler);
    cmd.current_dir(&profile.root);
    cmd.arg("build").arg(&module.source);
    cmd.args(
        module
            .collections
            .iter()
            .map(|collection| format!("-collection:{collection}")),
    );
    cmd.arg(format!("-target:{}", module.target));
    // the compiler runs inside the project root, so the output is relative to it
    let output = profile.dist.build_dir.join(profile.module_file_name());
    cmd.arg(format!("-out:{}", output.display()));
    cmd.args(module.flags(mode));

    cmd
}

/// Compiles the server binary, returning its path.
pub fn build_server(profile: &Profile) -> crate::Result<PathBuf> {
    let start = Instant::now();
    let output = profile.server_path();

    util::exec(server_command(profile)?).context("could not compile the server")?;

    tracing::info!(
        "Compiled {} in {:.1} seconds",
        output.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(output)
}

fn server_command(profile: &Profile) -> crate::Result<Command> {
    // `go build` runs inside the server sources, so the output path must not be relative
    let output = std::path::absolute(profile.server_path())?;

    let mut cmd = Command::new(&profile.server.compiler);
    cmd.current_dir(profile.resolve_path(&profile.server.source));
    cmd.arg("build").arg("-o").arg(output);

    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    fn args(cmd: &Command) -> Vec<&OsStr> {
        cmd.get_args().collect()
    }

    #[test]
    fn module_command_per_mode() {
        let profile = Profile::default();

        let debug = module_command(&profile, Mode::Debug);
        assert_eq!(debug.get_program(), "odin");
        assert_eq!(debug.get_current_dir(), Some(Path::new(".")));
        assert_eq!(
            args(&debug),
            [
                "build",
                "src",
                "-collection:formats=formats",
                "-target:js_wasm32",
                "-out:build/spall.wasm",
                "-debug",
            ]
        );

        let release = module_command(&profile, Mode::ExtraRelease);
        assert_eq!(args(&release).last(), Some(&OsStr::new("-o:speed")));
        assert!(!args(&release).contains(&OsStr::new("-debug")));
    }

    #[test]
    fn module_lands_in_the_build_dir_of_a_nested_root() {
        let mut profile = Profile::default();
        profile.root = PathBuf::from("web");

        let cmd = module_command(&profile, Mode::Debug);
        let cwd = cmd.get_current_dir().unwrap();
        let out = cmd
            .get_args()
            .find_map(|arg| arg.to_str()?.strip_prefix("-out:"))
            .unwrap();

        assert_eq!(cwd, Path::new("web"));
        assert_eq!(cwd.join(out), Path::new("web/build/spall.wasm"));
        assert_eq!(cwd.join(out), profile.module_path());
    }

    #[test]
    fn server_builds_inside_its_sources() {
        let mut profile = Profile::default();
        profile.root = PathBuf::from("/project");

        let cmd = server_command(&profile).unwrap();
        assert_eq!(cmd.get_program(), "go");
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/project/srvr")));
        assert_eq!(args(&cmd), ["build", "-o", "/project/build/server"]);
    }

    #[test]
    fn prepare_removes_only_stale_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut profile = Profile::default();
        profile.root = dir.path().to_path_buf();

        let build = dir.path().join("build");
        fs::create_dir_all(build.join("dist")).unwrap();
        fs::create_dir_all(build.join("nested")).unwrap();
        for file in [
            "spall.wasm",
            "spall.wat",
            "spall_patched.wat",
            "nested/helper.o",
            "server",
            "notes.txt",
            "dist/index.html",
            "dist/runtime.OLD.js",
        ] {
            fs::write(build.join(file), "x").unwrap();
        }

        prepare_build_dir(&profile).unwrap();

        assert!(!build.join("dist").exists());
        assert!(!build.join("spall.wasm").exists());
        assert!(!build.join("spall.wat").exists());
        assert!(!build.join("spall_patched.wat").exists());
        assert!(!build.join("nested/helper.o").exists());
        assert!(build.join("nested").is_dir());
        assert!(build.join("server").is_file());
        assert!(build.join("notes.txt").is_file());
    }

    #[test]
    fn prepare_creates_the_build_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut profile = Profile::default();
        profile.root = dir.path().to_path_buf();

        prepare_build_dir(&profile).unwrap();
        assert!(dir.path().join("build").is_dir());
    }
}
