// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use color_eyre::eyre::Context;
use serde::Deserialize;

/// The profile read when `--profile` is not given.
pub const DEFAULT_PROFILE: &str = "dist.toml";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
struct RawProfile {
    name: Option<String>,
    module: Module,
    server: Server,
    wabt: Wabt,
    dist: Dist,
}

/// How the WebAssembly module is compiled.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Module {
    pub compiler: PathBuf,
    pub source: PathBuf,
    pub target: String,
    pub collections: Vec<String>,
    pub debug_flags: Vec<String>,
    pub release_flags: Vec<String>,
}

impl Default for Module {
    fn default() -> Self {
        Self {
            compiler: PathBuf::from("odin"),
            source: PathBuf::from("src"),
            target: "js_wasm32".to_string(),
            collections: vec!["formats=formats".to_string()],
            debug_flags: vec!["-debug".to_string()],
            release_flags: vec!["-o:speed".to_string()],
        }
    }
}

impl Module {
    pub fn flags(&self, mode: Mode) -> &[String] {
        match mode {
            Mode::Debug => &self.debug_flags,
            Mode::Release | Mode::ExtraRelease => &self.release_flags,
        }
    }
}

/// How the auxiliary server binary is compiled.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Server {
    pub compiler: PathBuf,
    pub source: PathBuf,
    pub output: String,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            compiler: PathBuf::from("go"),
            source: PathBuf::from("srvr"),
            output: "server".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Wabt {
    pub wasm2wat: PathBuf,
    pub wat2wasm: PathBuf,
    /// Passed to `wat2wasm` before the input, e.g. `--enable-bulk-memory`.
    pub reassembler_args: Vec<String>,
}

impl Default for Wabt {
    fn default() -> Self {
        Self {
            wasm2wat: PathBuf::from("wasm2wat"),
            wat2wasm: PathBuf::from("wat2wasm"),
            reassembler_args: Vec::new(),
        }
    }
}

/// Where things end up.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Dist {
    pub build_dir: PathBuf,
    pub dir: PathBuf,
    pub entry_template: PathBuf,
    pub runtime_script: PathBuf,
    pub entry_name: String,
}

impl Default for Dist {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            dir: PathBuf::from("build/dist"),
            entry_template: PathBuf::from("src/index.html"),
            runtime_script: PathBuf::from("src/runtime.js"),
            entry_name: cache_bust::DEFAULT_ENTRY_NAME.to_string(),
        }
    }
}

/// Which flavour of build `xtask dist` produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Debug,
    /// Optimized for speed.
    Release,
    /// Optimized for speed, with the memory routines patched to bulk memory instructions.
    ExtraRelease,
}

impl Mode {
    /// Anything but `release` or `extrarelease` selects a debug build.
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector {
            Some("release") => Mode::Release,
            Some("extrarelease") => Mode::ExtraRelease,
            _ => Mode::Debug,
        }
    }

    pub fn patches_module(self) -> bool {
        matches!(self, Mode::ExtraRelease)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Debug => "debug",
            Mode::Release => "release",
            Mode::ExtraRelease => "extrarelease",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct Profile {
    /// Base name of the module, `<name>.wasm`.
    pub name: String,
    pub module: Module,
    pub server: Server,
    pub wabt: Wabt,
    pub dist: Dist,
    /// Directory relative paths are resolved against.
    pub root: PathBuf,
}

impl Default for Profile {
    fn default() -> Self {
        Self::from_raw(RawProfile::default(), PathBuf::from("."))
    }
}

impl Profile {
    /// Loads the profile at `path`, or `dist.toml` in the current directory if
    /// `path` is `None`.
    ///
    /// Without an explicit path a missing profile is not an error, the
    /// defaults are used instead. Tool paths are then overridden from the
    /// environment.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut profile = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_PROFILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_PROFILE))?
            }
            None => {
                tracing::debug!("no {DEFAULT_PROFILE} found, using defaults");
                Self::default()
            }
        };

        profile.apply_env(|var| std::env::var_os(var));
        Ok(profile)
    }

    pub fn from_file(file_path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(file_path)
            .with_context(|| format!("could not read {}", file_path.display()))?;

        let root = file_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        Self::from_toml(&contents, root)
            .with_context(|| format!("failed to parse {}", file_path.display()))
    }

    fn from_toml(contents: &str, root: PathBuf) -> crate::Result<Self> {
        let raw: RawProfile = toml::from_str(contents)?;
        Ok(Self::from_raw(raw, root))
    }

    fn from_raw(raw: RawProfile, root: PathBuf) -> Self {
        Self {
            name: raw.name.unwrap_or_else(|| "spall".to_string()),
            module: raw.module,
            server: raw.server,
            wabt: raw.wabt,
            dist: raw.dist,
            root,
        }
    }

    /// Overrides tool paths with the `ODIN`, `GO`, `WASM2WAT` and `WAT2WASM` variables.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<OsString>) {
        let tools = [
            ("ODIN", &mut self.module.compiler),
            ("GO", &mut self.server.compiler),
            ("WASM2WAT", &mut self.wabt.wasm2wat),
            ("WAT2WASM", &mut self.wabt.wat2wasm),
        ];

        for (var, tool) in tools {
            if let Some(value) = lookup(var).filter(|value| !value.is_empty()) {
                tracing::debug!("{var} overrides {}", tool.display());
                *tool = PathBuf::from(value);
            }
        }
    }

    /// Resolves `path` against the directory of the profile file.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.resolve_path(&self.dist.build_dir)
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.resolve_path(&self.dist.dir)
    }

    /// The module as emitted by the compiler.
    pub fn module_path(&self) -> PathBuf {
        self.build_dir().join(self.module_file_name())
    }

    /// The module after its memory routines have been patched.
    pub fn patched_module_path(&self) -> PathBuf {
        self.build_dir().join(format!("{}_patched.wasm", self.name))
    }

    /// The name the entry document refers to the module by.
    pub fn module_file_name(&self) -> String {
        format!("{}.wasm", self.name)
    }

    pub fn server_path(&self) -> PathBuf {
        self.build_dir().join(&self.server.output)
    }

    pub fn wabt(&self) -> wasm_patch::Wabt {
        wasm_patch::Wabt::new(&self.wabt.wasm2wat, &self.wabt.wat2wasm)
            .reassembler_args(&self.wabt.reassembler_args)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn defaults() {
        let profile = Profile::default();

        assert_eq!(profile.name, "spall");
        assert_eq!(profile.module, Module::default());
        assert_eq!(profile.module.flags(Mode::Debug), ["-debug"]);
        assert_eq!(profile.module.flags(Mode::ExtraRelease), ["-o:speed"]);
        assert_eq!(profile.module_path(), Path::new("./build/spall.wasm"));
        assert_eq!(
            profile.patched_module_path(),
            Path::new("./build/spall_patched.wasm")
        );
        assert_eq!(profile.server_path(), Path::new("./build/server"));
        assert_eq!(profile.dist_dir(), Path::new("./build/dist"));
    }

    #[test]
    fn partial_profile() {
        let profile = Profile::from_toml(
            indoc! {r#"
                name = "viewer"

                [module]
                release-flags = ["-o:aggressive", "-no-bounds-check"]

                [wabt]
                reassembler-args = ["--enable-bulk-memory"]

                [dist]
                dir = "public"
            "#},
            PathBuf::from("/project"),
        )
        .unwrap();

        assert_eq!(profile.name, "viewer");
        assert_eq!(
            profile.module.flags(Mode::Release),
            ["-o:aggressive", "-no-bounds-check"]
        );
        assert_eq!(profile.module.flags(Mode::Debug), ["-debug"]);
        assert_eq!(profile.module.compiler, Path::new("odin"));
        assert_eq!(profile.wabt.reassembler_args, ["--enable-bulk-memory"]);
        assert_eq!(profile.dist_dir(), Path::new("/project/public"));
        assert_eq!(profile.build_dir(), Path::new("/project/build"));
        assert_eq!(profile.module_file_name(), "viewer.wasm");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Profile::from_toml(
            indoc! {r#"
                [module]
                optimise = true
            "#},
            PathBuf::from("."),
        )
        .unwrap_err();
        assert!(format!("{err:?}").contains("optimise"));
    }

    #[test]
    fn paths_resolve_against_the_profile() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dist.toml");
        std::fs::write(&file, "[dist]\nentry-template = \"web/index.html\"\n").unwrap();

        let profile = Profile::from_file(&file).unwrap();
        assert_eq!(profile.root, dir.path());
        assert_eq!(
            profile.resolve_path(&profile.dist.entry_template),
            dir.path().join("web/index.html")
        );
        assert_eq!(
            profile.resolve_path("/abs/runtime.js"),
            Path::new("/abs/runtime.js")
        );
    }

    #[test]
    fn explicit_missing_profile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Profile::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("could not read"));
    }

    #[test]
    fn environment_overrides_tools() {
        let mut profile = Profile::default();
        profile.apply_env(|var| match var {
            "ODIN" => Some("/opt/odin/odin".into()),
            "WAT2WASM" => Some("/usr/local/bin/wat2wasm".into()),
            "GO" => Some("".into()),
            _ => None,
        });

        assert_eq!(profile.module.compiler, Path::new("/opt/odin/odin"));
        assert_eq!(profile.wabt.wat2wasm, Path::new("/usr/local/bin/wat2wasm"));
        assert_eq!(profile.wabt.wasm2wat, Path::new("wasm2wat"));
        assert_eq!(profile.server.compiler, Path::new("go"));
    }

    #[test]
    fn mode_selector() {
        assert_eq!(Mode::from_selector(None), Mode::Debug);
        assert_eq!(Mode::from_selector(Some("release")), Mode::Release);
        assert_eq!(Mode::from_selector(Some("extrarelease")), Mode::ExtraRelease);
        assert_eq!(Mode::from_selector(Some("Release")), Mode::Debug);
        assert_eq!(Mode::from_selector(Some("fast")), Mode::Debug);

        assert!(Mode::ExtraRelease.patches_module());
        assert!(!Mode::Release.patches_module());
    }
}
