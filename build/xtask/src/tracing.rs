// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io::IsTerminal;

use clap::{ArgAction, Parser, ValueEnum};
use color_eyre::config::{HookBuilder, Theme};
use tracing_core::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[clap(next_help_heading = "Output Options")]
pub struct OutputOptions {
    /// Whether to emit colors in output.
    #[clap(long, env = "CARGO_TERM_COLOR", value_enum, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Configures build logging.
    #[clap(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log: Targets,

    /// Enables verbose logging, repeat for even more output.
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn should_color_stderr(self) -> bool {
        match self {
            ColorMode::Auto => std::io::stderr().is_terminal(),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

impl OutputOptions {
    /// Installs the error report hooks and the global subscriber.
    pub fn init(&self) -> crate::Result<()> {
        let color = self.color.should_color_stderr();

        HookBuilder::default()
            .theme(if color { Theme::dark() } else { Theme::new() })
            .install()?;

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(color)
                    .with_target(self.verbose > 0)
                    .without_time()
                    .with_filter(self.filter()),
            )
            .with(tracing_error::ErrorLayer::default())
            .try_init()?;

        Ok(())
    }

    /// The `--log` filter, raised to at least debug (`-v`) or trace (`-vv`).
    pub fn filter(&self) -> Targets {
        let raised = match self.verbose {
            0 => return self.log.clone(),
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };

        if self.log.default_level().is_some_and(|lvl| lvl >= raised) {
            self.log.clone()
        } else {
            self.log.clone().with_default(raised)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(args: &[&str]) -> OutputOptions {
        OutputOptions::parse_from(std::iter::once("xtask").chain(args.iter().copied()))
    }

    #[test]
    fn verbosity_raises_the_default_level() {
        let plain = output(&["--log", "info"]);
        assert_eq!(plain.filter().default_level(), Some(LevelFilter::INFO));

        let verbose = output(&["--log", "info", "-v"]);
        assert_eq!(verbose.filter().default_level(), Some(LevelFilter::DEBUG));

        let very_verbose = output(&["--log", "info", "-vv"]);
        assert_eq!(
            very_verbose.filter().default_level(),
            Some(LevelFilter::TRACE)
        );
    }

    #[test]
    fn verbosity_never_lowers_the_level() {
        let opts = output(&["--log", "trace", "-v"]);
        assert_eq!(opts.filter().default_level(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn explicit_color_modes() {
        assert!(output(&["--color", "always"]).color.should_color_stderr());
        assert!(!output(&["--color", "never"]).color.should_color_stderr());
    }
}
