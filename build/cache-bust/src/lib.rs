// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Assembles a statically hostable directory out of build artifacts.
//!
//! Every artifact is copied under a cache-busted name (`runtime.js` becomes
//! `runtime.<id>.js`) and the entry document's references to it are rewritten to
//! match, so that caches never serve a stale asset next to a fresh page.

mod build_id;
mod document;
mod rename;

use core::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use eyre::Context;

pub use build_id::{BUILD_ID_LEN, BuildId, InvalidBuildId};
pub use document::EntryDocument;
pub use rename::{Artifact, DuplicateReference, RenameMapping, RenameTable, add_id};

/// The file name the entry document is written under, unless configured otherwise.
pub const DEFAULT_ENTRY_NAME: &str = "index.html";

/// A source artifact does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingArtifact {
    pub path: PathBuf,
}

impl fmt::Display for MissingArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artifact {} does not exist", self.path.display())
    }
}

impl core::error::Error for MissingArtifact {}

/// Describes one bundle: where it goes, which build it belongs to, and what is in it.
#[derive(Debug, Clone)]
pub struct Bundle {
    out_dir: PathBuf,
    entry_name: String,
    build_id: BuildId,
    artifacts: Vec<Artifact>,
}

/// The outcome of [`Bundle::assemble`].
#[derive(Debug, Clone)]
pub struct BundleReport {
    pub build_id: BuildId,
    /// The written entry document.
    pub entry: PathBuf,
    /// The renamed artifacts, in the order they were added.
    pub files: Vec<PathBuf>,
    /// Reference names that never occurred in the entry document.
    pub unreferenced: Vec<String>,
}

impl Bundle {
    pub fn new(out_dir: impl Into<PathBuf>, build_id: BuildId) -> Self {
        Self {
            out_dir: out_dir.into(),
            entry_name: DEFAULT_ENTRY_NAME.to_string(),
            build_id,
            artifacts: Vec::new(),
        }
    }

    pub fn entry_name(mut self, name: impl Into<String>) -> Self {
        self.entry_name = name.into();
        self
    }

    pub fn artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn artifacts<I>(mut self, artifacts: I) -> Self
    where
        I: IntoIterator<Item = Artifact>,
    {
        self.artifacts.extend(artifacts);
        self
    }

    pub fn build_id(&self) -> &BuildId {
        &self.build_id
    }

    /// Copies every artifact into the output directory under its cache-busted
    /// name and writes the rewritten entry document next to them.
    ///
    /// An artifact whose name never appears in the template is still copied; it
    /// is logged and listed in [`BundleReport::unreferenced`].
    ///
    /// # Errors
    ///
    /// Fails with [`MissingArtifact`] if a source file does not exist, with
    /// [`DuplicateReference`] if two artifacts share a reference name, and if the
    /// template cannot be read or the output directory cannot be written.
    pub fn assemble(&self, template: &Path) -> eyre::Result<BundleReport> {
        let start = Instant::now();

        let mut document = EntryDocument::from_template(template)?;
        let table = RenameTable::new(&self.artifacts, &self.build_id)?;

        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("could not create {}", self.out_dir.display()))?;

        let mut files = Vec::with_capacity(table.len());
        for mapping in table.mappings() {
            if !mapping.source.is_file() {
                return Err(MissingArtifact {
                    path: mapping.source.clone(),
                }
                .into());
            }

            let dest = rename::destination(&self.out_dir, mapping);
            fs::copy(&mapping.source, &dest).with_context(|| {
                format!(
                    "could not copy {} to {}",
                    mapping.source.display(),
                    dest.display()
                )
            })?;
            tracing::debug!("{} -> {}", mapping.source.display(), dest.display());
            files.push(dest);
        }

        let hits = document.rewrite(&table);
        let unreferenced: Vec<String> = table
            .mappings()
            .iter()
            .zip(&hits)
            .filter(|(_, hits)| **hits == 0)
            .map(|(mapping, _)| mapping.original.clone())
            .collect();
        for name in &unreferenced {
            tracing::warn!(
                "`{name}` is not referenced by {}, it will be shipped but never loaded",
                template.display()
            );
        }

        let entry = self.out_dir.join(&self.entry_name);
        document.persist(&entry)?;

        tracing::info!(
            "Bundled {} artifacts into {} in {:.1} seconds (build {})",
            files.len(),
            self.out_dir.display(),
            start.elapsed().as_secs_f64(),
            self.build_id
        );

        Ok(BundleReport {
            build_id: self.build_id.clone(),
            entry,
            files,
            unreferenced,
        })
    }
}
