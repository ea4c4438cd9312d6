// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eyre::eyre;

use crate::BuildId;

/// Inserts `id` as the second-to-last dot-separated segment of `basename`.
///
/// `runtime.js` becomes `runtime.<id>.js`, `app.min.js` becomes
/// `app.min.<id>.js` and a name without any dot gets the id prepended.
pub fn add_id(basename: &str, id: &BuildId) -> String {
    let mut parts: Vec<&str> = basename.split('.').collect();
    // split always yields at least one part
    parts.insert(parts.len() - 1, id.as_str());
    parts.join(".")
}

/// A file to ship, and the name the entry document refers to it by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub source: PathBuf,
    /// Only the file name of this path is used.
    pub reference: PathBuf,
}

impl Artifact {
    /// An artifact that is referenced under a different name than it was built as,
    /// e.g. a patched module standing in for the original.
    pub fn new(source: impl Into<PathBuf>, reference: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            reference: reference.into(),
        }
    }

    /// An artifact referenced under its own file name.
    pub fn from_path(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        Self {
            reference: source.clone(),
            source,
        }
    }

    pub fn reference_name(&self) -> Option<&str> {
        self.reference.file_name().and_then(|name| name.to_str())
    }
}

/// Original basename to cache-busted basename, for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameMapping {
    pub source: PathBuf,
    pub original: String,
    pub renamed: String,
}

/// Two artifacts claim the same reference name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateReference {
    pub name: String,
}

impl fmt::Display for DuplicateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "more than one artifact is referenced as `{}`",
            self.name
        )
    }
}

impl core::error::Error for DuplicateReference {}

/// Every rename of a build, computed up front so the entry document can be rewritten in one pass.
#[derive(Debug, Clone, Default)]
pub struct RenameTable {
    mappings: Vec<RenameMapping>,
    by_original: HashMap<String, usize>,
}

impl RenameTable {
    /// Builds the table for `artifacts`, preserving their order.
    ///
    /// # Errors
    ///
    /// Fails if an artifact's reference has no UTF-8 file name, or with
    /// [`DuplicateReference`] if two artifacts share a reference name.
    pub fn new(artifacts: &[Artifact], id: &BuildId) -> eyre::Result<Self> {
        let mut table = Self::default();

        for artifact in artifacts {
            let original = artifact.reference_name().ok_or_else(|| {
                eyre!(
                    "artifact reference {} has no usable file name",
                    artifact.reference.display()
                )
            })?;

            if table.by_original.contains_key(original) {
                return Err(DuplicateReference {
                    name: original.to_string(),
                }
                .into());
            }

            table
                .by_original
                .insert(original.to_string(), table.mappings.len());
            table.mappings.push(RenameMapping {
                source: artifact.source.clone(),
                original: original.to_string(),
                renamed: add_id(original, id),
            });
        }

        Ok(table)
    }

    pub fn mappings(&self) -> &[RenameMapping] {
        &self.mappings
    }

    /// The position of the mapping for `original` in [`RenameTable::mappings`].
    pub fn position(&self, original: &str) -> Option<usize> {
        self.by_original.get(original).copied()
    }

    pub fn renamed(&self, original: &str) -> Option<&str> {
        self.position(original)
            .map(|idx| self.mappings[idx].renamed.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }
}

/// The destination of `mapping` inside `out_dir`.
pub fn destination(out_dir: &Path, mapping: &RenameMapping) -> PathBuf {
    out_dir.join(&mapping.renamed)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn id(s: &str) -> BuildId {
        s.parse().unwrap()
    }

    #[test]
    fn id_goes_before_the_extension() {
        let id = id("ABCD1234");
        assert_eq!(add_id("runtime.js", &id), "runtime.ABCD1234.js");
        assert_eq!(add_id("app.wasm", &id), "app.ABCD1234.wasm");
        assert_eq!(add_id("app.min.js", &id), "app.min.ABCD1234.js");
        assert_eq!(add_id("LICENSE", &id), "ABCD1234.LICENSE");
    }

    #[test]
    fn table_keeps_order_and_uses_basenames() {
        let artifacts = [
            Artifact::from_path("src/runtime.js"),
            Artifact::new("build/spall_patched.wasm", "src/spall.wasm"),
        ];
        let table = RenameTable::new(&artifacts, &id("X1")).unwrap();

        assert_eq!(
            table.mappings(),
            [
                RenameMapping {
                    source: PathBuf::from("src/runtime.js"),
                    original: "runtime.js".to_string(),
                    renamed: "runtime.X1.js".to_string(),
                },
                RenameMapping {
                    source: PathBuf::from("build/spall_patched.wasm"),
                    original: "spall.wasm".to_string(),
                    renamed: "spall.X1.wasm".to_string(),
                },
            ]
        );
        assert_eq!(table.renamed("spall.wasm"), Some("spall.X1.wasm"));
        assert_eq!(table.renamed("spall_patched.wasm"), None);
    }

    #[test]
    fn duplicate_references_are_rejected() {
        let artifacts = [
            Artifact::from_path("a/app.wasm"),
            Artifact::new("b/other.wasm", "app.wasm"),
        ];
        let err = RenameTable::new(&artifacts, &id("X1")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DuplicateReference>(),
            Some(&DuplicateReference {
                name: "app.wasm".to_string()
            })
        );
    }

    #[test]
    fn reference_without_file_name_is_rejected() {
        let artifacts = [Artifact::new("build/app.wasm", "..")];
        assert!(RenameTable::new(&artifacts, &id("X1")).is_err());
    }

    proptest! {
        #[test]
        fn add_id_is_reversible(
            name in "[a-z_-]{1,8}(\\.[a-z0-9]{1,4}){0,3}",
            build_id in "[A-Z0-9]{1,12}",
        ) {
            let renamed = add_id(&name, &build_id.parse().unwrap());

            let mut parts: Vec<&str> = renamed.split('.').collect();
            let original_parts = name.split('.').count();
            prop_assert_eq!(parts.len(), original_parts + 1);
            prop_assert_eq!(parts[parts.len() - 2], build_id.as_str());

            parts.remove(parts.len() - 2);
            prop_assert_eq!(parts.join("."), name);
        }
    }
}
