// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fs;
use std::path::Path;

use eyre::Context;

use crate::RenameTable;

/// The page that ties the bundle together, e.g. `index.html`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDocument {
    content: String,
}

impl EntryDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Reads the document template at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the template cannot be read or is not UTF-8.
    pub fn from_template(path: &Path) -> eyre::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("could not read entry template {}", path.display()))?;
        Ok(Self::new(content))
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// Replaces every whole filename in the document that appears in `table`
    /// with its renamed counterpart.
    ///
    /// A mapped name matches where neither of its neighbours could continue a
    /// filename (letters and digits of any script, `.`, `_`, `-`, `~`, `+`), so
    /// `runtime.js` is rewritten in `src="./runtime.js"` but not inside
    /// `myruntime.js` or `runtime.js.map`. Where several names fit, the longest
    /// wins. Returns how often each mapping was applied, indexed like
    /// [`RenameTable::mappings`].
    pub fn rewrite(&mut self, table: &RenameTable) -> Vec<usize> {
        let mut names: Vec<_> = table
            .mappings()
            .iter()
            .enumerate()
            .map(|(idx, mapping)| (mapping.original.as_str(), idx))
            .collect();
        names.sort_by_key(|(name, _)| core::cmp::Reverse(name.len()));

        let mut hits = vec![0; table.len()];
        let mut out = String::with_capacity(self.content.len());
        let mut rest = self.content.as_str();
        let mut prev = None;

        while let Some(c) = rest.chars().next() {
            let found = if prev.is_some_and(is_filename_char) {
                None
            } else {
                names.iter().find(|(name, _)| {
                    rest.strip_prefix(*name)
                        .is_some_and(|tail| !name.is_empty() && ends_name(tail))
                })
            };

            match found {
                Some(&(name, idx)) => {
                    hits[idx] += 1;
                    out.push_str(&table.mappings()[idx].renamed);
                    rest = &rest[name.len()..];
                    prev = name.chars().next_back();
                }
                None => {
                    out.push(c);
                    rest = &rest[c.len_utf8()..];
                    prev = Some(c);
                }
            }
        }

        self.content = out;
        hits
    }

    /// Writes the document to `path`.
    ///
    /// # Errors
    ///
    /// Fails if `path` cannot be written.
    pub fn persist(&self, path: &Path) -> eyre::Result<()> {
        fs::write(path, &self.content)
            .with_context(|| format!("could not write entry document {}", path.display()))
    }
}

fn is_filename_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | '~' | '+')
}

/// Whether a name followed by `tail` ends there. A reference at the end of a
/// sentence drags the full stop along.
fn ends_name(tail: &str) -> bool {
    let mut chars = tail.chars();
    match chars.next() {
        None => true,
        Some('.') => !chars.next().is_some_and(is_filename_char),
        Some(c) => !is_filename_char(c),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use proptest::prelude::*;

    use super::*;
    use crate::{Artifact, BuildId};

    fn table(names: &[&str], id: &str) -> RenameTable {
        let artifacts: Vec<_> = names.iter().map(|name| Artifact::from_path(*name)).collect();
        RenameTable::new(&artifacts, &id.parse::<BuildId>().unwrap()).unwrap()
    }

    #[test]
    fn rewrites_references() {
        let mut doc = EntryDocument::new(indoc! {r#"
            <!DOCTYPE html>
            <script src="runtime.js"></script>
            <script>
              const wasm = fetch("./spall.wasm");
              // loaded by runtime.js.
            </script>
        "#});
        let hits = doc.rewrite(&table(&["runtime.js", "spall.wasm"], "ABCD1234"));

        assert_eq!(hits, [2, 1]);
        assert_eq!(
            doc.as_str(),
            indoc! {r#"
                <!DOCTYPE html>
                <script src="runtime.ABCD1234.js"></script>
                <script>
                  const wasm = fetch("./spall.ABCD1234.wasm");
                  // loaded by runtime.ABCD1234.js.
                </script>
            "#}
        );
    }

    #[test]
    fn only_whole_names_are_rewritten() {
        let mut doc = EntryDocument::new("myruntime.js runtime.js.map runtime.js?v=1 runtime-js");
        let hits = doc.rewrite(&table(&["runtime.js"], "X"));

        assert_eq!(hits, [1]);
        assert_eq!(doc.as_str(), "myruntime.js runtime.js.map runtime.X.js?v=1 runtime-js");
    }

    #[test]
    fn overlapping_names_do_not_interfere() {
        // with sequential substring replacement `app.js` would corrupt `app.js.wasm`
        let mut doc = EntryDocument::new(r#"<script src="app.js"></script> <a href="app.js.wasm">"#);
        let hits = doc.rewrite(&table(&["app.js", "app.js.wasm"], "ID"));

        assert_eq!(hits, [1, 1]);
        assert_eq!(
            doc.as_str(),
            r#"<script src="app.ID.js"></script> <a href="app.js.ID.wasm">"#
        );
    }

    #[test]
    fn names_with_tilde_plus_and_non_ascii_are_rewritten() {
        let mut doc = EntryDocument::new(indoc! {r#"
            <script src="./runtime~main.js"></script>
            <script>navigator.serviceWorker.register("app+sw.wasm");</script>
            <script src="héllo.js"></script>
            <script src="x~runtime~main.js"></script>
        "#});
        let hits = doc.rewrite(&table(&["runtime~main.js", "app+sw.wasm", "héllo.js"], "ID"));

        assert_eq!(hits, [1, 1, 1]);
        assert_eq!(
            doc.as_str(),
            indoc! {r#"
                <script src="./runtime~main.ID.js"></script>
                <script>navigator.serviceWorker.register("app+sw.ID.wasm");</script>
                <script src="héllo.ID.js"></script>
                <script src="x~runtime~main.js"></script>
            "#}
        );
    }

    #[test]
    fn names_inside_other_names_are_left_alone() {
        let mut doc = EntryDocument::new("main.js runtime~main.js");
        let hits = doc.rewrite(&table(&["main.js", "runtime~main.js"], "ID"));

        assert_eq!(hits, [1, 1]);
        assert_eq!(doc.as_str(), "main.ID.js runtime~main.ID.js");
    }

    #[test]
    fn unreferenced_artifacts_are_counted() {
        let mut doc = EntryDocument::new("<html></html>");
        assert_eq!(doc.rewrite(&table(&["runtime.js"], "X")), [0]);
        assert_eq!(doc.as_str(), "<html></html>");
    }

    proptest! {
        #[test]
        fn no_original_name_survives(
            pieces in proptest::collection::vec(
                prop_oneof![
                    Just("runtime.js"),
                    Just("app.wasm"),
                    Just("runtime~main.js"),
                    Just("app+sw.wasm"),
                    Just("~"),
                    Just(" "),
                    Just("\""),
                    Just("/"),
                    Just("<script src="),
                    Just("héllo"),
                ],
                0..32,
            )
        ) {
            let content: String = pieces.concat();
            // adjacent pieces glue together into one token, so compare token by token
            let mut doc = EntryDocument::new(content.clone());
            doc.rewrite(&table(
                &["runtime.js", "app.wasm", "runtime~main.js", "app+sw.wasm"],
                "ABCD1234",
            ));

            let expected = content
                .split(|c: char| !is_filename_char(c))
                .map(|token| match token {
                    "runtime.js" => "runtime.ABCD1234.js",
                    "app.wasm" => "app.ABCD1234.wasm",
                    "runtime~main.js" => "runtime~main.ABCD1234.js",
                    "app+sw.wasm" => "app+sw.ABCD1234.wasm",
                    other => other,
                })
                .collect::<Vec<_>>();
            let actual = doc.as_str().split(|c: char| !is_filename_char(c)).collect::<Vec<_>>();
            prop_assert_eq!(actual, expected);
        }
    }
}
