// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Replaces the byte-loop `memcpy`, `memmove` and `memset` implementations
//! emitted by the compiler with the `memory.copy` and `memory.fill` bulk memory
//! instructions.
//!
//! The patch operates on the text format: the module is disassembled with
//! `wasm2wat`, every matching function has its body swapped for a
//! three-argument bulk instruction, and the result is reassembled with
//! `wat2wasm`. Functions are matched structurally (by name, arity and the way
//! the body returns its first parameter), a routine that doesn't match is left
//! alone and the module stays correct, just slower.

mod func;
mod rule;
mod sexpr;
mod wabt;

pub use func::{FuncBlock, Instr, LocalRef, Param};
pub use rule::{BulkOp, Miss, PatchRule, RULES, Routine};
pub use sexpr::MalformedDisassembly;
pub use wabt::{FailureKind, ModuleTools, PatchedModule, ToolchainFailure, Wabt, patch_module};

/// What happened to each routine during a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    outcomes: Vec<(Routine, Result<(), Miss>)>,
}

impl PatchReport {
    fn record(&mut self, routine: Routine, outcome: Result<(), Miss>) {
        match &outcome {
            Ok(()) => tracing::debug!("replaced `{routine}` with a bulk memory instruction"),
            Err(miss) => tracing::debug!("leaving `{routine}` untouched: {miss}"),
        }
        self.outcomes.push((routine, outcome));
    }

    /// The routines whose body was replaced.
    pub fn applied(&self) -> impl Iterator<Item = Routine> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_ok())
            .map(|(routine, _)| *routine)
    }

    /// The routines left untouched, along with the reason.
    pub fn skipped(&self) -> impl Iterator<Item = (Routine, &Miss)> + '_ {
        self.outcomes
            .iter()
            .filter_map(|(routine, outcome)| outcome.as_ref().err().map(|miss| (*routine, miss)))
    }

    pub fn outcome(&self, routine: Routine) -> Option<&Result<(), Miss>> {
        self.outcomes
            .iter()
            .find(|(r, _)| *r == routine)
            .map(|(_, outcome)| outcome)
    }
}

/// Patches the disassembly `wat`, returning the new text and a report of which routines were replaced.
///
/// Text outside the replaced functions is preserved byte-for-byte.
///
/// # Errors
///
/// Returns [`MalformedDisassembly`] if `wat` is not a well-formed sequence of s-expressions.
pub fn patch_text(wat: &str) -> Result<(String, PatchReport), MalformedDisassembly> {
    let toplevel = sexpr::parse(wat)?;
    let funcs = func::collect(&toplevel);

    let mut report = PatchReport::default();
    let mut edits = Vec::new();

    for rule in &RULES {
        let mut found = false;
        for func in funcs.iter().filter(|func| rule.matches_name(func)) {
            found = true;
            let outcome = rule.check(func);
            if outcome.is_ok() {
                edits.push((func.span, rule.render(wat, func)));
            }
            report.record(rule.routine, outcome);
        }
        if !found {
            report.record(rule.routine, Err(Miss::NotFound));
        }
    }

    edits.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(wat.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        out.push_str(&wat[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.push_str(&wat[cursor..]);

    Ok((out, report))
}
