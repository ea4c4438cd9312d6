// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

use crate::func::FuncBlock;

/// The memory routines we know how to replace.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Routine {
    Memcpy,
    Memmove,
    Memset,
}

impl Routine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Routine::Memcpy => "memcpy",
            Routine::Memmove => "memmove",
            Routine::Memset => "memset",
        }
    }
}

impl fmt::Display for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bulk memory instruction a routine collapses into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BulkOp {
    Copy,
    Fill,
}

impl BulkOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOp::Copy => "memory.copy",
            BulkOp::Fill => "memory.fill",
        }
    }
}

/// Why a rule did not apply to a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Miss {
    /// No function with the routine's name exists.
    NotFound,
    /// The function is imported and has no body to replace.
    Imported,
    /// The function does not take three parameters and return the first one's type.
    Signature { params: usize, results: usize },
    /// The body does not end by returning the first parameter.
    NoTerminalReturn,
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Miss::NotFound => f.write_str("no such function"),
            Miss::Imported => f.write_str("function is imported"),
            Miss::Signature { params, results } => write!(
                f,
                "unexpected signature ({params} params, {results} results)"
            ),
            Miss::NoTerminalReturn => f.write_str("body does not return its first parameter"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PatchRule {
    pub routine: Routine,
    /// The function identifier as printed by the disassembler.
    pub symbol: &'static str,
    pub op: BulkOp,
}

/// One rule per routine; each matches a distinct function so they never overlap.
pub const RULES: [PatchRule; 3] = [
    PatchRule {
        routine: Routine::Memcpy,
        symbol: "$memcpy",
        op: BulkOp::Copy,
    },
    PatchRule {
        routine: Routine::Memmove,
        symbol: "$memmove",
        op: BulkOp::Copy,
    },
    PatchRule {
        routine: Routine::Memset,
        symbol: "$memset",
        op: BulkOp::Fill,
    },
];

impl PatchRule {
    pub fn matches_name(&self, func: &FuncBlock<'_>) -> bool {
        func.name == Some(self.symbol)
    }

    /// Checks that `func` has the shape of a `(dst, src|value, len) -> dst` routine.
    ///
    /// # Errors
    ///
    /// Returns the reason the function cannot be safely replaced.
    pub fn check(&self, func: &FuncBlock<'_>) -> Result<(), Miss> {
        if func.imported {
            return Err(Miss::Imported);
        }

        let signature_ok = func.params.len() == 3
            && func.results.len() == 1
            && func.params.first().map(|p| p.ty) == func.results.first().copied();
        if !signature_ok {
            return Err(Miss::Signature {
                params: func.params.len(),
                results: func.results.len(),
            });
        }

        if !func.returns_first_param() {
            return Err(Miss::NoTerminalReturn);
        }

        Ok(())
    }

    /// Renders the replacement for `func`, reusing its header text from `src` verbatim.
    pub fn render(&self, src: &str, func: &FuncBlock<'_>) -> String {
        let header = &src[func.span.start..func.header_end];
        let indent = format!("{}  ", line_indent(src, func.span.start));

        let mut out = String::from(header);
        for instr in [
            "local.get 0",
            "local.get 1",
            "local.get 2",
            self.op.as_str(),
            "local.get 0)",
        ] {
            out.push('\n');
            out.push_str(&indent);
            out.push_str(instr);
        }
        out
    }
}

/// The leading whitespace of the line containing `offset`.
fn line_indent(src: &str, offset: usize) -> &str {
    let line_start = src[..offset].rfind('\n').map_or(0, |idx| idx + 1);
    let line = &src[line_start..offset];
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}
