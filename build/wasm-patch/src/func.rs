// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::sexpr::{Sexpr, Span};

/// A reference to a local, either by index or by its `$name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalRef<'a> {
    Index(u32),
    Name(&'a str),
}

/// A coarse view of a function body instruction.
///
/// Only the instructions that matter for recognising a routine's shape get
/// their own variant, everything else (including immediates of instructions
/// we don't care about) is kept as an opaque [`Instr::Op`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr<'a> {
    LocalGet(LocalRef<'a>),
    Return,
    /// The start of a `block`, `loop` or `if` construct.
    Block(&'a str),
    End,
    Op(&'a str),
    /// A folded instruction such as `(return (local.get 0))`.
    Folded(Vec<Instr<'a>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param<'a> {
    pub name: Option<&'a str>,
    pub ty: &'a str,
}

/// A `(func ...)` field of a module, split into header and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncBlock<'a> {
    pub name: Option<&'a str>,
    /// The span of the whole `(func ...)` list.
    pub span: Span,
    /// End offset of the last header clause (name, export, import, type, param or result).
    pub header_end: usize,
    pub imported: bool,
    pub params: Vec<Param<'a>>,
    pub results: Vec<&'a str>,
    pub body: Vec<Instr<'a>>,
}

impl<'a> FuncBlock<'a> {
    /// Interprets `sexpr` as a function definition, returns `None` if it is any other module field.
    pub fn parse(sexpr: &Sexpr<'a>) -> Option<Self> {
        let Sexpr::List { items, span } = sexpr else {
            return None;
        };
        let (keyword, rest) = items.split_first()?;
        if keyword.as_atom() != Some("func") {
            return None;
        }

        let mut func = Self {
            name: None,
            span: *span,
            header_end: keyword.span().end,
            imported: false,
            params: Vec::new(),
            results: Vec::new(),
            body: Vec::new(),
        };

        let mut fields = rest.iter().peekable();
        if let Some(name) = fields
            .peek()
            .and_then(|s| s.as_atom())
            .filter(|s| s.starts_with('$'))
        {
            func.name = Some(name);
            func.header_end = fields.next()?.span().end;
        }

        while let Some(field) = fields.peek() {
            match field.head() {
                Some("export" | "type") => {}
                Some("import") => func.imported = true,
                Some("param") => func.params.extend(parse_params(field)),
                Some("result") => func.results.extend(list_atoms(field)),
                _ => break,
            }
            func.header_end = field.span().end;
            fields.next();
        }

        // locals are part of the body as far as we're concerned, they get replaced together with it
        let body: Vec<_> = fields.filter(|field| field.head() != Some("local")).collect();
        func.body = parse_instrs(body.into_iter());

        Some(func)
    }

    /// Whether the body ends by handing back the first parameter, either by
    /// falling off the end with it on the stack or through an explicit `return`.
    pub fn returns_first_param(&self) -> bool {
        let Some(first) = self.params.first() else {
            return false;
        };

        tail_returns(&self.body, first)
    }
}

/// Collects every function defined in the given top-level s-expressions.
///
/// Accepts both a `(module ...)` wrapper and bare module fields.
pub fn collect<'a>(toplevel: &[Sexpr<'a>]) -> Vec<FuncBlock<'a>> {
    let mut funcs = Vec::new();
    for sexpr in toplevel {
        match sexpr {
            Sexpr::List { items, .. } if sexpr.head() == Some("module") => {
                funcs.extend(items.iter().filter_map(FuncBlock::parse));
            }
            _ => funcs.extend(FuncBlock::parse(sexpr)),
        }
    }
    funcs
}

fn is_first_param(local: &LocalRef<'_>, first: &Param<'_>) -> bool {
    match local {
        LocalRef::Index(idx) => *idx == 0,
        LocalRef::Name(name) => first.name == Some(*name),
    }
}

fn tail_returns(instrs: &[Instr<'_>], first: &Param<'_>) -> bool {
    match instrs {
        [.., Instr::LocalGet(local)] | [.., Instr::LocalGet(local), Instr::Return] => {
            is_first_param(local, first)
        }
        [.., Instr::Folded(inner)] => match inner.as_slice() {
            [Instr::LocalGet(local)] => is_first_param(local, first),
            [Instr::Return, Instr::Folded(value)] => {
                matches!(value.as_slice(), [Instr::LocalGet(local)] if is_first_param(local, first))
            }
            _ => false,
        },
        _ => false,
    }
}

fn list_atoms<'a>(sexpr: &Sexpr<'a>) -> Vec<&'a str> {
    match sexpr {
        Sexpr::List { items, .. } => items.iter().skip(1).filter_map(Sexpr::as_atom).collect(),
        _ => Vec::new(),
    }
}

fn parse_params<'a>(sexpr: &Sexpr<'a>) -> Vec<Param<'a>> {
    match list_atoms(sexpr).as_slice() {
        // `(param $dst i32)` declares exactly one named parameter
        [name, ty] if name.starts_with('$') => vec![Param {
            name: Some(*name),
            ty: *ty,
        }],
        types => types.iter().map(|&ty| Param { name: None, ty }).collect(),
    }
}

fn parse_instrs<'a, 'b>(sexprs: impl Iterator<Item = &'b Sexpr<'a>>) -> Vec<Instr<'a>>
where
    'a: 'b,
{
    let mut instrs = Vec::new();
    let mut sexprs = sexprs.peekable();

    while let Some(sexpr) = sexprs.next() {
        let op = match sexpr {
            Sexpr::List { items, .. } => {
                instrs.push(Instr::Folded(parse_instrs(items.iter())));
                continue;
            }
            Sexpr::Str { text, .. } => {
                instrs.push(Instr::Op(*text));
                continue;
            }
            Sexpr::Atom { text, .. } => *text,
        };

        let instr = match op {
            "local.get" => match sexprs.peek().and_then(|s| s.as_atom()) {
                Some(immediate) => {
                    sexprs.next();
                    Instr::LocalGet(parse_local(immediate))
                }
                None => Instr::Op(op),
            },
            "return" => Instr::Return,
            "block" | "loop" | "if" => Instr::Block(op),
            "end" => Instr::End,
            _ => Instr::Op(op),
        };
        instrs.push(instr);
    }

    instrs
}

fn parse_local(text: &str) -> LocalRef<'_> {
    match text.parse() {
        Ok(idx) => LocalRef::Index(idx),
        Err(_) => LocalRef::Name(text),
    }
}
