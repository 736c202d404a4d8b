//! Registry of the primitive operations and special forms.
//!
//! McCarthy's LISP has a fixed vocabulary, and this module is its single source of
//! truth. Each entry records the keyword, how the evaluator must treat its arguments
//! and how many it takes.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: arguments are evaluated left to right first (`atom`, `eq`, `car`,
//!   `cdr`, `cons`). These are also the only atoms [`crate::evaluator::apply`] accepts
//!   as procedures, so `(label rest cdr)` followed by `(rest l)` works.
//! - **Special Forms**: receive their arguments unevaluated (`quote`, `cond`,
//!   `lambda`, `label`).
//!
//! Keywords are recognized by name before any environment lookup, so binding a
//! variable called `car` does not change what `(car x)` means.
//!
//! ## Truth
//!
//! Predicates answer the symbol `t` for true and `()` for false. Any value other than
//! `()` counts as true where a condition is expected.

use crate::Error;
use crate::ast::Sexpr;
use crate::evaluator::{Arity, Depth, Environment, eval_cond, eval_label, eval_lambda, eval_quote};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Signature of a primitive that receives evaluated arguments
pub(crate) type FunctionFn = fn(&[Sexpr]) -> Result<Sexpr, Error>;

/// Signature of a special form: the whole form (for error context and for forms that
/// evaluate to themselves), its unevaluated arguments, the environment and the current
/// evaluation depth
pub(crate) type SpecialFormFn = fn(&Sexpr, &[Sexpr], &Environment, Depth) -> Result<Sexpr, Error>;

/// Represents the implementation of a built-in keyword
#[derive(Clone, Copy)]
pub(crate) enum OpKind {
    Function(FunctionFn),
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in keyword
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOp {
    pub id: &'static str,
    pub(crate) op_kind: OpKind,
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    /// Check if the given number of arguments is valid for this operation
    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        self.arity.validate(arg_count)
    }
}

//
// Primitive function implementations
//
// Arity is checked by the caller against the registry, the slice patterns below only
// destructure.
//

fn builtin_atom(args: &[Sexpr]) -> Result<Sexpr, Error> {
    match args {
        [x] => Ok(Sexpr::from_bool(x.is_atom())),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

fn builtin_eq(args: &[Sexpr]) -> Result<Sexpr, Error> {
    match args {
        [x, y] => Ok(Sexpr::from_bool(x.is_eq(y))),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

fn builtin_car(args: &[Sexpr]) -> Result<Sexpr, Error> {
    match args {
        [x] => x.car().cloned().ok_or_else(|| not_a_pair("car", x)),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

fn builtin_cdr(args: &[Sexpr]) -> Result<Sexpr, Error> {
    match args {
        [x] => x.cdr().cloned().ok_or_else(|| not_a_pair("cdr", x)),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

// The second argument may be anything; an atom there makes a dotted pair.
fn builtin_cons(args: &[Sexpr]) -> Result<Sexpr, Error> {
    match args {
        [first, rest] => Ok(Sexpr::cons(first.clone(), rest.clone())),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

fn not_a_pair(operation: &'static str, found: &Sexpr) -> Error {
    Error::Type {
        operation,
        expected: "pair",
        found: found.to_string(),
    }
}

/// Global registry of all keywords, in the order McCarthy introduces them.
static BUILTIN_OPS: [BuiltinOp; 9] = [
    BuiltinOp {
        id: "quote",
        op_kind: OpKind::SpecialForm(eval_quote),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "atom",
        op_kind: OpKind::Function(builtin_atom),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "eq",
        op_kind: OpKind::Function(builtin_eq),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "car",
        op_kind: OpKind::Function(builtin_car),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "cdr",
        op_kind: OpKind::Function(builtin_cdr),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "cons",
        op_kind: OpKind::Function(builtin_cons),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "cond",
        op_kind: OpKind::SpecialForm(eval_cond),
        arity: Arity::Any,
    },
    BuiltinOp {
        id: "lambda",
        op_kind: OpKind::SpecialForm(eval_lambda),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "label",
        op_kind: OpKind::SpecialForm(eval_label),
        arity: Arity::Exact(2),
    },
];

/// Lazy static map from keyword to BuiltinOp (private - use find_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| BUILTIN_OPS.iter().map(|op| (op.id, op)).collect());

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    &BUILTIN_OPS
}

/// Find a builtin operation by its keyword
pub fn find_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}

/// Find a primitive that may be applied to evaluated arguments
pub(crate) fn find_function(id: &str) -> Option<(&'static BuiltinOp, FunctionFn)> {
    let op = find_op(id)?;
    match op.op_kind {
        OpKind::Function(func) => Some((op, func)),
        OpKind::SpecialForm(_) => None,
    }
}
