//! mclisp - McCarthy's original LISP
//!
//! This crate implements the small LISP described in "Recursive Functions of Symbolic
//! Expressions and Their Computation by Machine": seven primitives and a handful of
//! special forms, which together are enough to write `eval` in the language itself.
//! The same `eval`, written as LISP data, ships with the crate and runs on top of the
//! native evaluator.
//!
//! ## The Language
//!
//! ```lisp
//! (quote (a b c))              ; (a b c), also written '(a b c)
//! (atom 'a)                    ; t
//! (eq 'a 'a)                   ; t
//! (car '(a b c))               ; a
//! (cdr '(a b c))               ; (b c)
//! (cons 'a '(b c))             ; (a b c)
//! (cond ((eq 'a 'b) 'first)
//!       ('t 'second))          ; second
//! ((lambda (x) (cons x '(b))) 'a)                      ; (a b)
//! ((label last (lambda (l)
//!    (cond ((eq (cdr l) '()) (car l))
//!          ('t (last (cdr l)))))) '(a b c))            ; c
//! ```
//!
//! ## Semantics
//!
//! - `()` is the only false value; the primitives answer `t` for true
//! - Procedures are ordinary lists headed by `lambda` or `label`, never host closures
//! - Environments are passed explicitly: a lambda body sees the bindings in force where
//!   it is *applied*, not where it was written
//! - `eq` compares atoms only; two pairs are never `eq`
//! - Every failure is reported through [`Error`]; nothing falls back to a default value
//!
//! ## Modules
//!
//! - `ast`: the [`ast::Sexpr`] data model and printer
//! - `reader`: text to S-expressions
//! - `builtinops`: the primitive and special-form registry
//! - `evaluator`: `eval`, `apply` and the [`evaluator::Environment`]
//! - `session`: a top-level harness with `label`/`defun` definitions
//! - `meta`: the self-hosted `eval.` program

use thiserror::Error;

/// Maximum parsing depth for nested lists and quotes
pub const MAX_PARSE_DEPTH: usize = 256;

/// Default maximum evaluation depth
/// Each `eval` and `apply` step counts as one level. The self-hosted evaluator needs
/// a few dozen native levels per level of the program it interprets, so this is
/// much larger than the parse depth.
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (unmatched `)`, misplaced dot, malformed special form)
    InvalidSyntax,
    /// Input ended inside an unclosed list or after a quote
    Incomplete,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Extra input found after a complete expression where only one was expected
    TrailingContent,
    /// No expression found where one was expected
    EmptyInput,
    /// Implementation-imposed limit exceeded (integer literal overflow)
    ImplementationLimit,
}

/// A structured error providing detailed information about a syntax failure.
#[derive(Debug, PartialEq, Eq, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 60 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from `input` around byte `offset`
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 60;
        const LEAD: usize = 20;

        // Offsets inside a multi-byte character count as that character
        let char_offset = input
            .char_indices()
            .take_while(|(i, _)| *i < offset)
            .count();
        let start = char_offset.saturating_sub(LEAD);

        let snippet: String = input.chars().skip(start).take(MAX_CONTEXT).collect();

        let mut context = String::new();
        if start > 0 {
            context.push_str("[...]");
        }
        context.push_str(&snippet);
        if start + snippet.chars().count() < input.chars().count() {
            context.push_str("[...]");
        }
        let context = context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(context), found)
    }
}

/// Every way an evaluation can fail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed text (reader) or a malformed special form (evaluator)
    #[error("SyntaxError: {0}")]
    Syntax(ParseError),
    #[error("UnboundSymbolError: {0}")]
    UnboundSymbol(String),
    #[error("ArityError: {}", arity_message(.expected, .got, .expression))]
    Arity {
        expected: usize,
        got: usize,
        expression: Option<String>,
    },
    /// A primitive received a value of the wrong shape, e.g. `car` of an atom
    #[error("TypeError: {operation} expects a {expected}, got {found}")]
    Type {
        operation: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("NotAProcedureError: cannot apply {0}")]
    NotAProcedure(String),
    #[error("NonExhaustiveCondError: no clause of {0} was true")]
    NonExhaustiveCond(String),
    #[error("RecursionLimitExceeded: evaluation depth exceeded {limit}")]
    RecursionLimitExceeded { limit: usize },
}

fn arity_message(expected: &usize, got: &usize, expression: &Option<String>) -> String {
    match expression {
        Some(expr) => format!("{expr}: expected {expected} arguments, got {got}"),
        None => format!("expected {expected} arguments, got {got}"),
    }
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::Arity {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::Arity {
            expected,
            got,
            expression: Some(expression),
        }
    }

    /// A special form whose shape is wrong, reported as a syntax error on the form
    pub(crate) fn malformed(message: impl Into<String>, form: &ast::Sexpr) -> Self {
        Error::Syntax(ParseError::new(
            ParseErrorKind::InvalidSyntax,
            message,
            Some(form.to_string()),
            None,
        ))
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Syntax(err)
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;

#[cfg(feature = "reader")]
pub mod meta;
#[cfg(feature = "reader")]
pub mod reader;
pub mod session;

pub use ast::Sexpr;
pub use evaluator::{EvalConfig, Environment, apply, eval, eval_with_config};
#[cfg(feature = "reader")]
pub use reader::{Reader, parse, parse_one};
pub use session::Session;

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_context() {
        let input = "(a b c) (d e f) (g h i) (j k l) (m n o) (p q r) )";
        let err = ParseError::with_context(
            ParseErrorKind::InvalidSyntax,
            "unmatched ')'",
            input,
            input.len() - 1,
            Some(")".into()),
        );
        let context = err.context.unwrap();
        assert!(context.starts_with("[...]"));
        assert!(context.ends_with(')'));
        assert_eq!(err.found.as_deref(), Some(")"));

        let short = ParseError::with_context(ParseErrorKind::Incomplete, "eof", "(a\nb", 4, None);
        assert_eq!(short.context.as_deref(), Some("(a\\nb"));

        // Offsets past the end or inside a multi-byte character are tolerated
        for offset in 0..=6 {
            let err = ParseError::with_context(ParseErrorKind::Incomplete, "eof", "(λ ä", offset, None);
            assert_eq!(err.context.as_deref(), Some("(λ ä"), "offset {offset}");
        }
        let long = format!("{}λ)", "é".repeat(40));
        let err = ParseError::with_context(ParseErrorKind::InvalidSyntax, "m", &long, 81, None);
        let context = err.context.unwrap();
        assert!(context.starts_with("[...]"), "{context}");
        assert!(context.ends_with("λ)"), "{context}");
    }

    #[test]
    fn test_error_display() {
        let cases = vec![
            (Error::arity_error(2, 1), "ArityError: expected 2 arguments, got 1"),
            (
                Error::arity_error_with_expr(1, 0, "(car)".into()),
                "ArityError: (car): expected 1 arguments, got 0",
            ),
            (
                Error::UnboundSymbol("foo".into()),
                "UnboundSymbolError: foo",
            ),
            (
                Error::Type {
                    operation: "car",
                    expected: "pair",
                    found: "a".into(),
                },
                "TypeError: car expects a pair, got a",
            ),
            (
                Error::RecursionLimitExceeded { limit: 7 },
                "RecursionLimitExceeded: evaluation depth exceeded 7",
            ),
            (
                Error::from(ParseError::from_message(
                    ParseErrorKind::EmptyInput,
                    "expected an expression",
                )),
                "SyntaxError: expected an expression",
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }
}
