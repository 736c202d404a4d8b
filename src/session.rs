//! A top-level harness for running whole programs
//!
//! The core language has no way to name things for later forms: a `label`
//! expression only names a procedure while that procedure is being applied. A
//! [`Session`] adds the missing top level. It keeps an environment that grows as
//! definitions are read, and evaluates every other form against it.
//!
//! Two definition forms are recognized, and only at the top level:
//!
//! ```lisp
//! (label rest cdr)                       ; rest now names the primitive cdr
//! (label l (a b c))                      ; l names the list (a b c), unevaluated
//! (defun wrap (x) (cons x '()))          ; same as (label wrap (lambda (x) ...))
//! ```
//!
//! Both evaluate to `()`. Nested inside another form, `label` keeps its usual
//! meaning and `defun` is just an unbound symbol.

use crate::Error;
use crate::ast::{Atom, Sexpr, Symbol};
use crate::evaluator::{EvalConfig, Environment, eval_with_config};

/// Evaluates top-level forms against an environment that accumulates definitions
#[derive(Debug, Clone)]
pub struct Session {
    env: Environment,
    config: EvalConfig,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session over [`Environment::standard`]
    pub fn new() -> Self {
        Session {
            env: Environment::standard(),
            config: EvalConfig::default(),
        }
    }

    /// A session over a caller-supplied environment
    pub fn with_env(env: Environment) -> Self {
        Session {
            env,
            config: EvalConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Bind `name` to `value` for every later form
    pub fn define(&mut self, name: &str, value: Sexpr) {
        self.env = self.env.bind(Symbol::new(name), value);
    }

    /// Read and evaluate every form in `source`, answering the value of the last one
    /// (`()` when there are none)
    ///
    /// Evaluation stops at the first error. Definitions made by earlier forms are kept.
    #[cfg(feature = "reader")]
    pub fn run(&mut self, source: &str) -> Result<Sexpr, Error> {
        let mut result = Sexpr::Nil;
        for form in crate::reader::Reader::new(source) {
            result = self.eval_form(&form?)?;
        }
        Ok(result)
    }

    /// Evaluate one top-level form
    ///
    /// A failing form leaves the environment exactly as it was.
    pub fn eval_form(&mut self, form: &Sexpr) -> Result<Sexpr, Error> {
        if let Some((name, value)) = top_level_definition(form)? {
            tracing::debug!(%name, %value, "define");
            self.env = self.env.bind(name, value);
            return Ok(Sexpr::Nil);
        }
        tracing::debug!(%form, "eval");
        eval_with_config(form, &self.env, &self.config)
    }
}

/// Recognize `(label name value)` and `(defun name params body)`
///
/// Answers `None` for any other form. A `label` of the wrong length is left to the
/// evaluator, which reports it as an arity error.
fn top_level_definition(form: &Sexpr) -> Result<Option<(Symbol, Sexpr)>, Error> {
    let Some(keyword) = form.car().and_then(Sexpr::as_symbol) else {
        return Ok(None);
    };
    let parts = match keyword {
        "label" | "defun" => form.to_vec().unwrap_or_default(),
        _ => return Ok(None),
    };

    match (keyword, parts.as_slice()) {
        ("label", [_, name, value]) => Ok(Some((definition_name(name, form)?, value.clone()))),
        ("label", _) => Ok(None),
        ("defun", [_, name, params, body]) => {
            let name = definition_name(name, form)?;
            if !params
                .to_vec()
                .is_some_and(|params| params.iter().all(|p| p.as_symbol().is_some()))
            {
                return Err(Error::malformed(
                    "defun parameters must be a list of symbols",
                    form,
                ));
            }
            let lambda = Sexpr::list([Sexpr::symbol("lambda"), params.clone(), body.clone()]);
            Ok(Some((name, lambda)))
        }
        _ => Err(Error::arity_error_with_expr(
            3,
            parts.len().saturating_sub(1),
            form.to_string(),
        )),
    }
}

fn definition_name(name: &Sexpr, form: &Sexpr) -> Result<Symbol, Error> {
    match name {
        Sexpr::Atom(Atom::Symbol(symbol)) => Ok(symbol.clone()),
        _ => Err(Error::malformed("the name being defined must be a symbol", form)),
    }
}

#[cfg(all(test, feature = "reader"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};
    use crate::reader::parse_one;

    /// Test result variants for session tests
    #[derive(Debug)]
    enum TestResult {
        EvalResult(Sexpr),           // The program should succeed with this value
        SpecificError(&'static str), // The program should fail with error containing this string
    }
    use TestResult::*;

    fn success<T: Into<Sexpr>>(value: T) -> TestResult {
        EvalResult(val(value))
    }

    /// Each program runs in a fresh session
    fn run_programs(programs: Vec<(&str, TestResult)>) {
        for (i, (source, expected)) in programs.iter().enumerate() {
            let test_id = format!("Program #{}", i + 1);
            let mut session = Session::new();
            match (session.run(source), expected) {
                (Ok(actual), EvalResult(expected_val)) => {
                    assert_eq!(&actual, expected_val, "{test_id}: {source}");
                }
                (Err(err), SpecificError(text)) => {
                    let message = err.to_string();
                    assert!(
                        message.contains(text),
                        "{test_id}: error should contain '{text}', got: {message}"
                    );
                }
                (Ok(actual), SpecificError(text)) => {
                    panic!("{test_id}: expected error containing '{text}', got {actual}")
                }
                (Err(err), EvalResult(expected_val)) => {
                    panic!("{test_id}: expected {expected_val}, got error {err:?}")
                }
            }
        }
    }

    #[test]
    fn test_programs_data_driven() {
        run_programs(vec![
            ("", EvalResult(nil())),
            ("; nothing but a comment", EvalResult(nil())),
            ("'a 'b 'c", success("c")),
            // Top-level label binds data without evaluating it
            ("(label l (a b c)) (cdr l)", success(["b", "c"])),
            ("(label l (a b c))", EvalResult(nil())),
            // ... and primitives, which are then applicable
            ("(label l (a b c)) (label REST cdr) (REST l)", success(["b", "c"])),
            (
                "(label wrap (lambda (x) (cons x '()))) (wrap 'wrap_me)",
                success(["wrap_me"]),
            ),
            (
                "(defun separate (lst)
                    (cond
                        ((eq (cdr lst) '()) lst)
                        ('t (cons (car lst) (cons '| (separate (cdr lst)))))))
                 (separate '(a b c))",
                success(["a", "|", "b", "|", "c"]),
            ),
            // Later definitions shadow earlier ones
            ("(label x 'first) (label x 'second) x", success(vec![sym("quote"), sym("second")])),
            // Inside another form, label is an ordinary procedure expression
            ("(car (label f (lambda (x) x)))", success("label")),
            ("(defun f x x)", SpecificError("SyntaxError")),
            ("(defun f (x))", SpecificError("ArityError")),
            ("(defun (f) (x) x)", SpecificError("SyntaxError")),
            ("(label 7 'a)", SpecificError("SyntaxError")),
            ("(label f)", SpecificError("ArityError")),
            ("((defun f (x) x) 'a)", SpecificError("UnboundSymbolError: defun")),
            ("(car 'a) (label never 'reached)", SpecificError("TypeError")),
            ("(a b", SpecificError("SyntaxError")),
        ]);
    }

    #[test]
    fn test_failed_form_keeps_environment() {
        let mut session = Session::new();
        session.run("(label x 'kept)").unwrap();
        let before = session.env().len();

        assert!(session.run("(label y 'defined) (car 'a)").is_err());
        // The definition before the failing form sticks; the failure itself adds nothing
        assert_eq!(session.env().len(), before + 1);
        assert!(session.eval_form(&parse_one("(defun g 1 x)").unwrap()).is_err());
        assert_eq!(session.env().len(), before + 1);
        assert_eq!(session.run("x").unwrap(), val(vec![sym("quote"), sym("kept")]));
    }

    #[test]
    fn test_long_flat_list_program() {
        const LEN: usize = 300_000;
        let source = format!("(cdr '({}))", vec!["a"; LEN].join(" "));
        let result = Session::new().run(&source).unwrap();
        assert_eq!(result, val(vec!["a"; LEN - 1]));
    }

    #[test]
    fn test_define_and_config() {
        let mut session = Session::with_env(Environment::new())
            .with_config(EvalConfig { max_depth: 50 });
        assert!(session.run("t").is_err());

        session.define("forever", parse_one("(lambda () (forever))").unwrap());
        assert_eq!(
            session.run("(forever)").unwrap_err(),
            Error::RecursionLimitExceeded { limit: 50 }
        );
        assert_eq!(session.config().max_depth, 50);

        session.define("greeting", sym("hello"));
        assert_eq!(session.run("greeting").unwrap(), sym("hello"));
    }
}
