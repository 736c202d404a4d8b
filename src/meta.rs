//! The self-hosted evaluator
//!
//! [`META_EVAL_SOURCE`] is McCarthy's `eval.` written as a program in this LISP,
//! together with the helpers it needs (`null.`, `and.`, `not.`, `append.`, `list.`,
//! `pair.`, `assoc.`, `evcon.`, `evlis.`). Running it on the native evaluator gives a
//! second evaluator that should agree with the first on every program built from
//! the seven primitives, `lambda` and `label`.
//!
//! The interpreted program sees its variables through an association list
//! `((name value) ...)` rather than an [`Environment`](crate::Environment); see
//! [`Environment::to_alist`](crate::Environment::to_alist) to build one.

use crate::Error;
use crate::ast::Sexpr;
use crate::session::Session;

/// Source text of `eval.` and its helpers
pub const META_EVAL_SOURCE: &str = include_str!("meta.lisp");

/// A session with `eval.` and its helpers defined
pub fn meta_session() -> Result<Session, Error> {
    let mut session = Session::new();
    session.run(META_EVAL_SOURCE)?;
    Ok(session)
}

/// Evaluate `expr` with the self-hosted evaluator: `(eval. 'expr 'alist)`
pub fn meta_eval(expr: &Sexpr, alist: &Sexpr) -> Result<Sexpr, Error> {
    let mut session = meta_session()?;
    session.eval_form(&meta_call(expr, alist))
}

fn meta_call(expr: &Sexpr, alist: &Sexpr) -> Sexpr {
    let quote = |value: &Sexpr| Sexpr::list([Sexpr::symbol("quote"), value.clone()]);
    Sexpr::list([Sexpr::symbol("eval."), quote(expr), quote(alist)])
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};
    use crate::evaluator::Environment;
    use crate::reader::{parse, parse_one};

    #[test]
    fn test_meta_source_defines_every_helper() {
        let forms = parse(META_EVAL_SOURCE).unwrap();
        let names: Vec<&str> = forms
            .iter()
            .filter_map(|form| form.cdr()?.car()?.as_symbol())
            .collect();
        assert_eq!(
            names,
            vec![
                "null.", "and.", "not.", "append.", "list.", "pair.", "assoc.", "eval.",
                "evcon.", "evlis."
            ]
        );

        let session = meta_session().unwrap();
        for name in names {
            assert!(session.env().get(name).is_some(), "{name} should be bound");
        }
    }

    #[test]
    fn test_meta_helpers() {
        let mut session = meta_session().unwrap();
        let cases = vec![
            ("(null. '())", sym("t")),
            ("(null. 'a)", nil()),
            ("(and. 't '())", nil()),
            ("(not. '())", sym("t")),
            ("(append. '(a b) '(c))", val(["a", "b", "c"])),
            ("(list. 'a 'b)", val(["a", "b"])),
            ("(pair. '(x y) '(a b))", val(vec![val(["x", "a"]), val(["y", "b"])])),
            ("(assoc. 'y '((x a) (y b)))", sym("b")),
        ];
        for (source, expected) in cases {
            assert_eq!(session.run(source).unwrap(), expected, "{source}");
        }
    }

    #[test]
    fn test_meta_eval_api() {
        let expr = parse_one("(car (cons 'a 'b))").unwrap();
        assert_eq!(meta_eval(&expr, &nil()).unwrap(), sym("a"));

        let env = Environment::new()
            .bind(crate::ast::Symbol::new("x"), sym("a"))
            .bind(crate::ast::Symbol::new("y"), sym("b"));
        assert_eq!(meta_eval(&sym("y"), &env.to_alist()).unwrap(), sym("b"));

        // An unbound variable at the interpreted level surfaces as a native failure
        assert!(meta_eval(&sym("z"), &nil()).is_err());
    }
}
