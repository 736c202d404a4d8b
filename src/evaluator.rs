use crate::ast::{Atom, Sexpr, Symbol};
use crate::builtinops::{OpKind, find_function, find_op};
use crate::{Error, MAX_EVAL_DEPTH};

mod environment;

pub use environment::Environment;

/// Native stack kept free before recursing; below this a new segment is allocated
const STACK_RED_ZONE: usize = 64 * 1024;

/// Size of each freshly allocated stack segment
const STACK_GROWTH: usize = 1024 * 1024;

/// Expected number of arguments for a keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments
    Exact(usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    pub(crate) fn validate(self, arg_count: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(expected) if arg_count != expected => {
                Err(Error::arity_error(expected, arg_count))
            }
            _ => Ok(()),
        }
    }
}

/// Evaluation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Deepest nesting of `eval`/`apply` steps before giving up with
    /// [`Error::RecursionLimitExceeded`]
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: MAX_EVAL_DEPTH,
        }
    }
}

/// Current nesting of an evaluation, threaded through every recursive call
#[derive(Clone, Copy)]
pub(crate) struct Depth {
    level: usize,
    limit: usize,
}

impl Depth {
    fn root(config: &EvalConfig) -> Self {
        Depth {
            level: 0,
            limit: config.max_depth,
        }
    }

    fn deeper(self) -> Result<Depth, Error> {
        if self.level >= self.limit {
            return Err(Error::RecursionLimitExceeded { limit: self.limit });
        }
        Ok(Depth {
            level: self.level + 1,
            ..self
        })
    }
}

/// Run `f` on a stack with room for at least one more level of recursion
#[inline]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, f)
}

/// Evaluate an S-expression with the default [`EvalConfig`]
pub fn eval(expr: &Sexpr, env: &Environment) -> Result<Sexpr, Error> {
    eval_with_config(expr, env, &EvalConfig::default())
}

/// Evaluate an S-expression under explicit limits
pub fn eval_with_config(
    expr: &Sexpr,
    env: &Environment,
    config: &EvalConfig,
) -> Result<Sexpr, Error> {
    eval_with_depth_tracking(expr, env, Depth::root(config))
}

/// Apply a procedure to already-evaluated arguments
///
/// A procedure is a `(lambda params body)` list, a `(label name procedure)` list, or
/// one of the primitive function atoms (`atom`, `eq`, `car`, `cdr`, `cons`). The body
/// of a lambda is evaluated in `env` extended with the parameter bindings; `env` is
/// the caller's environment, not the one the lambda was written in.
pub fn apply(procedure: &Sexpr, args: Vec<Sexpr>, env: &Environment) -> Result<Sexpr, Error> {
    apply_with_depth(procedure, args, env, Depth::root(&EvalConfig::default()))
}

fn eval_with_depth_tracking(expr: &Sexpr, env: &Environment, depth: Depth) -> Result<Sexpr, Error> {
    let depth = depth.deeper()?;
    ensure_sufficient_stack(|| match expr {
        Sexpr::Atom(Atom::Number(_)) | Sexpr::Nil => Ok(expr.clone()),
        Sexpr::Atom(Atom::Symbol(name)) => env.lookup(name.as_str()),
        Sexpr::Pair(operator, operands) => eval_pair(expr, operator, operands, env, depth),
    })
}

/// Evaluate a form whose head is `operator`: a keyword, or an application
fn eval_pair(
    form: &Sexpr,
    operator: &Sexpr,
    operands: &Sexpr,
    env: &Environment,
    depth: Depth,
) -> Result<Sexpr, Error> {
    let Some(args) = operands.to_vec() else {
        return Err(Error::malformed(
            "arguments must form a proper list",
            form,
        ));
    };

    // Keywords are matched by name and can never be shadowed
    if let Some(op) = operator.as_symbol().and_then(find_op) {
        op.validate_arity(args.len())
            .map_err(|err| add_context(err, form))?;
        return match op.op_kind {
            OpKind::Function(func) => {
                let values = eval_args(&args, env, depth)?;
                func(&values)
            }
            OpKind::SpecialForm(special_form) => special_form(form, &args, env, depth),
        };
    }

    let procedure = eval_with_depth_tracking(operator, env, depth)?;
    let values = eval_args(&args, env, depth)?;
    apply_with_depth(&procedure, values, env, depth)
}

/// Attach the offending form to an arity error that has none yet
fn add_context(error: Error, form: &Sexpr) -> Error {
    match error {
        Error::Arity {
            expected,
            got,
            expression: None,
        } => Error::arity_error_with_expr(expected, got, form.to_string()),
        other => other,
    }
}

/// Evaluate arguments left to right in the same environment
fn eval_args(args: &[Sexpr], env: &Environment, depth: Depth) -> Result<Vec<Sexpr>, Error> {
    args.iter()
        .map(|arg| eval_with_depth_tracking(arg, env, depth))
        .collect()
}

fn apply_with_depth(
    procedure: &Sexpr,
    args: Vec<Sexpr>,
    env: &Environment,
    depth: Depth,
) -> Result<Sexpr, Error> {
    let depth = depth.deeper()?;
    tracing::trace!(%procedure, args = args.len(), "apply");

    ensure_sufficient_stack(|| match procedure {
        Sexpr::Atom(Atom::Symbol(name)) => match find_function(name.as_str()) {
            Some((op, func)) => {
                op.validate_arity(args.len())?;
                func(&args)
            }
            None => Err(Error::NotAProcedure(procedure.to_string())),
        },
        Sexpr::Pair(head, rest) => match head.as_symbol() {
            Some("lambda") => apply_lambda(procedure, rest, args, env, depth),
            Some("label") => apply_label(procedure, rest, args, env, depth),
            _ => Err(Error::NotAProcedure(procedure.to_string())),
        },
        Sexpr::Atom(Atom::Number(_)) | Sexpr::Nil => {
            Err(Error::NotAProcedure(procedure.to_string()))
        }
    })
}

/// `((lambda (p1 ... pn) body) a1 ... an)`: bind each parameter, then evaluate the body
fn apply_lambda(
    procedure: &Sexpr,
    parts: &Sexpr,
    args: Vec<Sexpr>,
    env: &Environment,
    depth: Depth,
) -> Result<Sexpr, Error> {
    let (params, body) = match parts.to_vec().as_deref() {
        Some([params, body]) => (lambda_params(params, procedure)?, body.clone()),
        _ => {
            return Err(Error::malformed(
                "lambda must have the form (lambda (params...) body)",
                procedure,
            ));
        }
    };
    let new_env = env.extend(&params, args)?;
    eval_with_depth_tracking(&body, &new_env, depth)
}

fn lambda_params(params: &Sexpr, procedure: &Sexpr) -> Result<Vec<Symbol>, Error> {
    let malformed = || Error::malformed("lambda parameters must be a list of symbols", procedure);
    params
        .to_vec()
        .ok_or_else(malformed)?
        .iter()
        .map(|param| match param {
            Sexpr::Atom(Atom::Symbol(name)) => Ok(name.clone()),
            _ => Err(malformed()),
        })
        .collect()
}

/// `((label f proc) a1 ... an)`: bind `f` to the whole label form so `proc` can recurse
fn apply_label(
    procedure: &Sexpr,
    parts: &Sexpr,
    args: Vec<Sexpr>,
    env: &Environment,
    depth: Depth,
) -> Result<Sexpr, Error> {
    match parts.to_vec().as_deref() {
        Some([Sexpr::Atom(Atom::Symbol(name)), inner]) => {
            let new_env = env.bind(name.clone(), procedure.clone());
            apply_with_depth(inner, args, &new_env, depth)
        }
        _ => Err(Error::malformed(
            "label must have the form (label name procedure)",
            procedure,
        )),
    }
}

//
// Special forms
//

/// `(quote x)` yields `x` unevaluated
pub(crate) fn eval_quote(
    form: &Sexpr,
    args: &[Sexpr],
    _env: &Environment,
    _depth: Depth,
) -> Result<Sexpr, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity_error_with_expr(1, args.len(), form.to_string())),
    }
}

/// `(cond (p1 e1) ... (pn en))`: the value of the first `ei` whose `pi` is not `()`
///
/// Later predicates are never evaluated once one succeeds.
pub(crate) fn eval_cond(
    form: &Sexpr,
    clauses: &[Sexpr],
    env: &Environment,
    depth: Depth,
) -> Result<Sexpr, Error> {
    for clause in clauses {
        let parts = clause.to_vec().unwrap_or_default();
        let [predicate, consequent] = parts.as_slice() else {
            return Err(Error::malformed(
                "cond clause must have the form (predicate expression)",
                clause,
            ));
        };
        if eval_with_depth_tracking(predicate, env, depth)?.is_true() {
            return eval_with_depth_tracking(consequent, env, depth);
        }
    }
    Err(Error::NonExhaustiveCond(form.to_string()))
}

/// A lambda expression is a procedure value and evaluates to itself
pub(crate) fn eval_lambda(
    form: &Sexpr,
    args: &[Sexpr],
    _env: &Environment,
    _depth: Depth,
) -> Result<Sexpr, Error> {
    match args {
        [_params, _body] => Ok(form.clone()),
        _ => Err(Error::arity_error_with_expr(2, args.len(), form.to_string())),
    }
}

/// A label expression is a procedure value and evaluates to itself
pub(crate) fn eval_label(
    form: &Sexpr,
    args: &[Sexpr],
    _env: &Environment,
    _depth: Depth,
) -> Result<Sexpr, Error> {
    match args {
        [_name, _procedure] => Ok(form.clone()),
        _ => Err(Error::arity_error_with_expr(2, args.len(), form.to_string())),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod apply_tests {
    use super::*;
    use crate::ast::{list, nil, sym, val};

    #[test]
    fn test_apply_primitive_atoms() {
        let env = Environment::standard();
        assert_eq!(apply(&sym("car"), vec![val(["a", "b"])], &env).unwrap(), sym("a"));
        assert_eq!(
            apply(&sym("cons"), vec![sym("a"), nil()], &env).unwrap(),
            val(["a"])
        );
        assert_eq!(
            apply(&sym("car"), vec![], &env).unwrap_err(),
            Error::arity_error(1, 0)
        );
        // Special forms are keywords, not procedures
        assert!(matches!(
            apply(&sym("quote"), vec![sym("a")], &env),
            Err(Error::NotAProcedure(_))
        ));
        assert!(matches!(
            apply(&val(3), vec![], &env),
            Err(Error::NotAProcedure(_))
        ));
        assert!(matches!(
            apply(&nil(), vec![], &env),
            Err(Error::NotAProcedure(_))
        ));
    }

    #[test]
    fn test_apply_lambda_uses_callers_environment() {
        // (lambda (x) (cons x y)) with y bound only at the call site
        let procedure = list([
            sym("lambda"),
            val(["x"]),
            val(["cons", "x", "y"]),
        ]);
        let env = Environment::standard().bind(Symbol::new("y"), val(["b"]));
        assert_eq!(
            apply(&procedure, vec![sym("a")], &env).unwrap(),
            val(["a", "b"])
        );
        assert_eq!(
            apply(&procedure, vec![sym("a")], &Environment::standard()).unwrap_err(),
            Error::UnboundSymbol("y".into())
        );
        assert_eq!(
            apply(&procedure, vec![sym("a"), sym("b")], &env).unwrap_err(),
            Error::arity_error(1, 2)
        );
    }

    #[test]
    fn test_apply_malformed_procedures() {
        let env = Environment::standard();
        let cases = vec![
            // parameter that is not a symbol
            list([sym("lambda"), val([1]), sym("x")]),
            // dotted parameter list
            list([sym("lambda"), Sexpr::cons(sym("x"), sym("y")), sym("x")]),
            // missing body
            list([sym("lambda"), val(["x"])]),
            // label name that is not a symbol
            list([sym("label"), val(["f"]), list([sym("lambda"), nil(), sym("t")])]),
        ];
        for procedure in cases {
            assert!(
                matches!(apply(&procedure, vec![], &env), Err(Error::Syntax(_))),
                "{procedure}"
            );
        }
        assert!(matches!(
            apply(&val(["foo", "x"]), vec![], &env),
            Err(Error::NotAProcedure(_))
        ));
    }

    #[test]
    fn test_depth_limit_is_configurable() {
        // (cons 'a (cons 'b '())) needs a handful of levels
        let expr = list([
            sym("cons"),
            list([sym("quote"), sym("a")]),
            list([
                sym("cons"),
                list([sym("quote"), sym("b")]),
                list([sym("quote"), nil()]),
            ]),
        ]);
        let env = Environment::standard();
        assert_eq!(eval(&expr, &env).unwrap(), val(["a", "b"]));
        assert_eq!(
            eval_with_config(&expr, &env, &EvalConfig { max_depth: 2 }).unwrap_err(),
            Error::RecursionLimitExceeded { limit: 2 }
        );
        assert_eq!(
            eval_with_config(&expr, &env, &EvalConfig { max_depth: 3 }).unwrap(),
            val(["a", "b"])
        );
    }
}
