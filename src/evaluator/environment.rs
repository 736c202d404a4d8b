use crate::Error;
use crate::ast::{Sexpr, Symbol};
use std::fmt;
use std::sync::Arc;

/// Variable bindings, most recent first
///
/// An environment is an immutable linked list of frames. Extending one never changes
/// it: the result shares the existing frames and puts new bindings in front, so a
/// later binding shadows an earlier one with the same name. Cloning is cheap, and
/// environments may be shared across threads.
#[derive(Clone, Default)]
pub struct Environment {
    head: Option<Arc<Binding>>,
}

struct Binding {
    symbol: Symbol,
    value: Sexpr,
    next: Option<Arc<Binding>>,
}

// Unlink long chains one frame at a time instead of recursing through `next`.
impl Drop for Binding {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(frame) = next {
            match Arc::try_unwrap(frame) {
                Ok(mut binding) => next = binding.next.take(),
                Err(_) => break,
            }
        }
    }
}

impl Environment {
    /// An environment with no bindings at all
    pub fn new() -> Self {
        Environment { head: None }
    }

    /// The top-level environment: `t` is bound to itself and `nil` to `()`
    pub fn standard() -> Self {
        Environment::new()
            .bind(Symbol::new("t"), Sexpr::symbol("t"))
            .bind(Symbol::new("nil"), Sexpr::Nil)
    }

    /// Value of the most recent binding of `name`
    pub fn get(&self, name: &str) -> Option<&Sexpr> {
        self.frames()
            .find(|binding| binding.symbol.as_str() == name)
            .map(|binding| &binding.value)
    }

    /// Like [`Environment::get`], failing with [`Error::UnboundSymbol`]
    pub fn lookup(&self, name: &str) -> Result<Sexpr, Error> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::UnboundSymbol(name.to_owned()))
    }

    /// A new environment with one more binding in front of this one
    #[must_use]
    pub fn bind(&self, symbol: Symbol, value: Sexpr) -> Environment {
        Environment {
            head: Some(Arc::new(Binding {
                symbol,
                value,
                next: self.head.clone(),
            })),
        }
    }

    /// Bind each symbol to the value in the same position
    pub fn extend(&self, symbols: &[Symbol], values: Vec<Sexpr>) -> Result<Environment, Error> {
        if symbols.len() != values.len() {
            return Err(Error::arity_error(symbols.len(), values.len()));
        }
        Ok(symbols
            .iter()
            .zip(values)
            .fold(self.clone(), |env, (symbol, value)| env.bind(symbol.clone(), value)))
    }

    /// Visible bindings sorted by name; shadowed entries are left out
    pub fn bindings(&self) -> Vec<(String, Sexpr)> {
        let mut visible: Vec<(String, Sexpr)> = Vec::new();
        for binding in self.frames() {
            let name = binding.symbol.as_str();
            if !visible.iter().any(|(seen, _)| seen == name) {
                visible.push((name.to_owned(), binding.value.clone()));
            }
        }
        visible.sort_by(|a, b| a.0.cmp(&b.0));
        visible
    }

    /// The visible bindings as an association list `((name value) ...)`, the
    /// representation the self-hosted `eval.` expects
    pub fn to_alist(&self) -> Sexpr {
        Sexpr::list(
            self.bindings()
                .into_iter()
                .map(|(name, value)| Sexpr::list([Sexpr::symbol(&name), value])),
        )
    }

    /// Number of frames, counting shadowed ones
    pub fn len(&self) -> usize {
        self.frames().count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    fn frames(&self) -> impl Iterator<Item = &Binding> {
        std::iter::successors(self.head.as_deref(), |binding| binding.next.as_deref())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.frames().map(|b| (&b.symbol, &b.value)))
            .finish()
    }
}
