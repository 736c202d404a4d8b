//! This module defines the symbolic-expression data model shared by the reader, the
//! evaluator and the self-hosted interpreter. [`Sexpr`] has exactly three shapes:
//! atoms, pairs and the empty list `()`. Code and data use the same representation,
//! which is what lets a LISP program build and inspect procedures with `car`, `cdr`
//! and `cons`.
//!
//! Pairs hold their halves behind [`Arc`], so cloning a list is cheap and structure is
//! shared freely between values. Nothing here offers mutation: every value is fixed
//! once constructed.
//!
//! Ergonomic helpers such as [`sym`], [`val`], [`list`] and [`nil`] build values in
//! code and tests; `val` accepts anything convertible into an `Sexpr`, including
//! arrays and vectors which become proper lists.

use std::fmt;
use std::sync::{Arc, LazyLock};

/// Type alias for number values in the interpreter
pub type NumberType = i64;

/// An interned-by-value symbol name. Symbols are case-sensitive.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Indivisible values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Atom {
    Symbol(Symbol),
    Number(NumberType),
}

/// Core data type of the interpreter
///
/// Equality (`==`) is structural and is meant for Rust code and tests. The LISP
/// primitive `eq` is narrower, see [`Sexpr::is_eq`].
#[derive(Clone)]
pub enum Sexpr {
    Atom(Atom),
    /// A cons cell: `first` and `rest`
    Pair(Arc<Sexpr>, Arc<Sexpr>),
    /// The empty list, which is also false
    Nil,
}

impl Sexpr {
    pub fn symbol(name: &str) -> Self {
        Sexpr::Atom(Atom::Symbol(Symbol::new(name)))
    }

    pub fn number(n: NumberType) -> Self {
        Sexpr::Atom(Atom::Number(n))
    }

    pub fn cons(first: Sexpr, rest: Sexpr) -> Self {
        Sexpr::Pair(Arc::new(first), Arc::new(rest))
    }

    /// Build a proper list from its elements
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Sexpr>,
        I::IntoIter: DoubleEndedIterator,
    {
        Self::list_with_tail(items, Sexpr::Nil)
    }

    /// Build a list ending in `tail` instead of `()`; a non-Nil tail makes it dotted
    pub fn list_with_tail<I>(items: I, tail: Sexpr) -> Self
    where
        I: IntoIterator<Item = Sexpr>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(tail, |rest, item| Sexpr::cons(item, rest))
    }

    /// Truth value as the primitives report it: `t` or `()`
    pub fn from_bool(b: bool) -> Self {
        if b { Sexpr::symbol("t") } else { Sexpr::Nil }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Sexpr::Nil)
    }

    pub fn is_true(&self) -> bool {
        !self.is_nil()
    }

    /// The `atom` predicate: atoms and `()` are atomic, pairs are not
    pub fn is_atom(&self) -> bool {
        !matches!(self, Sexpr::Pair(..))
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Sexpr::Atom(Atom::Symbol(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn car(&self) -> Option<&Sexpr> {
        match self {
            Sexpr::Pair(first, _) => Some(first),
            _ => None,
        }
    }

    pub fn cdr(&self) -> Option<&Sexpr> {
        match self {
            Sexpr::Pair(_, rest) => Some(rest),
            _ => None,
        }
    }

    /// The `eq` primitive: the same atom, or both `()`. Pairs are never `eq`, not even
    /// to themselves.
    pub fn is_eq(&self, other: &Sexpr) -> bool {
        match (self, other) {
            (Sexpr::Atom(a), Sexpr::Atom(b)) => a == b,
            (Sexpr::Nil, Sexpr::Nil) => true,
            _ => false,
        }
    }

    /// Elements of a proper list, or `None` when the list is dotted or `self` is an atom
    pub fn to_vec(&self) -> Option<Vec<Sexpr>> {
        let mut items = Vec::new();
        let mut cursor = self;
        loop {
            match cursor {
                Sexpr::Nil => return Some(items),
                Sexpr::Pair(first, rest) => {
                    items.push(first.as_ref().clone());
                    cursor = rest;
                }
                Sexpr::Atom(_) => return None,
            }
        }
    }

    /// Iterate over the elements of a list, proper or dotted; see [`ListIter::tail`]
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { cursor: self }
    }
}

// Structural equality and drop both walk the `rest` chain in a loop, so a long flat
// list costs no native stack. Only nesting through `first` recurses.
impl PartialEq for Sexpr {
    fn eq(&self, other: &Self) -> bool {
        let (mut left, mut right) = (self, other);
        loop {
            match (left, right) {
                (Sexpr::Pair(a, a_rest), Sexpr::Pair(b, b_rest)) => {
                    if !(Arc::ptr_eq(a, b) || a == b) {
                        return false;
                    }
                    if Arc::ptr_eq(a_rest, b_rest) {
                        return true;
                    }
                    left = a_rest;
                    right = b_rest;
                }
                (Sexpr::Atom(a), Sexpr::Atom(b)) => return a == b,
                (Sexpr::Nil, Sexpr::Nil) => return true,
                _ => return false,
            }
        }
    }
}

impl Eq for Sexpr {}

impl Drop for Sexpr {
    fn drop(&mut self) {
        let Sexpr::Pair(_, rest) = self else {
            return;
        };
        let mut next = std::mem::replace(rest, empty_rest());
        while let Ok(mut cell) = Arc::try_unwrap(next) {
            match &mut cell {
                Sexpr::Pair(_, rest) => next = std::mem::replace(rest, empty_rest()),
                _ => break,
            }
        }
    }
}

/// Shared `()` swapped into a cell's `rest` while the chain is unlinked
fn empty_rest() -> Arc<Sexpr> {
    static NIL: LazyLock<Arc<Sexpr>> = LazyLock::new(|| Arc::new(Sexpr::Nil));
    Arc::clone(&NIL)
}

/// Walks the `first` halves of a chain of pairs
pub struct ListIter<'a> {
    cursor: &'a Sexpr,
}

impl<'a> ListIter<'a> {
    /// What is left once the iterator stops: `()` for a proper list
    pub fn tail(&self) -> &'a Sexpr {
        self.cursor
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Sexpr;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor {
            Sexpr::Pair(first, rest) => {
                self.cursor = rest;
                Some(first)
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Atom(Atom::Symbol(s)) => write!(f, "Symbol({s})"),
            Sexpr::Atom(Atom::Number(n)) => write!(f, "Number({n})"),
            Sexpr::Nil => write!(f, "Nil"),
            Sexpr::Pair(..) => {
                let mut items = self.iter();
                write!(f, "List(")?;
                for (i, item) in items.by_ref().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item:?}")?;
                }
                let tail = items.tail();
                if !tail.is_nil() {
                    write!(f, " . {tail:?}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Atom(Atom::Symbol(s)) => write!(f, "{s}"),
            Sexpr::Atom(Atom::Number(n)) => write!(f, "{n}"),
            Sexpr::Nil => write!(f, "()"),
            Sexpr::Pair(..) => {
                let mut items = self.iter();
                write!(f, "(")?;
                for (i, item) in items.by_ref().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                let tail = items.tail();
                if !tail.is_nil() {
                    write!(f, " . {tail}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// From trait implementations - enables .into() conversion

/// String slices become symbols; the language has no string type
impl From<&str> for Sexpr {
    fn from(s: &str) -> Self {
        Sexpr::symbol(s)
    }
}

impl From<Atom> for Sexpr {
    fn from(atom: Atom) -> Self {
        Sexpr::Atom(atom)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Sexpr {
            fn from(n: $int_type) -> Self {
                Sexpr::number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Sexpr>> From<Vec<T>> for Sexpr {
    fn from(v: Vec<T>) -> Self {
        Sexpr::list(v.into_iter().map(Into::into))
    }
}

impl<T: Into<Sexpr>, const N: usize> From<[T; N]> for Sexpr {
    fn from(arr: [T; N]) -> Self {
        Sexpr::list(arr.into_iter().map(Into::into))
    }
}

/// Helper for creating symbols - works great in mixed lists!
pub fn sym<S: AsRef<str>>(name: S) -> Sexpr {
    Sexpr::symbol(name.as_ref())
}

/// Helper for creating values from anything convertible to `Sexpr`
pub fn val<T: Into<Sexpr>>(value: T) -> Sexpr {
    value.into()
}

/// Helper for a proper list of already-built values
pub fn list<I>(items: I) -> Sexpr
where
    I: IntoIterator<Item = Sexpr>,
    I::IntoIter: DoubleEndedIterator,
{
    Sexpr::list(items)
}

/// The empty list
pub fn nil() -> Sexpr {
    Sexpr::Nil
}
