//! Text to S-expressions
//!
//! The surface syntax is the classic one: atoms, parenthesized lists, the dotted
//! pair notation `(a . b)` and the `'x` shorthand for `(quote x)`. A `;` starts a
//! comment that runs to the end of the line.
//!
//! An atom is any run of characters other than whitespace, parentheses, `'` and `;`.
//! Runs that look like decimal integers (`42`, `-7`, `+3`) become numbers, everything
//! else is a symbol. A lone `.` is the dot of dotted-pair notation, but a dot inside
//! a token is an ordinary character, so `eval.` and `a.b` are symbols.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace1, satisfy},
    combinator::{cut, not, recognize, value},
    error::ErrorKind,
    multi::many0_count,
    sequence::{preceded, terminated},
};
use std::iter::FusedIterator;

use crate::ast::{NumberType, Sexpr};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

type NomError<'a> = nom::error::Error<&'a str>;

fn is_atom_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '\'' | ';')
}

fn is_number_token(token: &str) -> bool {
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `; ...` up to, not including, the newline
fn comment(input: &str) -> IResult<&str, &str> {
    recognize(preceded(char(';'), take_while(|c: char| c != '\n'))).parse(input)
}

/// Whitespace and comments between tokens
fn skip(input: &str) -> IResult<&str, ()> {
    value((), many0_count(alt((multispace1, comment)))).parse(input)
}

fn skip_trivia(input: &str) -> &str {
    match skip(input) {
        Ok((rest, ())) => rest,
        Err(_) => input,
    }
}

/// The dot of dotted-pair notation: a `.` that is not part of a longer atom
fn dot(input: &str) -> IResult<&str, char> {
    terminated(char('.'), not(satisfy(is_atom_char))).parse(input)
}

fn close_paren(input: &str) -> IResult<&str, char> {
    char(')').parse(input)
}

/// Parse an atom: a number when it looks like one, a symbol otherwise
fn parse_atom(input: &str) -> IResult<&str, Sexpr> {
    let (rest, token) = take_while1(is_atom_char).parse(input)?;

    if token == "." {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::Char)));
    }
    if is_number_token(token) {
        return match token.parse::<NumberType>() {
            Ok(n) => Ok((rest, Sexpr::number(n))),
            // Out of range; no other reading of an all-digit token makes sense
            Err(_) => Err(nom::Err::Failure(NomError::new(input, ErrorKind::Digit))),
        };
    }
    Ok((rest, Sexpr::symbol(token)))
}

/// Parse quoted expression ('expr -> (quote expr))
fn parse_quote(input: &str, depth: usize) -> IResult<&str, Sexpr> {
    let (input, _) = char('\'').parse(input)?;
    let (input, expr) = cut(|input| parse_sexpr(input, depth + 1)).parse(input)?;
    Ok((input, Sexpr::list([Sexpr::symbol("quote"), expr])))
}

/// Parse a list, proper or dotted. Once `(` is seen every failure is final.
fn parse_list(input: &str, depth: usize) -> IResult<&str, Sexpr> {
    let (mut input, _) = char('(').parse(input)?;
    let mut items = Vec::new();

    loop {
        let (rest, ()) = skip(input)?;

        if let Ok((rest, _)) = close_paren(rest) {
            return Ok((rest, Sexpr::list(items)));
        }

        if let Ok((after_dot, _)) = dot(rest) {
            if items.is_empty() {
                return Err(nom::Err::Failure(NomError::new(rest, ErrorKind::Char)));
            }
            let (after_tail, tail) = cut(|input| parse_sexpr(input, depth + 1)).parse(after_dot)?;
            let (after_tail, ()) = skip(after_tail)?;
            let (rest, _) = cut(close_paren).parse(after_tail)?;
            return Ok((rest, Sexpr::list_with_tail(items, tail)));
        }

        let (rest, item) = cut(|input| parse_sexpr(input, depth + 1)).parse(rest)?;
        items.push(item);
        input = rest;
    }
}

/// Parse an S-expression, skipping leading whitespace and comments
fn parse_sexpr(input: &str, depth: usize) -> IResult<&str, Sexpr> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(NomError::new(input, ErrorKind::TooLarge)));
    }
    preceded(
        skip,
        alt((
            |input| parse_quote(input, depth),
            |input| parse_list(input, depth),
            parse_atom,
        )),
    )
    .parse(input)
}

/// The token starting at `input`, for error reports
fn leading_token(input: &str) -> Option<String> {
    match input.chars().next()? {
        c @ ('(' | ')' | '\'') => Some(c.to_string()),
        _ => {
            let token: String = input.chars().take_while(|&c| is_atom_char(c)).collect();
            Some(token)
        }
    }
}

/// Convert nom parsing errors to a [`ParseError`] pointing into `source`
fn to_parse_error(source: &str, error: nom::Err<NomError<'_>>) -> ParseError {
    let e = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => {
            return ParseError::from_message(ParseErrorKind::Incomplete, "incomplete input");
        }
    };

    let at = skip_trivia(e.input);
    let offset = source.len().saturating_sub(at.len());
    let found = leading_token(at);

    let (kind, message) = match e.code {
        ErrorKind::TooLarge => (
            ParseErrorKind::TooDeeplyNested,
            format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
        ),
        ErrorKind::Digit => (
            ParseErrorKind::ImplementationLimit,
            format!(
                "integer literal {} does not fit in {} bits",
                found.as_deref().unwrap_or_default(),
                NumberType::BITS
            ),
        ),
        _ if at.is_empty() => (
            ParseErrorKind::Incomplete,
            "unexpected end of input inside an expression".to_owned(),
        ),
        _ if at.starts_with(')') => (ParseErrorKind::InvalidSyntax, "unmatched ')'".to_owned()),
        _ if dot(at).is_ok() => (ParseErrorKind::InvalidSyntax, "misplaced '.'".to_owned()),
        _ => (
            ParseErrorKind::InvalidSyntax,
            format!(
                "unexpected '{}' at position {offset}",
                found.as_deref().unwrap_or_default()
            ),
        ),
    };

    ParseError::with_context(kind, message, source, offset, found)
}

/// A lazy sequence of the top-level forms in some source text
///
/// Yields each form in order. After the first error the reader yields that error and
/// then stops.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    source: &'a str,
    rest: &'a str,
    done: bool,
}

impl<'a> Reader<'a> {
    pub fn new(source: &'a str) -> Self {
        Reader {
            source,
            rest: source,
            done: false,
        }
    }

    /// Input not consumed yet, with leading whitespace and comments removed
    pub fn remaining(&self) -> &'a str {
        skip_trivia(self.rest)
    }

    /// Byte offset of [`Reader::remaining`] within the source
    fn offset(&self) -> usize {
        self.source.len() - self.remaining().len()
    }
}

impl Iterator for Reader<'_> {
    type Item = Result<Sexpr, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let rest = self.remaining();
        if rest.is_empty() {
            self.done = true;
            return None;
        }
        match parse_sexpr(rest, 0) {
            Ok((remaining, expr)) => {
                self.rest = remaining;
                Some(Ok(expr))
            }
            Err(err) => {
                self.done = true;
                Some(Err(to_parse_error(self.source, err).into()))
            }
        }
    }
}

impl FusedIterator for Reader<'_> {}

/// Parse every top-level form in `source`. Empty input yields no forms.
pub fn parse(source: &str) -> Result<Vec<Sexpr>, Error> {
    Reader::new(source).collect()
}

/// Parse a source that must contain exactly one form
pub fn parse_one(source: &str) -> Result<Sexpr, Error> {
    let mut reader = Reader::new(source);
    let expr = match reader.next() {
        Some(result) => result?,
        None => {
            return Err(ParseError::from_message(
                ParseErrorKind::EmptyInput,
                "expected an expression, found none",
            )
            .into());
        }
    };

    let trailing = reader.remaining();
    if !trailing.is_empty() {
        return Err(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            "unexpected content after the expression",
            source,
            reader.offset(),
            leading_token(trailing),
        )
        .into());
    }
    Ok(expr)
}
