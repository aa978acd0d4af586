//! Binding-text parser.
//!
//! Directive attribute values are split into sub-bindings (`;`), names (`:`),
//! event lists (`,`) and pointer arguments (`:`). Paths and comparison
//! operators are parsed with chumsky; anything that is not a path, number,
//! keyword or quoted text is kept as a text literal.

use crate::directive::DirectiveKind;
use chumsky::prelude::*;
use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;
use thiserror::Error;

mod path;
pub use path::{Path, Segment, is_path_char, parse_path, path_parser};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(Path),
    Literal(Literal),
}

/// A path or literal, optionally negated with `!`, optionally called with
/// `:`-separated arguments when it resolves to a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pub negated: bool,
    pub operand: Operand,
    pub args: Vec<Pointer>,
}

impl Pointer {
    pub fn path(&self) -> Option<&Path> {
        match &self.operand {
            Operand::Path(path) => Some(path),
            Operand::Literal(_) => None,
        }
    }

    /// Plain paths can be written through.
    pub fn is_assignable(&self) -> bool {
        !self.negated && self.args.is_empty() && self.path().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    StrictEq,
    NotEq,
    StrictNotEq,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

impl Comparator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::StrictEq => "===",
            Self::NotEq => "!=",
            Self::StrictNotEq => "!==",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Pointer(Pointer),
    Comparison {
        left: Pointer,
        op: Comparator,
        right: Pointer,
    },
}

impl Reference {
    pub fn as_pointer(&self) -> Option<&Pointer> {
        match self {
            Reference::Pointer(pointer) => Some(pointer),
            Reference::Comparison { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionSpec {
    /// Resolve a pointer for its side effects (usually a function call).
    Caller(Pointer),
    /// `target = value`
    Assigner { target: Pointer, value: Reference },
    /// `$update`: copy the element's control state back into the model.
    Updater,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrSpec {
    pub name: String,
    pub reference: Reference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassSpec {
    pub names: SmallVec<[String; 2]>,
    pub reference: Reference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListenerSpec {
    pub events: SmallVec<[String; 2]>,
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveSpec {
    If(Reference),
    For { alias: String, source: Reference },
    Attr(Vec<AttrSpec>),
    Class(Vec<ClassSpec>),
    Html(Reference),
    Rdo(Reference),
    On(Vec<ListenerSpec>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("expected `name:reference`")]
    MissingSeparator,
    #[error("unknown comparison operator `{0}`")]
    UnknownComparator(String),
    #[error("empty reference")]
    EmptyReference,
    #[error("empty name")]
    EmptyName,
    #[error("`{0}` cannot be assigned to")]
    InvalidTarget(String),
}

/// Parse failure located in the attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Range<usize>,
}

/// Parse result for one directive attribute. Malformed sub-bindings are
/// reported in `errors` and left out of `spec`; the rest still bind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedDirective {
    pub spec: Option<DirectiveSpec>,
    pub errors: Vec<ParseError>,
}

/// Slice of the attribute value together with its byte offset.
#[derive(Debug, Clone, Copy)]
struct Piece<'a> {
    start: usize,
    text: &'a str,
}

impl<'a> Piece<'a> {
    fn span(self) -> Range<usize> {
        self.start..self.start + self.text.len()
    }

    fn trimmed(self) -> Self {
        let leading = self.text.len() - self.text.trim_start().len();
        Piece {
            start: self.start + leading,
            text: self.text.trim(),
        }
    }

    fn error(self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            span: self.span(),
        }
    }

    /// Trimmed, non-empty pieces between top-level `separator`s.
    fn split(self, separator: u8) -> impl Iterator<Item = Piece<'a>> {
        let mut start = 0;
        let mut pieces = Vec::new();
        let ends = top_level(self.text)
            .filter(|(_, byte)| *byte == separator)
            .map(|(index, _)| index)
            .chain([self.text.len()]);
        for end in ends {
            pieces.push(
                Piece {
                    start: self.start + start,
                    text: &self.text[start..end],
                }
                .trimmed(),
            );
            start = end + 1;
        }
        pieces.into_iter().filter(|piece| !piece.text.is_empty())
    }

    fn split_once(self, separator: u8) -> Option<(Piece<'a>, Piece<'a>)> {
        let (index, _) = top_level(self.text).find(|(_, byte)| *byte == separator)?;
        let head = Piece {
            start: self.start,
            text: &self.text[..index],
        };
        let tail = Piece {
            start: self.start + index + 1,
            text: &self.text[index + 1..],
        };
        Some((head.trimmed(), tail.trimmed()))
    }

    fn slice(self, range: Range<usize>) -> Self {
        Piece {
            start: self.start + range.start,
            text: &self.text[range],
        }
        .trimmed()
    }
}

pub fn parse_directive(kind: DirectiveKind, text: &str) -> ParsedDirective {
    let whole = Piece { start: 0, text }.trimmed();
    let mut errors = Vec::new();

    let spec = match kind {
        DirectiveKind::If | DirectiveKind::Html | DirectiveKind::Rdo => {
            match reference(whole) {
                Ok(reference) => Some(match kind {
                    DirectiveKind::If => DirectiveSpec::If(reference),
                    DirectiveKind::Html => DirectiveSpec::Html(reference),
                    _ => DirectiveSpec::Rdo(reference),
                }),
                Err(error) => {
                    errors.push(error);
                    None
                }
            }
        }
        DirectiveKind::For => {
            // Only the first sub-binding drives the repetition.
            let first = whole.split(b';').next().unwrap_or(whole);
            match named(first).and_then(|(alias, rest)| Ok((alias, reference(rest)?))) {
                Ok((alias, source)) => Some(DirectiveSpec::For {
                    alias: alias.text.to_owned(),
                    source,
                }),
                Err(error) => {
                    errors.push(error);
                    None
                }
            }
        }
        DirectiveKind::Attr => {
            let specs: Vec<AttrSpec> = whole
                .split(b';')
                .filter_map(|piece| {
                    let result = named(piece).and_then(|(name, rest)| {
                        Ok(AttrSpec {
                            name: name.text.to_owned(),
                            reference: reference(rest)?,
                        })
                    });
                    result.map_err(|error| errors.push(error)).ok()
                })
                .collect();
            (!specs.is_empty()).then_some(DirectiveSpec::Attr(specs))
        }
        DirectiveKind::Class => {
            let specs: Vec<ClassSpec> = whole
                .split(b';')
                .filter_map(|piece| {
                    let result = named(piece).and_then(|(names, rest)| {
                        Ok(ClassSpec {
                            names: names.split(b',').map(|name| name.text.to_owned()).collect(),
                            reference: reference(rest)?,
                        })
                    });
                    result.map_err(|error| errors.push(error)).ok()
                })
                .collect();
            (!specs.is_empty()).then_some(DirectiveSpec::Class(specs))
        }
        DirectiveKind::On => {
            let specs: Vec<ListenerSpec> = whole
                .split(b';')
                .filter_map(|piece| {
                    let result = named(piece).and_then(|(events, rest)| {
                        let actions = rest
                            .split(b',')
                            .map(action)
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(ListenerSpec {
                            events: events.split(b',').map(|event| event.text.to_owned()).collect(),
                            actions,
                        })
                    });
                    result.map_err(|error| errors.push(error)).ok()
                })
                .collect();
            (!specs.is_empty()).then_some(DirectiveSpec::On(specs))
        }
    };

    if whole.text.is_empty() && errors.is_empty() {
        errors.push(whole.error(ParseErrorKind::EmptyReference));
    }

    ParsedDirective { spec, errors }
}

/// `name:rest`, both sides non-empty.
fn named(piece: Piece<'_>) -> Result<(Piece<'_>, Piece<'_>), ParseError> {
    let (name, rest) = piece
        .split_once(b':')
        .ok_or_else(|| piece.error(ParseErrorKind::MissingSeparator))?;
    if name.text.is_empty() {
        return Err(piece.error(ParseErrorKind::EmptyName));
    }
    if rest.text.is_empty() {
        return Err(piece.error(ParseErrorKind::EmptyReference));
    }
    Ok((name, rest))
}

fn reference(piece: Piece<'_>) -> Result<Reference, ParseError> {
    if piece.text.is_empty() {
        return Err(piece.error(ParseErrorKind::EmptyReference));
    }
    let Some(run) = find_comparator(piece.text) else {
        return Ok(Reference::Pointer(parse_pointer(piece.text)));
    };
    let symbol = &piece.text[run.clone()];
    let op = comparator()
        .parse(symbol)
        .into_result()
        .map_err(|_| piece.slice(run.clone()).error(ParseErrorKind::UnknownComparator(symbol.to_owned())))?;
    let left = piece.slice(0..run.start);
    let right = piece.slice(run.end..piece.text.len());
    if left.text.is_empty() || right.text.is_empty() {
        return Err(piece.error(ParseErrorKind::EmptyReference));
    }
    Ok(Reference::Comparison {
        left: parse_pointer(left.text),
        op,
        right: parse_pointer(right.text),
    })
}

/// Bytes of `text` outside brackets and quoted literals, with their offsets.
/// A quote without a closing partner is ordinary text.
fn top_level(text: &str) -> impl Iterator<Item = (usize, u8)> + '_ {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    bytes.iter().enumerate().filter_map(move |(index, &byte)| {
        if let Some(open) = quote {
            if byte == open {
                quote = None;
            }
            return None;
        }
        match byte {
            b'\'' | b'"' if bytes[index + 1..].contains(&byte) => {
                quote = Some(byte);
                None
            }
            b'[' => {
                depth += 1;
                None
            }
            b']' => {
                depth = depth.saturating_sub(1);
                None
            }
            _ if depth > 0 => None,
            _ => Some((index, byte)),
        }
    })
}

/// Byte range of the first operator run, skipping a leading `!` negation,
/// brackets and quoted text.
fn find_comparator(text: &str) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    let index = top_level(text).map(|(index, _)| index).find(|&index| {
        index > 0
            && match bytes[index] {
                b'=' | b'<' | b'>' => true,
                b'!' => bytes.get(index + 1) == Some(&b'='),
                _ => false,
            }
    })?;
    let length = bytes[index..]
        .iter()
        .take_while(|byte| matches!(byte, b'=' | b'<' | b'>' | b'!'))
        .count();
    Some(index..index + length)
}

fn comparator<'src>() -> impl Parser<'src, &'src str, Comparator, extra::Err<Rich<'src, char>>> {
    choice((
        just("===").to(Comparator::StrictEq),
        just("!==").to(Comparator::StrictNotEq),
        just("==").to(Comparator::Eq),
        just("!=").to(Comparator::NotEq),
        just("<=").to(Comparator::LessOrEqual),
        just(">=").to(Comparator::GreaterOrEqual),
        just("<").to(Comparator::Less),
        just(">").to(Comparator::Greater),
    ))
    .then_ignore(end())
}

fn action(piece: Piece<'_>) -> Result<ActionSpec, ParseError> {
    if piece.text == "$update" {
        return Ok(ActionSpec::Updater);
    }
    let Some(index) = find_assignment(piece.text) else {
        return Ok(ActionSpec::Caller(parse_pointer(piece.text)));
    };
    let target = piece.slice(0..index);
    let value = piece.slice(index + 1..piece.text.len());
    if target.text.is_empty() || value.text.is_empty() {
        return Err(piece.error(ParseErrorKind::EmptyReference));
    }
    let pointer = parse_pointer(target.text);
    if !pointer.is_assignable() {
        return Err(target.error(ParseErrorKind::InvalidTarget(target.text.to_owned())));
    }
    Ok(ActionSpec::Assigner {
        target: pointer,
        value: reference(value)?,
    })
}

/// A lone top-level `=`, not part of a comparison operator.
fn find_assignment(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    top_level(text).map(|(index, _)| index).find(|&index| {
        bytes[index] == b'='
            && !(index > 0 && matches!(bytes[index - 1], b'=' | b'!' | b'<' | b'>'))
            && bytes.get(index + 1) != Some(&b'=')
    })
}

/// Parse `[!]operand[:arg[:arg…]]`. Never fails: unrecognized text becomes
/// a text literal.
pub fn parse_pointer(text: &str) -> Pointer {
    let mut parts = split_args(text.trim()).into_iter();
    let mut pointer = operand_pointer(parts.next().unwrap_or_default());
    pointer.args = parts.map(operand_pointer).collect();
    pointer
}

fn split_args(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (index, _) in top_level(text).filter(|(_, byte)| *byte == b':') {
        parts.push(text[start..index].trim());
        start = index + 1;
    }
    parts.push(text[start..].trim());
    parts
}

fn operand_pointer(text: &str) -> Pointer {
    let (negated, text) = match text.strip_prefix('!') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    };
    Pointer {
        negated,
        operand: operand(text),
        args: Vec::new(),
    }
}

fn operand(text: &str) -> Operand {
    let literal = match text {
        "" | "undefined" => Some(Literal::Undefined),
        "null" => Some(Literal::Null),
        "true" => Some(Literal::Bool(true)),
        "false" => Some(Literal::Bool(false)),
        _ => None,
    };
    if let Some(literal) = literal {
        return Operand::Literal(literal);
    }
    if let Some(inner) = unquote(text) {
        return Operand::Literal(Literal::Text(inner.to_owned()));
    }
    if looks_numeric(text) {
        if let Ok(number) = text.parse::<f64>() {
            return Operand::Literal(Literal::Number(number));
        }
    }
    if text.chars().all(is_path_char) {
        if let Some(path) = parse_path(text) {
            return Operand::Path(path);
        }
    }
    Operand::Literal(Literal::Text(text.to_owned()))
}

fn unquote(text: &str) -> Option<&str> {
    let quote = text.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    text.strip_prefix(quote)?.strip_suffix(quote)
}

fn looks_numeric(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let unsigned = unsigned.strip_prefix('.').unwrap_or(unsigned);
    unsigned.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_pointer(text: &str) -> Pointer {
        Pointer {
            negated: false,
            operand: Operand::Path(parse_path(text).unwrap()),
            args: Vec::new(),
        }
    }

    fn number(value: f64) -> Pointer {
        Pointer {
            negated: false,
            operand: Operand::Literal(Literal::Number(value)),
            args: Vec::new(),
        }
    }

    #[test]
    fn operands() {
        assert_eq!(parse_pointer("12").operand, Operand::Literal(Literal::Number(12.0)));
        assert_eq!(parse_pointer("-1.5").operand, Operand::Literal(Literal::Number(-1.5)));
        assert_eq!(parse_pointer("null").operand, Operand::Literal(Literal::Null));
        assert_eq!(
            parse_pointer("'hi there'").operand,
            Operand::Literal(Literal::Text("hi there".into()))
        );
        assert_eq!(
            parse_pointer("hello world").operand,
            Operand::Literal(Literal::Text("hello world".into()))
        );
        assert_eq!(parse_pointer("a.b"), path_pointer("a.b"));
    }

    #[test]
    fn negation_and_arguments() {
        let pointer = parse_pointer("!format:item.name:2");
        assert!(pointer.negated);
        assert_eq!(pointer.operand, Operand::Path(parse_path("format").unwrap()));
        assert_eq!(pointer.args, vec![path_pointer("item.name"), number(2.0)]);
    }

    #[test]
    fn comparisons() {
        let parsed = parse_directive(DirectiveKind::If, " count >= 10 ");
        assert!(parsed.errors.is_empty());
        assert_eq!(
            parsed.spec,
            Some(DirectiveSpec::If(Reference::Comparison {
                left: path_pointer("count"),
                op: Comparator::GreaterOrEqual,
                right: number(10.0),
            }))
        );

        let parsed = parse_directive(DirectiveKind::If, "!done");
        let Some(DirectiveSpec::If(Reference::Pointer(pointer))) = parsed.spec else {
            panic!("expected a pointer");
        };
        assert!(pointer.negated);
    }

    #[test]
    fn unknown_comparator_is_reported_with_its_span() {
        let parsed = parse_directive(DirectiveKind::If, "a =< b");
        assert_eq!(parsed.spec, None);
        assert_eq!(
            parsed.errors,
            vec![ParseError {
                kind: ParseErrorKind::UnknownComparator("=<".into()),
                span: 2..4,
            }]
        );
    }

    #[test]
    fn malformed_sub_bindings_are_dropped_individually() {
        let parsed = parse_directive(DirectiveKind::Attr, "title:name; broken; href:url");
        let Some(DirectiveSpec::Attr(specs)) = parsed.spec else {
            panic!("expected attr bindings");
        };
        let names: Vec<&str> = specs.iter().map(|spec| spec.name.as_str()).collect();
        assert_eq!(names, vec!["title", "href"]);
        assert_eq!(
            parsed.errors,
            vec![ParseError {
                kind: ParseErrorKind::MissingSeparator,
                span: 12..18,
            }]
        );
    }

    #[test]
    fn class_names() {
        let parsed = parse_directive(DirectiveKind::Class, "done, faded:item.done");
        let Some(DirectiveSpec::Class(specs)) = parsed.spec else {
            panic!("expected class bindings");
        };
        assert_eq!(specs[0].names.as_slice(), ["done", "faded"]);
        assert_eq!(specs[0].reference, Reference::Pointer(path_pointer("item.done")));
    }

    #[test]
    fn for_alias() {
        let parsed = parse_directive(DirectiveKind::For, "todo:todos");
        assert_eq!(
            parsed.spec,
            Some(DirectiveSpec::For {
                alias: "todo".into(),
                source: Reference::Pointer(path_pointer("todos")),
            })
        );
        assert!(parse_directive(DirectiveKind::For, "todos").spec.is_none());
    }

    #[test]
    fn listener_actions() {
        let parsed = parse_directive(
            DirectiveKind::On,
            "click, keyup:remove:todo, count=count, $update; change:open=state==='open'",
        );
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let Some(DirectiveSpec::On(listeners)) = parsed.spec else {
            panic!("expected listeners");
        };
        assert_eq!(listeners.len(), 2);
        assert_eq!(listeners[0].events.as_slice(), ["click", "keyup"]);
        assert_eq!(
            listeners[0].actions,
            vec![
                ActionSpec::Caller(Pointer {
                    negated: false,
                    operand: Operand::Path(parse_path("remove").unwrap()),
                    args: vec![path_pointer("todo")],
                }),
                ActionSpec::Assigner {
                    target: path_pointer("count"),
                    value: Reference::Pointer(path_pointer("count")),
                },
                ActionSpec::Updater,
            ]
        );
        assert_eq!(
            listeners[1].actions,
            vec![ActionSpec::Assigner {
                target: path_pointer("open"),
                value: Reference::Comparison {
                    left: path_pointer("state"),
                    op: Comparator::StrictEq,
                    right: Pointer {
                        negated: false,
                        operand: Operand::Literal(Literal::Text("open".into())),
                        args: Vec::new(),
                    },
                },
            }]
        );
    }

    fn text(value: &str) -> Pointer {
        Pointer {
            negated: false,
            operand: Operand::Literal(Literal::Text(value.into())),
            args: Vec::new(),
        }
    }

    #[test]
    fn quoted_text_hides_operators_and_separators() {
        let parsed = parse_directive(DirectiveKind::Html, "'a=b'");
        assert_eq!(parsed.spec, Some(DirectiveSpec::Html(Reference::Pointer(text("a=b")))));

        let parsed = parse_directive(DirectiveKind::If, "label == \"x<y\"");
        assert_eq!(
            parsed.spec,
            Some(DirectiveSpec::If(Reference::Comparison {
                left: path_pointer("label"),
                op: Comparator::Eq,
                right: text("x<y"),
            }))
        );

        let parsed = parse_directive(DirectiveKind::Attr, "title:'a; b'; lang:'x:y'");
        let Some(DirectiveSpec::Attr(specs)) = parsed.spec else {
            panic!("expected attr bindings");
        };
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].reference, Reference::Pointer(text("a; b")));
        assert_eq!(specs[1].reference, Reference::Pointer(text("x:y")));
    }

    #[test]
    fn assignment_skips_quoted_equals() {
        let parsed = parse_directive(DirectiveKind::On, "click:x='a=b', y='c, d'");
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let Some(DirectiveSpec::On(listeners)) = parsed.spec else {
            panic!("expected listeners");
        };
        assert_eq!(
            listeners[0].actions,
            vec![
                ActionSpec::Assigner {
                    target: path_pointer("x"),
                    value: Reference::Pointer(text("a=b")),
                },
                ActionSpec::Assigner {
                    target: path_pointer("y"),
                    value: Reference::Pointer(text("c, d")),
                },
            ]
        );
    }

    #[test]
    fn unpaired_quote_is_plain_text() {
        let parsed = parse_directive(DirectiveKind::Attr, "title:it's; lang:l");
        let Some(DirectiveSpec::Attr(specs)) = parsed.spec else {
            panic!("expected attr bindings");
        };
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].reference, Reference::Pointer(text("it's")));
    }

    #[test]
    fn literal_assignment_target_is_rejected() {
        let parsed = parse_directive(DirectiveKind::On, "click:5=x");
        assert_eq!(parsed.spec, None);
        assert_eq!(parsed.errors[0].kind, ParseErrorKind::InvalidTarget("5".into()));
    }

    #[test]
    fn empty_text() {
        let parsed = parse_directive(DirectiveKind::Html, "  ");
        assert_eq!(parsed.errors[0].kind, ParseErrorKind::EmptyReference);
        let parsed = parse_directive(DirectiveKind::Attr, "");
        assert_eq!(parsed.errors[0].kind, ParseErrorKind::EmptyReference);
    }
}
