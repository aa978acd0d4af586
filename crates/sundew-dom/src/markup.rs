//! Markup fragment tokenizer and tree builder.
//!
//! Tokens are produced with chumsky; nesting is resolved afterwards with an
//! open-element stack, which keeps the grammar free of context (void
//! elements, stray or unclosed tags).

use chumsky::prelude::*;
use std::ops::Range;
use thiserror::Error;

pub type Span = SimpleSpan;

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("malformed markup at {span:?}: {message}")]
    Malformed { span: Range<usize>, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
    Text(String),
    Comment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
}

pub fn lexer<'src>() -> impl Parser<'src, &'src str, Vec<Token>, extra::Err<Rich<'src, char>>> {
    let name = any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
                .repeated(),
        )
        .to_slice()
        .map(|name: &str| name.to_ascii_lowercase());

    let double_quoted = none_of("\"")
        .repeated()
        .to_slice()
        .delimited_by(just('"'), just('"'));
    let single_quoted = none_of("'")
        .repeated()
        .to_slice()
        .delimited_by(just('\''), just('\''));
    let unquoted = none_of(" \t\r\n\"'=<>`").repeated().at_least(1).to_slice();

    let value = just('=')
        .padded()
        .ignore_then(choice((double_quoted, single_quoted, unquoted)))
        .map(decode_entities);

    let attribute = name
        .clone()
        .then(value.or_not())
        .map(|(name, value)| (name, value.unwrap_or_default()));

    let open = just('<')
        .ignore_then(name.clone())
        .then(attribute.padded().repeated().collect::<Vec<_>>())
        .then_ignore(text::whitespace())
        .then(just('/').or_not().map(|slash| slash.is_some()))
        .then_ignore(just('>'))
        .map(|((name, attributes), self_closing)| Token::Open {
            name,
            attributes,
            self_closing,
        });

    let close = just("</")
        .ignore_then(name)
        .then_ignore(text::whitespace())
        .then_ignore(just('>'))
        .map(Token::Close);

    let comment = just("<!--")
        .then(any().and_is(just("-->").not()).repeated())
        .then(just("-->"))
        .to(Token::Comment);

    let text = none_of("<")
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|raw: &str| Token::Text(decode_entities(raw)));

    choice((comment, close, open, text))
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}

pub fn tokenize(markup: &str) -> Result<Vec<Token>, MarkupError> {
    lexer().parse(markup).into_result().map_err(|errors| {
        match errors.into_iter().next() {
            Some(error) => MarkupError::Malformed {
                span: error.span().into_range(),
                message: error.to_string(),
            },
            None => MarkupError::Malformed {
                span: 0..markup.len(),
                message: "unexpected input".to_owned(),
            },
        }
    })
}

/// Parse a markup fragment into a forest of nodes. Comments are dropped.
pub fn parse_fragment(markup: &str) -> Result<Vec<MarkupNode>, MarkupError> {
    Ok(build_tree(tokenize(markup)?))
}

type OpenElement = (String, Vec<(String, String)>, Vec<MarkupNode>);

fn build_tree(tokens: Vec<Token>) -> Vec<MarkupNode> {
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut roots = Vec::new();

    for token in tokens {
        match token {
            Token::Comment => {}
            Token::Text(text) => attach(&mut stack, &mut roots, MarkupNode::Text(text)),
            Token::Open {
                name,
                attributes,
                self_closing,
            } => {
                if self_closing || is_void(&name) {
                    let element = MarkupNode::Element {
                        tag: name,
                        attributes,
                        children: Vec::new(),
                    };
                    attach(&mut stack, &mut roots, element);
                } else {
                    stack.push((name, attributes, Vec::new()));
                }
            }
            Token::Close(name) => {
                // Unmatched closing tags are ignored.
                if !stack.iter().any(|(tag, _, _)| *tag == name) {
                    continue;
                }
                while let Some((tag, attributes, children)) = stack.pop() {
                    let matched = tag == name;
                    let element = MarkupNode::Element {
                        tag,
                        attributes,
                        children,
                    };
                    attach(&mut stack, &mut roots, element);
                    if matched {
                        break;
                    }
                }
            }
        }
    }

    while let Some((tag, attributes, children)) = stack.pop() {
        let element = MarkupNode::Element {
            tag,
            attributes,
            children,
        };
        attach(&mut stack, &mut roots, element);
    }

    roots
}

fn attach(stack: &mut [OpenElement], roots: &mut Vec<MarkupNode>, node: MarkupNode) {
    match stack.last_mut() {
        Some((_, _, children)) => children.push(node),
        None => roots.push(node),
    }
}

pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_owned();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str, attributes: &[(&str, &str)], children: Vec<MarkupNode>) -> MarkupNode {
        MarkupNode::Element {
            tag: tag.to_owned(),
            attributes: attributes
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            children,
        }
    }

    #[test]
    fn nested_elements_and_text() {
        let nodes = parse_fragment("<ul><li class=\"a\">one</li><li>two</li></ul>").unwrap();
        assert_eq!(
            nodes,
            vec![element(
                "ul",
                &[],
                vec![
                    element("li", &[("class", "a")], vec![MarkupNode::Text("one".into())]),
                    element("li", &[], vec![MarkupNode::Text("two".into())]),
                ]
            )]
        );
    }

    #[test]
    fn attribute_forms() {
        let nodes = parse_fragment("<input type=checkbox checked data-x='1' sd-attr=\"checked:done\">")
            .unwrap();
        assert_eq!(
            nodes,
            vec![element(
                "input",
                &[
                    ("type", "checkbox"),
                    ("checked", ""),
                    ("data-x", "1"),
                    ("sd-attr", "checked:done"),
                ],
                vec![]
            )]
        );
    }

    #[test]
    fn void_and_self_closing_elements_take_no_children() {
        let nodes = parse_fragment("<p><br>a<span/>b</p>").unwrap();
        assert_eq!(
            nodes,
            vec![element(
                "p",
                &[],
                vec![
                    element("br", &[], vec![]),
                    MarkupNode::Text("a".into()),
                    element("span", &[], vec![]),
                    MarkupNode::Text("b".into()),
                ]
            )]
        );
    }

    #[test]
    fn comments_are_dropped_and_entities_decoded() {
        let nodes = parse_fragment("<!-- note --><b>&lt;x&gt; &amp; y</b>").unwrap();
        assert_eq!(
            nodes,
            vec![element("b", &[], vec![MarkupNode::Text("<x> & y".into())])]
        );
    }

    #[test]
    fn unclosed_and_unmatched_tags_are_tolerated() {
        let nodes = parse_fragment("<div><p>x</div></span>tail").unwrap();
        assert_eq!(
            nodes,
            vec![
                element(
                    "div",
                    &[],
                    vec![element("p", &[], vec![MarkupNode::Text("x".into())])]
                ),
                MarkupNode::Text("tail".into()),
            ]
        );
    }

    #[test]
    fn bare_angle_bracket_is_an_error() {
        let error = parse_fragment("a < b").unwrap_err();
        let MarkupError::Malformed { span, .. } = error;
        assert!(span.start >= 2);
    }
}
