use chumsky::prelude::*;
use std::fmt;

/// Dotted/bracketed access path such as `todo.items[index].title`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `.name`, or the leading name.
    Name(String),
    /// `[path]`: the key is the text of the inner path's value.
    Computed(Path),
}

impl Path {
    /// First key, which decides between scope and root lookup.
    pub fn root_name(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Name(name)) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Name(name) if index == 0 => f.write_str(name)?,
                Segment::Name(name) => write!(f, ".{name}")?,
                Segment::Computed(path) => write!(f, "[{path}]")?,
            }
        }
        Ok(())
    }
}

pub fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']')
}

pub fn path_parser<'src>() -> impl Parser<'src, &'src str, Path, extra::Err<Rich<'src, char>>> {
    recursive(|path| {
        let name = any()
            .filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '_' | '$'))
            .repeated()
            .at_least(1)
            .to_slice()
            .map(|name: &str| Segment::Name(name.to_owned()));

        let computed = path
            .delimited_by(just('['), just(']'))
            .map(Segment::Computed);

        let tail = choice((just('.').ignore_then(name.clone()), computed));

        name.then(tail.repeated().collect::<Vec<_>>())
            .map(|(head, tail)| {
                let mut segments = Vec::with_capacity(tail.len() + 1);
                segments.push(head);
                segments.extend(tail);
                Path { segments }
            })
    })
}

/// Parse a whole string as a path.
pub fn parse_path(text: &str) -> Option<Path> {
    path_parser()
        .then_ignore(end())
        .parse(text)
        .into_result()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(name: &str) -> Segment {
        Segment::Name(name.to_owned())
    }

    #[test]
    fn dotted_path() {
        let path = parse_path("a.b.$c").unwrap();
        assert_eq!(path.segments, vec![name("a"), name("b"), name("$c")]);
        assert_eq!(path.root_name(), Some("a"));
    }

    #[test]
    fn nested_brackets() {
        let path = parse_path("a[b[c]].d").unwrap();
        assert_eq!(
            path.segments,
            vec![
                name("a"),
                Segment::Computed(Path {
                    segments: vec![
                        name("b"),
                        Segment::Computed(Path {
                            segments: vec![name("c")]
                        })
                    ]
                }),
                name("d"),
            ]
        );
        assert_eq!(path.to_string(), "a[b[c]].d");
    }

    #[test]
    fn malformed_paths() {
        for text in ["", "a.", ".a", "a[b", "a]", "a..b", "[a]"] {
            assert!(parse_path(text).is_none(), "{text:?} should not parse");
        }
    }
}
