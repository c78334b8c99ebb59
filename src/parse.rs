//! Program text to term graph.
//!
//! Tokens:
//!
//! | text          | node                          |
//! |---------------|-------------------------------|
//! | `'`           | abstraction, body follows     |
//! | `,`           | application, two terms follow |
//! | `"`           | unit                          |
//! | `.` × n       | variable with index n - 1     |
//! | `:` `::` `:::`| put, get, random              |
//! | `;`           | comment to end of line        |
//!
//! Terms are folded on an explicit stack, so nesting depth is bounded only by
//! memory.

use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::syntax::{Graph, Node, NodeId};

/// A term still waiting for children.
#[derive(Debug)]
enum Frame {
    Abstraction,
    Application { function: Option<NodeId> },
}

struct Cursor<'a> {
    code: &'a [u8],
    index: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(code: &'a str) -> Self {
        Cursor {
            code: code.as_bytes(),
            index: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.code.get(self.index).copied()
    }

    fn advance(&mut self, count: usize) {
        self.index += count;
        self.column += count;
    }

    fn run_length(&self, byte: u8) -> usize {
        self.code[self.index..]
            .iter()
            .take_while(|b| **b == byte)
            .count()
    }

    /// Consumes `\n`, `\r` or `\r\n`.
    fn newline(&mut self) {
        if self.code[self.index..].starts_with(b"\r\n") {
            self.index += 2;
        } else {
            self.index += 1;
        }
        self.line += 1;
        self.column = 1;
    }

    /// Skips blanks, line breaks and comments.
    fn skip_trivia(&mut self) {
        while let Some(byte) = self.peek() {
            match byte {
                b' ' | b'\t' => self.advance(1),
                b'\r' | b'\n' => self.newline(),
                b';' => {
                    while !matches!(self.peek(), None | Some(b'\r' | b'\n')) {
                        self.index += 1;
                    }
                    if self.peek().is_some() {
                        self.newline();
                    } else {
                        // a comment always ends its line
                        self.line += 1;
                        self.column = 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn error(&self, kind: SyntaxErrorKind) -> SyntaxError {
        SyntaxError {
            kind,
            line: self.line,
            column: self.column,
            offset: self.index,
        }
    }
}

/// Parses a whole program into `graph` and returns its root.
///
/// On error, nodes built so far stay allocated; callers discard the graph.
pub fn parse_program(code: &str, graph: &mut Graph) -> Result<NodeId, SyntaxError> {
    let mut cursor = Cursor::new(code);
    let mut frames = Vec::new();
    // open abstractions
    let mut nest = 0;
    loop {
        cursor.skip_trivia();
        let Some(byte) = cursor.peek() else {
            return Err(cursor.error(SyntaxErrorKind::UnexpectedEnd));
        };
        let mut node = match byte {
            b'\'' => {
                nest += 1;
                frames.push(Frame::Abstraction);
                cursor.advance(1);
                continue;
            }
            b',' => {
                frames.push(Frame::Application { function: None });
                cursor.advance(1);
                continue;
            }
            b'"' => {
                cursor.advance(1);
                graph.alloc(Node::Unit)
            }
            b'.' => {
                let count = cursor.run_length(b'.');
                if count > nest {
                    return Err(cursor.error(SyntaxErrorKind::UnboundArgument));
                }
                cursor.advance(count);
                graph.alloc(Node::Variable { index: count - 1 })
            }
            b':' => {
                let count = cursor.run_length(b':');
                let builtin = match count {
                    1 => Node::Put,
                    2 => Node::Get,
                    3 => Node::Random,
                    _ => return Err(cursor.error(SyntaxErrorKind::UnknownBuiltin)),
                };
                cursor.advance(count);
                graph.alloc(builtin)
            }
            _ => return Err(cursor.error(SyntaxErrorKind::UnexpectedCharacter)),
        };

        loop {
            match frames.pop() {
                Some(Frame::Abstraction) => {
                    nest -= 1;
                    node = graph.alloc(Node::Abstraction { body: node });
                }
                Some(Frame::Application { function: None }) => {
                    frames.push(Frame::Application {
                        function: Some(node),
                    });
                    break;
                }
                Some(Frame::Application {
                    function: Some(function),
                }) => {
                    node = graph.alloc(Node::Application {
                        function,
                        argument: node,
                    });
                }
                None => {
                    cursor.skip_trivia();
                    return match cursor.peek() {
                        None => Ok(node),
                        Some(b'\'' | b'"' | b'.' | b',' | b':') => {
                            Err(cursor.error(SyntaxErrorKind::UnexpectedToken))
                        }
                        Some(_) => Err(cursor.error(SyntaxErrorKind::UnexpectedCharacter)),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::syntax::dump;
    use proptest::prelude::*;

    fn parse(code: &str) -> Result<String, SyntaxError> {
        let mut graph = Graph::new();
        let root = parse_program(code, &mut graph)?;
        Ok(dump(&graph, Some(root), None))
    }

    #[test]
    fn test_parse_program() {
        let test_cases = &[
            ("'.", "'."),
            ("\"", "\""),
            (":::", ":::"),
            (",'.\"", ",'.\""),
            ("'' ,.. ,.. ,.. .", "'',..,..,.. ."),
            ("; church two\n''\t,..\r\n,..\r. ; x\n", "'',..,.. ."),
            (",,: :: :::", ",,: :: :::"),
            ("''', ... ,.. .", "''',...,.. ."),
        ];
        for (input, expected) in test_cases {
            assert_eq!(parse(input).as_deref(), Ok(*expected), "{:?}", input);
        }
    }

    #[test]
    fn test_parse_nodes() {
        let mut graph = Graph::new();
        let root = parse_program(",'..\"", &mut graph);
        assert_eq!(
            root.unwrap_err().kind,
            SyntaxErrorKind::UnboundArgument
        );

        let mut graph = Graph::new();
        let root = parse_program("'',.. .", &mut graph).unwrap();
        let Node::Abstraction { body: inner } = graph[root] else {
            panic!("expected abstraction");
        };
        let Node::Abstraction { body } = graph[inner] else {
            panic!("expected abstraction");
        };
        let Node::Application { function, argument } = graph[body] else {
            panic!("expected application");
        };
        assert_eq!(graph[function], Node::Variable { index: 1 });
        assert_eq!(graph[argument], Node::Variable { index: 0 });
        assert_eq!(graph.live(), 5);
    }

    #[test]
    fn test_parse_errors() {
        use SyntaxErrorKind::*;
        let test_cases = &[
            (".", UnboundArgument, 1, 1),
            ("'..", UnboundArgument, 1, 2),
            ("''\n  ...", UnboundArgument, 2, 3),
            ("::::", UnknownBuiltin, 1, 1),
            (", ::::: \"", UnknownBuiltin, 1, 3),
            ("x", UnexpectedCharacter, 1, 1),
            ("'λ", UnexpectedCharacter, 1, 2),
            ("\" x", UnexpectedCharacter, 1, 3),
            ("\"  \"", UnexpectedToken, 1, 4),
            ("'.\n\n  :", UnexpectedToken, 3, 3),
            ("", UnexpectedEnd, 1, 1),
            (",:", UnexpectedEnd, 1, 3),
            ("; note\n,\r\n:", UnexpectedEnd, 3, 2),
            ("''; open", UnexpectedEnd, 2, 1),
        ];
        for (input, kind, line, column) in test_cases {
            let error = parse(input).unwrap_err();
            assert_eq!(
                (error.kind, error.line, error.column),
                (*kind, *line, *column),
                "{:?}",
                input
            );
        }
    }

    #[test]
    fn test_error_offset() {
        let error = parse("; ünïcode\n,: x").unwrap_err();
        assert_eq!(error.kind, SyntaxErrorKind::UnexpectedCharacter);
        assert_eq!(&"; ünïcode\n,: x"[error.offset..], "x");
    }

    #[test]
    fn test_parse_deep_nesting() {
        let depth = 200_000;
        let mut code = "'".repeat(depth);
        code.push_str(&".".repeat(depth));
        let mut graph = Graph::new();
        let root = parse_program(&code, &mut graph).unwrap();
        assert_eq!(graph.live(), depth + 1);
        assert_eq!(dump(&graph, Some(root), None), code);
    }

    #[derive(Debug, Clone)]
    enum Shape {
        Lam(Box<Shape>),
        App(Box<Shape>, Box<Shape>),
        Var(usize),
        Unit,
        Put,
        Get,
        Random,
    }

    fn arb_shape() -> impl Strategy<Value = Shape> {
        let leaf = prop_oneof![
            (0usize..4).prop_map(Shape::Var),
            Just(Shape::Unit),
            Just(Shape::Put),
            Just(Shape::Get),
            Just(Shape::Random),
        ];
        leaf.prop_recursive(8, 128, 2, |inner| {
            prop_oneof![
                inner.clone().prop_map(|body| Shape::Lam(Box::new(body))),
                (inner.clone(), inner)
                    .prop_map(|(f, arg)| Shape::App(Box::new(f), Box::new(arg))),
            ]
        })
    }

    /// Renders with a space after every token and a comment under each
    /// abstraction. Variables are wrapped into scope.
    fn render(shape: &Shape, depth: usize, out: &mut String) {
        match shape {
            Shape::Lam(body) => {
                out.push_str("' ; bind\n");
                render(body, depth + 1, out);
            }
            Shape::App(function, argument) => {
                out.push_str(", ");
                render(function, depth, out);
                render(argument, depth, out);
            }
            Shape::Var(_) if depth == 0 => out.push_str("\" "),
            Shape::Var(index) => {
                out.push_str(&".".repeat(index % depth + 1));
                out.push(' ');
            }
            Shape::Unit => out.push_str("\" "),
            Shape::Put => out.push_str(": "),
            Shape::Get => out.push_str(":: "),
            Shape::Random => out.push_str("::: "),
        }
    }

    proptest! {
        #[test]
        fn test_dump_parse_round_trip(shape in arb_shape()) {
            let mut code = String::new();
            render(&shape, 0, &mut code);
            let dumped = parse(&code).unwrap();
            prop_assert_eq!(parse(&dumped).unwrap(), dumped);
        }
    }
}
