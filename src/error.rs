//! Compile-time and run-time errors

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    #[error("no corresponding function to the argument")]
    UnboundArgument,

    #[error("no corresponding builtin function")]
    UnknownBuiltin,

    #[error("unexpected character")]
    UnexpectedCharacter,

    #[error("unexpected token")]
    UnexpectedToken,

    #[error("unexpected end of code")]
    UnexpectedEnd,
}

/// A rejected program. `line` and `column` are 1-based; `offset` is the byte
/// offset of the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error: {kind} ({line}, {column})")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl SyntaxError {
    /// Source excerpt with the offending token highlighted.
    pub fn highlight(&self, code: &str) -> String {
        let start = code
            .char_indices()
            .take_while(|(i, _)| *i < self.offset)
            .count();
        highlight_error::highlight_error(start, start + 1, code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("runtime error: the argument was not a Church numeral")]
    NotANumeral,

    #[error("runtime error: the argument was not null")]
    NotNull,

    #[error("runtime error: invalid UTF-8 sequence")]
    InvalidUtf8,

    #[error("runtime error: program aborted")]
    Aborted,

    #[error("runtime error: null is not a function")]
    NotAFunction,
}
