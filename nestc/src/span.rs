use std::fmt;
use std::rc::Rc;

/// Position of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
    pub start: usize,
    pub end: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            line: 1,
            column: 1,
            start: 0,
            end: 0,
        }
    }
}

/// The location cursor shared by the parser and diagnostics.
///
/// The parser moves it forward before every grammar action, so any error
/// raised by the core reports where translation currently stands.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub file: Rc<str>,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn initialize(file: &str) -> Self {
        Self {
            file: Rc::from(file),
            line: 1,
            column: 1,
        }
    }

    pub fn update(&mut self, span: Span) {
        self.line = span.line;
        self.column = span.column;
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::initialize("<input>")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
